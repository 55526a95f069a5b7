//! Model endpoint connectivity check.

use anyhow::Result;
use console::style;

use speedcal_infra::config::resolve_llm_api_key;
use speedcal_infra::llm::{check_provider_connection, create_provider};

use crate::state::AppState;

/// Send one small completion to the configured endpoint and report the result.
pub async fn check(state: &AppState, json: bool) -> Result<()> {
    let llm = &state.config.llm;
    let api_key = resolve_llm_api_key(llm);
    let has_key = api_key.is_some();
    let provider = create_provider(llm, api_key);

    let result = check_provider_connection(&provider).await;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "provider": provider.name(),
                "base_url": llm.base_url,
                "model": llm.model,
                "api_key_set": has_key,
                "ok": result.is_ok(),
                "error": result.as_ref().err().map(|e| e.to_string()),
            })
        );
    } else {
        println!();
        println!(
            "  {} Checking {} ({})",
            style("🔍").bold(),
            style(provider.name()).cyan(),
            llm.base_url
        );
        if !has_key {
            println!(
                "  {} ${} is not set",
                style("!").yellow().bold(),
                llm.api_key_env
            );
        }
        match &result {
            Ok(()) => println!("  {} {} responded", style("✓").green(), llm.model),
            Err(e) => println!("  {} {e}", style("✗").red()),
        }
        println!();
    }

    result.map_err(Into::into)
}
