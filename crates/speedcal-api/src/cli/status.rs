//! System status command.

use anyhow::Result;
use console::style;

use speedcal_infra::config::resolve_llm_api_key;

use crate::state::AppState;

/// Display where data lives, which model is configured and the server defaults.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let config = &state.config;
    let db_path = state.data_dir.join("speedcal.db");
    let db_size = tokio::fs::metadata(&db_path).await.map(|m| m.len()).ok();
    let api_key_set = resolve_llm_api_key(&config.llm).is_some();

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "database": {
                "path": db_path.display().to_string(),
                "size_bytes": db_size,
            },
            "llm": {
                "provider": state.chat_service.provider_name(),
                "base_url": config.llm.base_url,
                "model": config.llm.model,
                "api_key_env": config.llm.api_key_env,
                "api_key_set": api_key_set,
            },
            "server": {
                "host": config.server.host,
                "port": config.server.port,
            },
            "chat": {
                "memory_window": config.chat.memory_window,
                "max_tool_rounds": config.chat.max_tool_rounds,
                "stream_timeout_secs": config.chat.stream_timeout_secs,
            },
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} SpeedCal v{}",
        style("⚡").bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!();

    println!("  {}", style("── Storage ──").dim());
    println!("  Data dir: {}", state.data_dir.display());
    match db_size {
        Some(bytes) => println!("  Database: {} ({} KiB)", db_path.display(), bytes / 1024),
        None => println!("  Database: {}", style("not created yet").yellow()),
    }
    println!();

    println!("  {}", style("── Model ──").dim());
    println!(
        "  Provider: {}",
        style(state.chat_service.provider_name()).cyan()
    );
    println!("  Endpoint: {}", config.llm.base_url);
    println!("  Model:    {}", style(&config.llm.model).bold());
    if api_key_set {
        println!("  API key:  {} ${}", style("✓").green(), config.llm.api_key_env);
    } else {
        println!(
            "  API key:  {} ${} not set",
            style("✗").red(),
            config.llm.api_key_env
        );
    }
    println!();

    println!("  {}", style("── Server ──").dim());
    println!(
        "  Listen:   http://{}:{}",
        config.server.host, config.server.port
    );
    println!(
        "  Turns:    window {} messages, {} tool rounds, {}s timeout",
        config.chat.memory_window, config.chat.max_tool_rounds, config.chat.stream_timeout_secs
    );
    println!();

    Ok(())
}
