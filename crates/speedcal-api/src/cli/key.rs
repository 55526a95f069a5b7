//! API key CLI commands: create, list, revoke.
//!
//! Keys are issued per user; the HTTP layer resolves a presented key to the
//! user it was created for.

use anyhow::Result;
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use uuid::Uuid;

use speedcal_infra::sqlite::api_key::ApiKeyRecord;

use crate::state::AppState;

#[derive(Subcommand)]
pub enum KeyCommand {
    /// Issue a new key for a user. The key is printed once.
    Create {
        /// User the key authenticates as.
        #[arg(long)]
        user: String,

        /// Label to tell keys apart.
        #[arg(long, default_value = "default")]
        name: String,
    },

    /// List a user's keys (metadata only).
    #[command(alias = "ls")]
    List {
        #[arg(long)]
        user: String,
    },

    /// Revoke a key by id.
    #[command(alias = "rm")]
    Revoke {
        /// Key id as shown by `speedcal key list`.
        id: String,
    },
}

pub async fn run(state: &AppState, action: KeyCommand, json: bool) -> Result<()> {
    match action {
        KeyCommand::Create { user, name } => create_key(state, &user, &name, json).await,
        KeyCommand::List { user } => list_keys(state, &user, json).await,
        KeyCommand::Revoke { id } => revoke_key(state, &id, json).await,
    }
}

async fn create_key(state: &AppState, user: &str, name: &str, json: bool) -> Result<()> {
    let issued = state.api_keys.create(user, name).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "id": issued.record.id.to_string(),
                "user_id": issued.record.user_id,
                "name": issued.record.name,
                "key": issued.key,
            })
        );
        return Ok(());
    }

    println!();
    println!(
        "  {} API key created for '{}' (save this, it won't be shown again):",
        style("🔑").bold(),
        style(user).cyan()
    );
    println!();
    println!("  {}", style(&issued.key).yellow().bold());
    println!();
    println!("  {}", style(format!("id: {}", issued.record.id)).dim());
    println!();
    Ok(())
}

async fn list_keys(state: &AppState, user: &str, json: bool) -> Result<()> {
    let keys = state.api_keys.list(user).await?;

    if json {
        let rows: Vec<_> = keys.iter().map(record_json).collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if keys.is_empty() {
        println!();
        println!(
            "  {} No keys for '{}'. Create one with: {}",
            style("i").blue().bold(),
            user,
            style(format!("speedcal key create --user {user}")).yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").fg(Color::Cyan),
            Cell::new("Name").fg(Color::Cyan),
            Cell::new("Created").fg(Color::Cyan),
            Cell::new("Last used").fg(Color::Cyan),
        ]);

    for key in &keys {
        let last_used = key
            .last_used_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        table.add_row(vec![
            Cell::new(key.id),
            Cell::new(&key.name),
            Cell::new(key.created_at.format("%Y-%m-%d %H:%M")),
            Cell::new(last_used),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

async fn revoke_key(state: &AppState, id: &str, json: bool) -> Result<()> {
    let key_id: Uuid = id
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid key id: {id}"))?;
    state.api_keys.revoke(&key_id).await?;

    if json {
        println!("{}", serde_json::json!({ "revoked": true, "id": id }));
    } else {
        println!(
            "  {} Key {} revoked",
            style("✓").green().bold(),
            style(id).bold()
        );
    }
    Ok(())
}

fn record_json(record: &ApiKeyRecord) -> serde_json::Value {
    serde_json::json!({
        "id": record.id.to_string(),
        "user_id": record.user_id,
        "name": record.name,
        "created_at": record.created_at.to_rfc3339(),
        "last_used_at": record.last_used_at.map(|t| t.to_rfc3339()),
    })
}
