//! Configuration loader for the SpeedCal assistant.
//!
//! Reads `config.toml` from the data directory (`~/.speedcal/` in production)
//! and deserializes it into [`AppConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::{Path, PathBuf};

use secrecy::SecretString;
use speedcal_types::config::{AppConfig, LlmConfig};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "SPEEDCAL_HOME";

/// Load configuration from `{data_dir}/config.toml`.
///
/// - Missing file: [`AppConfig::default()`].
/// - Unreadable or unparsable file: logs a warning and returns the default.
pub async fn load_app_config(data_dir: &Path) -> AppConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return AppConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return AppConfig::default();
        }
    };

    match toml::from_str::<AppConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            AppConfig::default()
        }
    }
}

/// Resolve the data directory.
///
/// Priority:
/// 1. An explicit path (the `--data-dir` flag)
/// 2. `SPEEDCAL_HOME` environment variable
/// 3. `~/.speedcal`
pub fn resolve_data_dir(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir;
    }
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".speedcal");
    }
    PathBuf::from(".speedcal")
}

/// Read the model API key from the environment variable named in the config.
///
/// Returns `None` when the variable is unset or blank; the provider then sends
/// unauthenticated requests, which local OpenAI-compatible servers accept.
pub fn resolve_llm_api_key(llm: &LlmConfig) -> Option<SecretString> {
    match std::env::var(&llm.api_key_env) {
        Ok(value) if !value.trim().is_empty() => Some(SecretString::from(value)),
        _ => {
            tracing::warn!(env = %llm.api_key_env, "model API key not set");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_app_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_app_config(tmp.path()).await;
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.chat.max_tool_rounds, 5);
    }

    #[tokio::test]
    async fn load_app_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
[server]
host = "0.0.0.0"

[llm]
base_url = "http://localhost:11434/v1"
model = "qwen2.5:7b"

[chat]
memory_window = 10
"#,
        )
        .await
        .unwrap();

        let config = load_app_config(tmp.path()).await;
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.llm.base_url, "http://localhost:11434/v1");
        assert_eq!(config.llm.model, "qwen2.5:7b");
        assert_eq!(config.chat.memory_window, 10);
        assert_eq!(config.chat.stream_timeout_secs, 120);
    }

    #[tokio::test]
    async fn load_app_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_app_config(tmp.path()).await;
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn resolve_data_dir_prefers_explicit_path() {
        let dir = resolve_data_dir(Some(PathBuf::from("/srv/speedcal")));
        assert_eq!(dir, PathBuf::from("/srv/speedcal"));
    }

    #[test]
    fn resolve_llm_api_key_reads_named_variable() {
        let llm = LlmConfig {
            api_key_env: "SPEEDCAL_TEST_LLM_KEY_1".to_string(),
            ..LlmConfig::default()
        };
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var("SPEEDCAL_TEST_LLM_KEY_1", "sk-test") };
        let key = resolve_llm_api_key(&llm).unwrap();
        assert_eq!(key.expose_secret(), "sk-test");
        unsafe { std::env::remove_var("SPEEDCAL_TEST_LLM_KEY_1") };

        let unset = LlmConfig {
            api_key_env: "SPEEDCAL_TEST_LLM_KEY_UNSET".to_string(),
            ..LlmConfig::default()
        };
        assert!(resolve_llm_api_key(&unset).is_none());
    }
}
