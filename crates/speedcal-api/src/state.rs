//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and REST API.
//! `ChatService` is generic over its repositories; AppState pins it to the
//! SQLite implementations.

use std::path::PathBuf;
use std::sync::Arc;

use speedcal_core::chat::service::{ChatService, ChatSettings};
use speedcal_core::llm::box_provider::BoxLlmProvider;
use speedcal_infra::config::{load_app_config, resolve_llm_api_key};
use speedcal_infra::llm::create_provider;
use speedcal_infra::sqlite::api_key::SqliteApiKeyStore;
use speedcal_infra::sqlite::chat::SqliteChatRepository;
use speedcal_infra::sqlite::pool::{DatabasePool, database_url};
use speedcal_infra::sqlite::schedule::SqliteScheduleRepository;
use speedcal_types::config::AppConfig;

/// Concrete type alias for the chat service pinned to infra implementations.
pub type ConcreteChatService = ChatService<SqliteChatRepository, SqliteScheduleRepository>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ConcreteChatService>,
    pub api_keys: Arc<SqliteApiKeyStore>,
    pub config: Arc<AppConfig>,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Initialize the application state: load config, connect to the DB,
    /// build the model provider and wire services.
    pub async fn init(data_dir: PathBuf) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_app_config(&data_dir).await;
        let db_pool = DatabasePool::new(&database_url(&data_dir)).await?;
        let provider = create_provider(&config.llm, resolve_llm_api_key(&config.llm));

        tracing::info!(
            data_dir = %data_dir.display(),
            provider = provider.name(),
            model = %config.llm.model,
            "application state initialized"
        );

        Ok(Self::from_parts(db_pool, provider, config, data_dir))
    }

    /// Wire services from already-built parts.
    pub fn from_parts(
        db_pool: DatabasePool,
        provider: BoxLlmProvider,
        config: AppConfig,
        data_dir: PathBuf,
    ) -> Self {
        let chat_service = ChatService::new(
            Arc::new(SqliteChatRepository::new(db_pool.clone())),
            Arc::new(SqliteScheduleRepository::new(db_pool.clone())),
            provider,
            ChatSettings::from(&config),
        );

        Self {
            chat_service: Arc::new(chat_service),
            api_keys: Arc::new(SqliteApiKeyStore::new(db_pool.clone())),
            config: Arc::new(config),
            data_dir,
            db_pool,
        }
    }
}
