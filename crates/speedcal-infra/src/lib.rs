//! Infrastructure layer for the SpeedCal assistant.
//!
//! Contains implementations of the traits defined in `speedcal-core`:
//! SQLite repositories and the API key store, the `config.toml` loader, and
//! the OpenAI-compatible model provider.

pub mod config;
pub mod crypto;
pub mod llm;
pub mod sqlite;
