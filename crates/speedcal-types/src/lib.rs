//! Shared domain types for the SpeedCal assistant.
//!
//! Chat sessions and turns, schedules, model tool calls, client push events,
//! LLM wire types, configuration, and the error enums shared by every layer.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror, schemars.

pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
pub mod push;
pub mod schedule;
pub mod tool;
