//! Conversation engine and repository trait definitions for the SpeedCal assistant.
//!
//! This crate defines the "ports" (repository and model-provider traits) that
//! the infrastructure layer implements, plus the turn machinery built on them:
//! memory cache, context registry, tool dispatcher, streaming coordinator and
//! the chat service. It depends only on `speedcal-types` -- never on
//! `speedcal-infra` or any database/IO crate.

pub mod chat;
pub mod context;
pub mod llm;
pub mod memory;
pub mod schedule;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;
