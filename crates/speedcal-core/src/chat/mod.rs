//! Chat sessions and turn orchestration.
//!
//! `repository` defines the persistence port the infrastructure layer
//! implements. `service` drives a turn end to end on top of the memory
//! cache, context registry, tool dispatcher and streaming coordinator.

pub mod prompt;
pub mod repository;
pub mod service;
pub mod stream;
