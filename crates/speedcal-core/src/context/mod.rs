//! Per-turn context: who is calling, for which session, and how to cancel.

pub mod registry;
