//! Conversation memory: a process-wide cache of each session's messages,
//! hydrated from the store on first use.

pub mod cache;
