//! Schedule persistence port used by the tool dispatcher.

pub mod repository;
