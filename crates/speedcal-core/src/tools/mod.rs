//! Calendar tools the model may call during a turn.
//!
//! - `schema`: tool definitions (name, description, JSON Schema) per tool set
//! - `dispatcher`: validated execution against the schedule repository
//! - `disambiguation`: candidate lists remembered between a keyword delete
//!   and the follow-up delete-by-index

pub mod disambiguation;
pub mod dispatcher;
pub mod schema;
