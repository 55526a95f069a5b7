//! Observability for the SpeedCal assistant: structured logging through
//! `tracing-subscriber` and an optional OpenTelemetry span exporter.

pub mod tracing_setup;

pub use tracing_setup::{init_tracing, shutdown_tracing};
