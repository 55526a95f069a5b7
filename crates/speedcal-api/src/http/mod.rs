//! HTTP/REST API layer for the SpeedCal assistant.
//!
//! Axum-based REST API at `/api/v1/ai/chat` with API key authentication,
//! envelope response format, SSE streaming and CORS support.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
