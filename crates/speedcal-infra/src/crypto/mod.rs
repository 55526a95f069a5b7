//! Cryptographic helpers.
//!
//! - `hash`: API key generation and SHA-256 digests for storing keys at rest

pub mod hash;
