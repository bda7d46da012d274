//! ops-companion: recipe-driven text generation with chunking, bullet
//! normalisation and PII safeguards.
//!
//! The entry point is [`runner::Runner`]; the binary and the optional HTTP
//! service are thin layers over it.

pub mod bootstrap;
pub mod bullets;
pub mod chunker;
pub mod core;
pub mod engine;
pub mod events;
pub mod recipes;
pub mod runner;
pub mod safeguards;
#[cfg(feature = "http-api")]
pub mod service;
pub mod text;

pub use crate::core::{config, error};
