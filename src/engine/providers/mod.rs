//! Engine backend implementations.
//!
//! `build(config, api_token)` is the factory, called once at startup.
//! Adding a new backend = new module + new match arm.

pub mod dummy;
pub mod http;

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::engine::{Backend, EngineError};

/// Construct the configured backend.
///
/// `api_token` is sourced from `HF_API_TOKEN` env (never TOML) and is `None`
/// for local servers.
pub fn build(config: &EngineConfig, api_token: Option<String>) -> Result<Arc<dyn Backend>, EngineError> {
    match config.provider.as_str() {
        "dummy" => Ok(Arc::new(dummy::DummyBackend::new(
            config.tokenizer_dir.clone(),
            config.context_limit,
        ))),
        "http" | "hf-inference" => Ok(Arc::new(http::HttpBackend::new(config, api_token)?)),
        other => Err(EngineError::UnknownProvider(other.to_string())),
    }
}
