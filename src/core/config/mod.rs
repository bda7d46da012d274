//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies `OPS_COMPANION_WORK_DIR` and `OPS_COMPANION_LOG_LEVEL` env overrides.
//!
//! # Module layout
//!
//! - **types**: Public configuration structs (`Config`, `EngineConfig`, `ModelsConfig`, …).
//! - **raw**: Raw TOML deserialization types (`RawConfig`, `RawEngine`, …).
//!   These mirror the file shape and use serde defaults; kept private.
//! - **load**: Loading logic: `merge_toml`, `load_raw_merged`, `load`,
//!   `load_from`, `expand_home`.

mod load;
mod raw;
mod types;

pub use load::{builtin_default, expand_home, load, load_from};
pub use types::*;

impl Config {
    /// Safe `Config` for tests: dummy engine, no API token, no external calls.
    pub fn test_default(work_dir: &std::path::Path) -> Self {
        Self {
            name: "test".into(),
            work_dir: work_dir.to_path_buf(),
            log_level: "info".into(),
            events_file: work_dir.join("events.json"),
            engine: EngineConfig {
                provider: "dummy".into(),
                api_base_url: "http://localhost:0/models".into(),
                timeout_seconds: 1,
                context_limit: raw::default_context_limit(),
                tokenizer_dir: None,
                cache_capacity: raw::default_cache_capacity(),
            },
            models: ModelsConfig::default(),
            safeguards: SafeguardDefaults { safe_mode: true, max_chars: raw::default_max_chars() },
            service: ServiceConfig { bind: raw::default_service_bind() },
            engine_api_token: None,
        }
    }
}
