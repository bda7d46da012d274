//! Raw TOML deserialization types.
//!
//! These structs mirror the TOML file shape and use `serde` defaults.
//! The `load` module converts them into the public `types` structs.

use serde::Deserialize;

// ── Top-level ────────────────────────────────────────────────────────────────

/// Raw TOML shape, the serde target before resolution.
#[derive(Deserialize)]
pub(super) struct RawConfig {
    pub companion: RawCompanion,
    #[serde(default)]
    pub engine: RawEngine,
    #[serde(default)]
    pub models: RawModels,
    #[serde(default)]
    pub safeguards: RawSafeguards,
    #[serde(default)]
    pub service: RawService,
}

#[derive(Deserialize)]
pub(super) struct RawCompanion {
    #[serde(default = "default_name")]
    pub name: String,
    pub work_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_events_file")]
    pub events_file: String,
}

// ── Engine ──────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawEngine {
    #[serde(rename = "default", default = "default_engine_provider")]
    pub provider: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_context_limit")]
    pub context_limit: usize,
    #[serde(default)]
    pub tokenizer_dir: Option<String>,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for RawEngine {
    fn default() -> Self {
        Self {
            provider: default_engine_provider(),
            api_base_url: default_api_base_url(),
            timeout_seconds: default_timeout_seconds(),
            context_limit: default_context_limit(),
            tokenizer_dir: None,
            cache_capacity: default_cache_capacity(),
        }
    }
}

// ── Models ──────────────────────────────────────────────────────────────────

/// Every field is optional; missing ones fall back to `ModelsConfig::default()`.
#[derive(Deserialize, Default)]
pub(super) struct RawModels {
    #[serde(default)]
    pub summary_fast: Option<String>,
    #[serde(default)]
    pub summary_long: Option<String>,
    #[serde(default)]
    pub text2text_fast: Option<String>,
    #[serde(default)]
    pub long_input_chars: Option<usize>,
}

// ── Safeguards ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawSafeguards {
    #[serde(default = "default_true")]
    pub safe_mode: bool,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for RawSafeguards {
    fn default() -> Self {
        Self { safe_mode: true, max_chars: default_max_chars() }
    }
}

// ── Service ─────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawService {
    #[serde(default = "default_service_bind")]
    pub bind: String,
}

impl Default for RawService {
    fn default() -> Self {
        Self { bind: default_service_bind() }
    }
}

// ── Defaults ────────────────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

pub(super) fn default_name() -> String {
    "ops-companion".to_string()
}

pub(super) fn default_log_level() -> String {
    "info".to_string()
}

pub(super) fn default_events_file() -> String {
    "events.json".to_string()
}

pub(super) fn default_engine_provider() -> String {
    "dummy".to_string()
}

pub(super) fn default_api_base_url() -> String {
    "https://api-inference.huggingface.co/models".to_string()
}

pub(super) fn default_timeout_seconds() -> u64 {
    120
}

pub(super) fn default_context_limit() -> usize {
    1024
}

pub(super) fn default_cache_capacity() -> usize {
    4
}

pub(super) fn default_max_chars() -> usize {
    600
}

pub(super) fn default_service_bind() -> String {
    "127.0.0.1:8000".to_string()
}
