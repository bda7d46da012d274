//! Public configuration types.
//!
//! These are the resolved, ready-to-use structs the runner and service consume.
//! Raw TOML deserialization types live in `raw.rs`.

use std::path::PathBuf;

// ── Engine ──────────────────────────────────────────────────────────────────

/// Inference engine configuration (`[engine]`).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Which backend is active (`"dummy"` or `"http"`).
    pub provider: String,
    /// Base URL of the inference server; the model id is appended per request.
    pub api_base_url: String,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
    /// Context window (in tokens) assumed when the tokenizer does not report one.
    pub context_limit: usize,
    /// Directory holding `<model>/tokenizer.json` files (`/` in model ids becomes `--`).
    pub tokenizer_dir: Option<PathBuf>,
    /// Maximum number of loaded pipelines (and tokenizers) kept in the model cache.
    pub cache_capacity: usize,
}

// ── Models ──────────────────────────────────────────────────────────────────

/// Default model ids per task (`[models]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelsConfig {
    /// Summarization model for regular-length input.
    pub summary_fast: String,
    /// Higher-capacity summarization model for long input.
    pub summary_long: String,
    /// Instruction-following model for action items and brainstorming.
    pub text2text_fast: String,
    /// Normalized input longer than this many characters counts as long.
    pub long_input_chars: usize,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            summary_fast: "sshleifer/distilbart-cnn-12-6".to_string(),
            summary_long: "pszemraj/long-t5-tglobal-base-16384-book-summary".to_string(),
            text2text_fast: "google/flan-t5-small".to_string(),
            long_input_chars: 4000,
        }
    }
}

// ── Safeguards ──────────────────────────────────────────────────────────────

/// Request defaults for the safeguard layer (`[safeguards]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafeguardDefaults {
    pub safe_mode: bool,
    pub max_chars: usize,
}

// ── Service ─────────────────────────────────────────────────────────────────

/// HTTP service configuration (`[service]`).
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Socket address the HTTP service binds to.
    pub bind: String,
}

// ── Top-level ───────────────────────────────────────────────────────────────

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub name: String,
    /// Working directory for persistent data (already expanded, no `~`).
    pub work_dir: PathBuf,
    pub log_level: String,
    /// Event log path (relative values are resolved against `work_dir`).
    pub events_file: PathBuf,
    pub engine: EngineConfig,
    pub models: ModelsConfig,
    pub safeguards: SafeguardDefaults,
    pub service: ServiceConfig,
    /// Bearer token from `HF_API_TOKEN`; `None` for local servers.
    /// Never sourced from TOML.
    pub engine_api_token: Option<String>,
}
