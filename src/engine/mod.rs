//! Generation engine boundary.
//!
//! The engine is reached through three traits:
//!
//! - [`Backend`] loads pipelines and tokenizers for a model id.
//! - [`Pipeline`] turns a prompt plus [`GenerationParams`] into an [`EngineResponse`].
//! - [`Tokenizer`] encodes and decodes token ids and reports the context size.
//!
//! Concrete backends live in [`providers`]; [`cache::ModelCache`] keeps loaded
//! pipelines and tokenizers alive between runs.

pub mod cache;
pub mod providers;
pub mod tokenizer;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown engine provider: {0}")]
    UnknownProvider(String),
    #[error("failed to load {model}: {message}")]
    Load { model: String, message: String },
    #[error("engine request failed: {0}")]
    Request(String),
    #[error("tokenizer error: {0}")]
    Tokenizer(String),
}

// ── Task ──────────────────────────────────────────────────────────────────────

/// Kind of generation a pipeline performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    #[serde(rename = "summarization")]
    Summarization,
    #[serde(rename = "text2text-generation")]
    Text2Text,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Summarization => "summarization",
            TaskKind::Text2Text => "text2text-generation",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Parameters ────────────────────────────────────────────────────────────────

/// Decoding parameters sent with each generation call.
///
/// Unset optional fields are left out of the wire payload so the engine's own
/// defaults apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_length: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    pub do_sample: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_beams: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_repeat_ngram_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub early_stopping: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_return_sequences: Option<u32>,
}

impl GenerationParams {
    /// Deterministic beam search, the shape most recipes use.
    pub fn beam_search(max_length: u32, min_length: u32) -> Self {
        Self {
            max_length,
            min_length: Some(min_length),
            do_sample: false,
            num_beams: Some(4),
            no_repeat_ngram_size: Some(3),
            length_penalty: Some(1.0),
            early_stopping: Some(true),
            top_p: None,
            top_k: None,
            temperature: None,
            num_return_sequences: None,
        }
    }

    /// Short greedy call made once after a pipeline is loaded.
    pub fn warm_up() -> Self {
        Self {
            max_length: 16,
            min_length: None,
            do_sample: false,
            num_beams: None,
            no_repeat_ngram_size: None,
            length_penalty: None,
            early_stopping: None,
            top_p: None,
            top_k: None,
            temperature: None,
            num_return_sequences: None,
        }
    }
}

/// One generation call: which model, which task, what prompt.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub task: TaskKind,
    pub model: &'a str,
    pub prompt: &'a str,
    pub params: &'a GenerationParams,
}

// ── Response ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_text: Option<String>,
}

/// Everything a pipeline may answer with.
///
/// Engines return a list of outputs, a single output object, or occasionally
/// a bare string; all three decode into this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EngineResponse {
    Outputs(Vec<GeneratedOutput>),
    Single(GeneratedOutput),
    Text(String),
}

impl EngineResponse {
    /// Extract the generated text.
    ///
    /// Takes the first output's `summary_text`, else its `generated_text`,
    /// else the empty string. Never fails.
    pub fn text(&self) -> String {
        match self {
            EngineResponse::Outputs(outputs) => outputs.first().map(output_text).unwrap_or_default(),
            EngineResponse::Single(output) => output_text(output),
            EngineResponse::Text(text) => text.clone(),
        }
    }
}

fn output_text(output: &GeneratedOutput) -> String {
    let non_empty = |s: &Option<String>| s.as_deref().filter(|s| !s.is_empty()).map(str::to_string);
    non_empty(&output.summary_text)
        .or_else(|| non_empty(&output.generated_text))
        .unwrap_or_default()
}

// ── Traits ────────────────────────────────────────────────────────────────────

/// A loaded model ready to generate.
pub trait Pipeline: Send + Sync {
    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<EngineResponse, EngineError>;
}

/// Token ids for one encoded text.
///
/// Tokenizers whose ids only make sense for a single call keep their word
/// table here, so decoding needs the encoding the ids came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Encoding {
    pub ids: Vec<u32>,
    words: Vec<String>,
}

impl Encoding {
    /// Ids from a fixed vocabulary.
    pub fn new(ids: Vec<u32>) -> Self {
        Self { ids, words: Vec::new() }
    }

    /// Ids indexing into `words`.
    pub fn with_words(ids: Vec<u32>, words: Vec<String>) -> Self {
        Self { ids, words }
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Maps text to token ids and back for one model.
pub trait Tokenizer: Send + Sync {
    fn encode(&self, text: &str) -> Result<Encoding, EngineError>;
    /// Decode `ids`, a slice of `encoding.ids`.
    fn decode(&self, encoding: &Encoding, ids: &[u32]) -> Result<String, EngineError>;
    /// Maximum input length the model accepts, in tokens.
    fn context_limit(&self) -> usize;
}

/// Source of pipelines and tokenizers.
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;
    fn load(&self, task: TaskKind, model: &str) -> Result<Arc<dyn Pipeline>, EngineError>;
    fn tokenizer(&self, model: &str) -> Result<Arc<dyn Tokenizer>, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_prefers_summary_text() {
        let resp: EngineResponse = serde_json::from_str(
            r#"[{"summary_text": "short", "generated_text": "long"}, {"summary_text": "second"}]"#,
        )
        .unwrap();
        assert_eq!(resp.text(), "short");
    }

    #[test]
    fn text_falls_back_to_generated_text() {
        let resp: EngineResponse = serde_json::from_str(r#"[{"generated_text": "gen"}]"#).unwrap();
        assert_eq!(resp.text(), "gen");

        let resp: EngineResponse =
            serde_json::from_str(r#"[{"summary_text": "", "generated_text": "gen"}]"#).unwrap();
        assert_eq!(resp.text(), "gen");
    }

    #[test]
    fn single_object_and_bare_string() {
        let resp: EngineResponse = serde_json::from_str(r#"{"generated_text": "one"}"#).unwrap();
        assert!(matches!(resp, EngineResponse::Single(_)));
        assert_eq!(resp.text(), "one");

        let resp: EngineResponse = serde_json::from_str(r#""plain""#).unwrap();
        assert_eq!(resp.text(), "plain");
    }

    #[test]
    fn empty_shapes_yield_empty_text() {
        let resp: EngineResponse = serde_json::from_str("[]").unwrap();
        assert_eq!(resp.text(), "");
        let resp: EngineResponse = serde_json::from_str("[{}]").unwrap();
        assert_eq!(resp.text(), "");
    }

    #[test]
    fn task_kind_wire_names() {
        assert_eq!(serde_json::to_string(&TaskKind::Text2Text).unwrap(), r#""text2text-generation""#);
        assert_eq!(TaskKind::Summarization.to_string(), "summarization");
    }

    #[test]
    fn unset_params_are_omitted() {
        let json = serde_json::to_value(GenerationParams::warm_up()).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(obj["max_length"], 16);
        assert_eq!(obj["do_sample"], false);
    }
}
