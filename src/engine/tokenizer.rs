//! Tokenizers available to the backends.
//!
//! [`WordTokenizer`] needs no model files and is what the dummy backend (and
//! any backend without a `tokenizer.json`) uses. With the `hf-tokenizer`
//! feature, [`HfTokenizer`] loads a Hugging Face `tokenizer.json` from the
//! configured tokenizer directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::{Encoding, EngineError, Tokenizer};

// ── Word tokenizer ────────────────────────────────────────────────────────────

/// Whitespace tokenizer with a word table built per call.
///
/// Every whitespace-separated word is one token and each newline is a token of
/// its own, so decoding preserves line structure. Ids index the word table of
/// the [`Encoding`] that produced them; the tokenizer itself holds no state.
pub struct WordTokenizer {
    context_limit: usize,
}

impl WordTokenizer {
    pub fn new(context_limit: usize) -> Self {
        Self { context_limit }
    }
}

fn intern<'a>(table: &mut HashMap<&'a str, u32>, words: &mut Vec<String>, word: &'a str) -> u32 {
    *table.entry(word).or_insert_with(|| {
        words.push(word.to_string());
        (words.len() - 1) as u32
    })
}

impl Tokenizer for WordTokenizer {
    fn encode(&self, text: &str) -> Result<Encoding, EngineError> {
        let mut table = HashMap::new();
        let mut words = Vec::new();
        let mut ids = Vec::new();
        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                ids.push(intern(&mut table, &mut words, "\n"));
            }
            for word in line.split_whitespace() {
                ids.push(intern(&mut table, &mut words, word));
            }
        }
        Ok(Encoding::with_words(ids, words))
    }

    fn decode(&self, encoding: &Encoding, ids: &[u32]) -> Result<String, EngineError> {
        let words = encoding.words();
        let mut out = String::new();
        for &id in ids {
            let word = words
                .get(id as usize)
                .ok_or_else(|| EngineError::Tokenizer(format!("unknown token id {id}")))?;
            if word == "\n" {
                out.push('\n');
                continue;
            }
            if !out.is_empty() && !out.ends_with('\n') {
                out.push(' ');
            }
            out.push_str(word);
        }
        Ok(out)
    }

    fn context_limit(&self) -> usize {
        self.context_limit
    }
}

// ── Hugging Face tokenizer ────────────────────────────────────────────────────

/// `tokenizer.json` loaded through the `tokenizers` crate.
#[cfg(feature = "hf-tokenizer")]
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
    context_limit: usize,
}

#[cfg(feature = "hf-tokenizer")]
impl HfTokenizer {
    pub fn from_file(path: &Path, context_limit: usize) -> Result<Self, EngineError> {
        let inner = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| EngineError::Tokenizer(format!("cannot load {}: {e}", path.display())))?;
        Ok(Self { inner, context_limit })
    }
}

#[cfg(feature = "hf-tokenizer")]
impl Tokenizer for HfTokenizer {
    fn encode(&self, text: &str) -> Result<Encoding, EngineError> {
        let encoding = self
            .inner
            .encode(text, true)
            .map_err(|e| EngineError::Tokenizer(e.to_string()))?;
        Ok(Encoding::new(encoding.get_ids().to_vec()))
    }

    fn decode(&self, _encoding: &Encoding, ids: &[u32]) -> Result<String, EngineError> {
        self.inner
            .decode(ids, true)
            .map_err(|e| EngineError::Tokenizer(e.to_string()))
    }

    fn context_limit(&self) -> usize {
        self.context_limit
    }
}

// ── Lookup ────────────────────────────────────────────────────────────────────

/// Directory holding the files for `model` under `root`.
///
/// `/` in model ids is not a valid path component, so `org/name` maps to
/// `org--name`.
pub fn model_dir(root: &Path, model: &str) -> PathBuf {
    root.join(model.replace('/', "--"))
}

/// Context size declared in `tokenizer_config.json`, if any.
///
/// Tokenizers without a real limit report a huge sentinel value; anything above
/// a million tokens is treated as "not declared".
fn declared_context_limit(dir: &Path) -> Option<usize> {
    let raw = std::fs::read_to_string(dir.join("tokenizer_config.json")).ok()?;
    let value: serde_json::Value = serde_json::from_str(&raw).ok()?;
    let limit = value.get("model_max_length")?.as_f64()?;
    (1.0..=1_000_000.0).contains(&limit).then_some(limit as usize)
}

/// Resolve the tokenizer for `model`.
///
/// Uses `<root>/<model>/tokenizer.json` when present and supported by the
/// build, else a [`WordTokenizer`] with `default_limit`.
pub fn for_model(
    root: Option<&Path>,
    model: &str,
    default_limit: usize,
) -> Result<Arc<dyn Tokenizer>, EngineError> {
    let Some(root) = root else {
        return Ok(Arc::new(WordTokenizer::new(default_limit)));
    };

    let dir = model_dir(root, model);
    let file = dir.join("tokenizer.json");
    if !file.is_file() {
        debug!(model, path = %file.display(), "no tokenizer.json, using word tokenizer");
        return Ok(Arc::new(WordTokenizer::new(default_limit)));
    }
    let limit = declared_context_limit(&dir).unwrap_or(default_limit);

    #[cfg(feature = "hf-tokenizer")]
    {
        debug!(model, path = %file.display(), limit, "loading tokenizer.json");
        Ok(Arc::new(HfTokenizer::from_file(&file, limit)?))
    }

    #[cfg(not(feature = "hf-tokenizer"))]
    {
        debug!(model, "built without hf-tokenizer, using word tokenizer");
        Ok(Arc::new(WordTokenizer::new(limit)))
    }
}
