//! Token-window chunking for inputs longer than a model's context.
//!
//! Windows are `max_source_tokens` wide and consecutive windows share
//! `overlap_tokens` tokens so facts sitting on a boundary appear in both.

use thiserror::Error;

/// Tokens shared between consecutive windows unless the plan says otherwise.
pub const DEFAULT_OVERLAP_TOKENS: usize = 48;
/// Tokens reserved below the context limit for special tokens.
pub const CONTEXT_SAFETY_MARGIN: usize = 64;
/// Upper bound on the context a single window may use, whatever the model reports.
pub const MAX_CONTEXT_TOKENS: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid chunk plan: overlap ({overlap_tokens}) must be smaller than the window ({max_source_tokens})")]
pub struct ConfigurationError {
    pub max_source_tokens: usize,
    pub overlap_tokens: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    pub max_source_tokens: usize,
    pub overlap_tokens: usize,
}

impl ChunkPlan {
    pub fn new(max_source_tokens: usize, overlap_tokens: usize) -> Result<Self, ConfigurationError> {
        let plan = Self { max_source_tokens, overlap_tokens };
        plan.validate()?;
        Ok(plan)
    }

    /// Plan for a model whose tokenizer reports `context_limit`.
    ///
    /// The overlap is reduced for very small contexts so the plan stays valid.
    pub fn for_context_limit(context_limit: usize) -> Self {
        let max_source_tokens = source_token_budget(context_limit).max(1);
        Self {
            max_source_tokens,
            overlap_tokens: DEFAULT_OVERLAP_TOKENS.min(max_source_tokens / 2),
        }
    }

    /// Window advance between consecutive chunks. Strictly positive for a valid plan.
    pub fn step(&self) -> usize {
        self.max_source_tokens.saturating_sub(self.overlap_tokens)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.overlap_tokens >= self.max_source_tokens {
            return Err(ConfigurationError {
                max_source_tokens: self.max_source_tokens,
                overlap_tokens: self.overlap_tokens,
            });
        }
        Ok(())
    }
}

/// Source tokens a single prompt may carry for a model with `context_limit`.
///
/// Input longer than this goes through the chunked path.
pub fn source_token_budget(context_limit: usize) -> usize {
    context_limit
        .min(MAX_CONTEXT_TOKENS)
        .saturating_sub(CONTEXT_SAFETY_MARGIN)
}

/// Split `ids` into overlapping windows according to `plan`.
///
/// A sequence that fits (including an empty one) comes back as a single
/// chunk. Otherwise windows `[i, i + max)` advance by `max - overlap` and the
/// last window ends exactly at `ids.len()`.
pub fn chunk_tokens<T: Clone>(ids: &[T], plan: &ChunkPlan) -> Result<Vec<Vec<T>>, ConfigurationError> {
    plan.validate()?;

    let max = plan.max_source_tokens;
    if ids.len() <= max {
        return Ok(vec![ids.to_vec()]);
    }

    let step = plan.step();
    let mut chunks = Vec::with_capacity((ids.len() - plan.overlap_tokens).div_ceil(step));
    let mut start = 0;
    loop {
        let end = (start + max).min(ids.len());
        chunks.push(ids[start..end].to_vec());
        if end == ids.len() {
            break;
        }
        start += step;
    }
    Ok(chunks)
}
