//! Dummy backend: extractive echo of the prompt body.
//!
//! Drops the instruction line, returns up to `max_length` words of the source
//! text. Used for tests and dry runs without an inference server.

use std::path::PathBuf;
use std::sync::Arc;

use crate::engine::tokenizer;
use crate::engine::{
    Backend, EngineError, EngineResponse, GeneratedOutput, GenerationParams, Pipeline, TaskKind, Tokenizer,
};

#[derive(Debug, Clone)]
pub struct DummyBackend {
    tokenizer_dir: Option<PathBuf>,
    context_limit: usize,
}

impl DummyBackend {
    pub fn new(tokenizer_dir: Option<PathBuf>, context_limit: usize) -> Self {
        Self { tokenizer_dir, context_limit }
    }
}

impl Backend for DummyBackend {
    fn name(&self) -> &str {
        "dummy"
    }

    fn load(&self, task: TaskKind, _model: &str) -> Result<Arc<dyn Pipeline>, EngineError> {
        Ok(Arc::new(DummyPipeline { task }))
    }

    fn tokenizer(&self, model: &str) -> Result<Arc<dyn Tokenizer>, EngineError> {
        tokenizer::for_model(self.tokenizer_dir.as_deref(), model, self.context_limit)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DummyPipeline {
    task: TaskKind,
}

impl Pipeline for DummyPipeline {
    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<EngineResponse, EngineError> {
        let source = prompt.split_once('\n').map_or(prompt, |(_, rest)| rest).trim();
        let text = first_words(source, params.max_length as usize).trim_end().to_string();
        let output = match self.task {
            TaskKind::Summarization => GeneratedOutput { summary_text: Some(text), generated_text: None },
            TaskKind::Text2Text => GeneratedOutput { summary_text: None, generated_text: Some(text) },
        };
        Ok(EngineResponse::Outputs(vec![output]))
    }
}

/// Prefix of `text` holding its first `n` words, whitespace between them kept.
fn first_words(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    let mut count = 0;
    let mut in_word = false;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if in_word && count == n {
                return &text[..i];
            }
            in_word = false;
        } else if !in_word {
            in_word = true;
            count += 1;
        }
    }
    text
}
