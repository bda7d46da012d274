//! Run orchestration: one request in, one [`Event`] out.
//!
//! normalise → pick model → single pass or chunked generation → bullets →
//! safeguards → event → optional persistence.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bullets;
use crate::chunker::{self, ChunkPlan, ConfigurationError};
use crate::config::{Config, ModelsConfig};
use crate::engine::cache::ModelCache;
use crate::engine::tokenizer::WordTokenizer;
use crate::engine::{Encoding, EngineError, GenerationRequest, TaskKind, Tokenizer};
use crate::events::{self, Event, EventLog, EventLogError};
use crate::recipes::{Recipe, RecipeRegistry, UnknownRecipeError, DEFAULT_RECIPE};
use crate::safeguards::{self, BuiltinRedactor, Redactor, SafeguardOptions};
use crate::text;

pub const MIN_MAX_CHARS: usize = 50;
pub const MAX_MAX_CHARS: usize = 4000;
/// Characters of normalised input kept in the event.
pub const INPUT_EXCERPT_CHARS: usize = 2000;
/// Context assumed when a model's tokenizer cannot be loaded.
const FALLBACK_CONTEXT_LIMIT: usize = 1024;

// ── Request ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub text: String,
    #[serde(default = "default_recipe")]
    pub recipe: String,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default = "default_true")]
    pub safe_mode: bool,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_true")]
    pub persist: bool,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

fn default_recipe() -> String {
    DEFAULT_RECIPE.to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_chars() -> usize {
    600
}

impl RunRequest {
    /// Request with default options for `text`.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            recipe: default_recipe(),
            model_name: None,
            safe_mode: true,
            max_chars: default_max_chars(),
            persist: true,
            meta: Map::new(),
        }
    }

    pub fn with_recipe(mut self, recipe: impl Into<String>) -> Self {
        self.recipe = recipe.into();
        self
    }

    pub fn validate(&self) -> Result<(), RunError> {
        if !(MIN_MAX_CHARS..=MAX_MAX_CHARS).contains(&self.max_chars) {
            return Err(RunError::InvalidRequest(format!(
                "max_chars must be between {MIN_MAX_CHARS} and {MAX_MAX_CHARS}, got {}",
                self.max_chars
            )));
        }
        Ok(())
    }
}

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    UnknownRecipe(#[from] UnknownRecipeError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("failed to persist event: {0}")]
    Persist(#[from] EventLogError),
}

// ── Runner ────────────────────────────────────────────────────────────────────

pub struct Runner {
    recipes: RecipeRegistry,
    models: ModelsConfig,
    cache: Arc<ModelCache>,
    redactor: Arc<dyn Redactor>,
    events: Option<EventLog>,
}

impl Runner {
    /// Runner with the built-in recipes and redactor and no event log.
    pub fn new(models: ModelsConfig, cache: Arc<ModelCache>) -> Self {
        Self {
            recipes: RecipeRegistry::builtin(),
            models,
            cache,
            redactor: Arc::new(BuiltinRedactor),
            events: None,
        }
    }

    /// Runner wired from resolved config: models, event log path.
    pub fn from_config(config: &Config, cache: Arc<ModelCache>) -> Self {
        Self::new(config.models.clone(), cache).with_event_log(EventLog::new(&config.events_file))
    }

    pub fn with_recipes(mut self, recipes: RecipeRegistry) -> Self {
        self.recipes = recipes;
        self
    }

    pub fn with_redactor(mut self, redactor: Arc<dyn Redactor>) -> Self {
        self.redactor = redactor;
        self
    }

    pub fn with_event_log(mut self, log: EventLog) -> Self {
        self.events = Some(log);
        self
    }

    pub fn recipes(&self) -> &RecipeRegistry {
        &self.recipes
    }

    pub fn models(&self) -> &ModelsConfig {
        &self.models
    }

    pub fn event_log(&self) -> Option<&EventLog> {
        self.events.as_ref()
    }

    /// Effective model for a run.
    ///
    /// A non-blank override wins. Otherwise summaries of long input use the
    /// long-input model, other summaries the fast one, and everything else
    /// the instruction model.
    pub fn choose_model(&self, recipe: &Recipe, requested: Option<&str>, input_chars: usize) -> String {
        if let Some(model) = requested.map(str::trim).filter(|m| !m.is_empty()) {
            return model.to_string();
        }
        match recipe.task {
            TaskKind::Summarization if input_chars > self.models.long_input_chars => {
                self.models.summary_long.clone()
            }
            TaskKind::Summarization => self.models.summary_fast.clone(),
            TaskKind::Text2Text => self.models.text2text_fast.clone(),
        }
    }

    fn tokenizer_for(&self, model: &str) -> Arc<dyn Tokenizer> {
        match self.cache.tokenizer(model) {
            Ok(t) => t,
            Err(e) => {
                warn!(model, error = %e, "tokenizer unavailable, using word tokenizer");
                Arc::new(WordTokenizer::new(FALLBACK_CONTEXT_LIMIT))
            }
        }
    }

    /// Execute one request end to end.
    pub fn run(&self, request: &RunRequest) -> Result<Event, RunError> {
        let started = Instant::now();
        request.validate()?;
        let recipe = self.recipes.resolve(&request.recipe)?;

        let cleaned = text::normalize(&request.text);
        let input_chars = cleaned.chars().count();
        let model = self.choose_model(recipe, request.model_name.as_deref(), input_chars);

        let tokenizer = self.tokenizer_for(&model);
        let encoding = tokenizer.encode(&cleaned)?;
        let budget = chunker::source_token_budget(tokenizer.context_limit());
        let needs_chunks = encoding.len() > budget;
        debug!(
            recipe = %recipe.name,
            model = %model,
            tokens = encoding.len(),
            budget,
            needs_chunks,
            "planning run"
        );

        let (raw_output, chunks) = if needs_chunks {
            self.generate_chunked(recipe, &model, tokenizer.as_ref(), &encoding)?
        } else {
            let prompt = recipe.prompt(&cleaned);
            let out = self.generate(recipe, &model, &prompt)?;
            (bullets::to_bullets(&out, recipe.bullets), 1)
        };

        let options = SafeguardOptions { safe_mode: request.safe_mode, max_chars: request.max_chars };
        let redacted = safeguards::apply_safeguards(self.redactor.as_ref(), &cleaned, &raw_output, &options);

        let event = Event {
            id: Uuid::now_v7(),
            timestamp: events::timestamp_now(),
            recipe: recipe.name.clone(),
            model,
            input_excerpt: cleaned.chars().take(INPUT_EXCERPT_CHARS).collect(),
            output: redacted.text,
            latency_ms: started.elapsed().as_millis() as u64,
            chunks,
            safeguards: redacted.report,
            meta: request.meta.clone(),
        };
        info!(
            id = %event.id,
            recipe = %event.recipe,
            model = %event.model,
            chunks,
            latency_ms = event.latency_ms,
            truncated = event.safeguards.truncated,
            "run complete"
        );

        if request.persist {
            match &self.events {
                Some(log) => log.append(&event).inspect_err(|e| {
                    warn!(path = %log.path().display(), error = %e, "failed to persist event");
                })?,
                None => debug!("persist requested but no event log configured"),
            }
        }
        Ok(event)
    }

    fn generate(&self, recipe: &Recipe, model: &str, prompt: &str) -> Result<String, EngineError> {
        self.cache.generate(&GenerationRequest {
            task: recipe.task,
            model,
            prompt,
            params: &recipe.params,
        })
    }

    /// Generate per chunk, then merge all outputs into one bullet list.
    fn generate_chunked(
        &self,
        recipe: &Recipe,
        model: &str,
        tokenizer: &dyn Tokenizer,
        encoding: &Encoding,
    ) -> Result<(String, usize), RunError> {
        let plan = ChunkPlan::for_context_limit(tokenizer.context_limit());
        let windows = chunker::chunk_tokens(&encoding.ids, &plan)?;
        info!(
            recipe = %recipe.name,
            model,
            chunks = windows.len(),
            max_source_tokens = plan.max_source_tokens,
            "generating in chunks"
        );

        let mut parts = Vec::with_capacity(windows.len());
        for window in &windows {
            let piece = tokenizer.decode(encoding, window)?;
            let out = self.generate(recipe, model, &recipe.prompt(&piece))?;
            parts.push(out.trim().to_string());
        }
        let merged = parts.join("\n");
        Ok((bullets::to_bullets(&merged, recipe.bullets), windows.len()))
    }
}
