//! Recipe registry: named instruction templates with generation parameters.
//!
//! The registry is assembled once at startup and then only read; requests
//! select a recipe by name.

use thiserror::Error;
use tracing::warn;

use crate::bullets::BulletCap;
use crate::engine::{GenerationParams, TaskKind};

pub const DEFAULT_RECIPE: &str = "summary";

const SUMMARY_PREFIX: &str = "Summarize the following STORY as clear bullet points. \
Focus on plot beats, key events, and changes to the main character. \
Return 5–8 concise bullet points:\n";

const ACTION_ITEMS_PREFIX: &str = "From the following text, extract ACTION ITEMS as bullet points. \
Each bullet must start with an imperative verb and include owner if present and an optional due hint. \
Do NOT invent owners or dates. Return 5–10 bullets if available:\n";

const BRAINSTORM_PREFIX: &str = "Brainstorm creative IDEAS based on the following text. \
Return 6–10 short, non-redundant bullet points. \
Make them concrete, varied, and useful; avoid fluff:\n";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown recipe '{name}'; valid recipes: {}", .valid.join(", "))]
pub struct UnknownRecipeError {
    pub name: String,
    pub valid: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub name: String,
    pub instruction_prefix: String,
    pub task: TaskKind,
    pub params: GenerationParams,
    pub bullets: BulletCap,
}

impl Recipe {
    /// Full prompt for `text`: the instruction prefix, a newline, then the text.
    pub fn prompt(&self, text: &str) -> String {
        format!("{}\n{}", self.instruction_prefix, text)
    }
}

#[derive(Debug, Clone)]
pub struct RecipeRegistry {
    recipes: Vec<Recipe>,
}

impl RecipeRegistry {
    /// The three stock recipes: summary, action_items, brainstorm.
    pub fn builtin() -> Self {
        let summary = Recipe {
            name: "summary".into(),
            instruction_prefix: SUMMARY_PREFIX.into(),
            task: TaskKind::Summarization,
            params: GenerationParams::beam_search(160, 60),
            bullets: BulletCap::Range { min: 5, max: 8 },
        };
        let action_items = Recipe {
            name: "action_items".into(),
            instruction_prefix: ACTION_ITEMS_PREFIX.into(),
            task: TaskKind::Text2Text,
            params: GenerationParams::beam_search(180, 60),
            bullets: BulletCap::AtMost(12),
        };
        let brainstorm = Recipe {
            name: "brainstorm".into(),
            instruction_prefix: BRAINSTORM_PREFIX.into(),
            task: TaskKind::Text2Text,
            params: GenerationParams {
                max_length: 200,
                min_length: Some(70),
                do_sample: true,
                num_beams: None,
                no_repeat_ngram_size: Some(3),
                length_penalty: None,
                early_stopping: None,
                top_p: Some(0.92),
                top_k: Some(50),
                temperature: Some(0.95),
                num_return_sequences: Some(1),
            },
            bullets: BulletCap::AtMost(12),
        };
        Self { recipes: vec![summary, action_items, brainstorm] }
    }

    /// Register an extra recipe. A name that is already taken is ignored.
    pub fn with_recipe(mut self, recipe: Recipe) -> Self {
        if self.contains(&recipe.name) {
            warn!(recipe = %recipe.name, "recipe already registered, ignoring");
        } else {
            self.recipes.push(recipe);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Recipe> {
        self.recipes.iter().find(|r| r.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.recipes.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn resolve(&self, name: &str) -> Result<&Recipe, UnknownRecipeError> {
        self.get(name).ok_or_else(|| UnknownRecipeError {
            name: name.to_string(),
            valid: self.names().into_iter().map(str::to_string).collect(),
        })
    }

    /// Build the prompt for `text` under recipe `name`.
    pub fn apply_recipe(&self, name: &str, text: &str) -> Result<String, UnknownRecipeError> {
        Ok(self.resolve(name)?.prompt(text))
    }
}

impl Default for RecipeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
