//! Output safeguards: PII redaction, length truncation and an input audit scan.
//!
//! A [`Redactor`] turns `(input, output, options)` into the text to return plus
//! a [`SafeguardReport`]. [`BuiltinRedactor`] is the default. Custom redactors
//! go through [`apply_safeguards`], which falls back to the built-in algorithm
//! when they fail or break the length policy.

pub mod patterns;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Marker appended to truncated output.
pub const ELLIPSIS: char = '…';

pub const BUILTIN_ENGINE: &str = "builtin";
pub const FALLBACK_ENGINE: &str = "builtin-fallback";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeguardOptions {
    pub safe_mode: bool,
    pub max_chars: usize,
}

impl Default for SafeguardOptions {
    fn default() -> Self {
        Self { safe_mode: true, max_chars: 600 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeguardReport {
    pub safe_mode: bool,
    pub max_chars: usize,
    pub truncated: bool,
    /// Replacements performed, per category.
    pub redactions: BTreeMap<String, usize>,
    /// Markers found in the original input, per category plus `keywords`.
    pub flags: BTreeMap<String, usize>,
    /// Which redactor produced this report.
    pub engine: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redacted {
    pub text: String,
    pub report: SafeguardReport,
}

#[derive(Debug, Error)]
pub enum SafeguardError {
    #[error("redactor failed: {0}")]
    Failed(String),
    #[error("redactor returned an invalid report: {0}")]
    InvalidReport(String),
}

/// Pluggable redaction policy.
pub trait Redactor: Send + Sync {
    fn name(&self) -> &str;

    /// Produce the text to return for `output`, given the original `input`.
    fn redact(&self, input: &str, output: &str, options: &SafeguardOptions) -> Result<Redacted, SafeguardError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinRedactor;

impl BuiltinRedactor {
    fn run(&self, input: &str, output: &str, options: &SafeguardOptions, engine: &str) -> Redacted {
        let flags = patterns::scan_text(input);
        if !options.safe_mode {
            return Redacted {
                text: output.to_string(),
                report: SafeguardReport {
                    safe_mode: false,
                    max_chars: options.max_chars,
                    truncated: false,
                    redactions: patterns::empty_counts(),
                    flags,
                    engine: engine.to_string(),
                },
            };
        }

        let (redacted, redactions) = patterns::redact_pii(output);
        let (text, truncated) = truncate(&redacted, options.max_chars);
        Redacted {
            text,
            report: SafeguardReport {
                safe_mode: true,
                max_chars: options.max_chars,
                truncated,
                redactions,
                flags,
                engine: engine.to_string(),
            },
        }
    }
}

impl Redactor for BuiltinRedactor {
    fn name(&self) -> &str {
        BUILTIN_ENGINE
    }

    fn redact(&self, input: &str, output: &str, options: &SafeguardOptions) -> Result<Redacted, SafeguardError> {
        Ok(self.run(input, output, options, BUILTIN_ENGINE))
    }
}

/// Cut `text` to at most `max_chars` characters, ellipsis included.
///
/// Keeps `max_chars - 1` characters, never splitting a redaction placeholder,
/// strips trailing whitespace and appends [`ELLIPSIS`]. Returns the text and
/// whether it was cut.
pub fn truncate(text: &str, max_chars: usize) -> (String, bool) {
    if text.chars().count() <= max_chars {
        return (text.to_string(), false);
    }
    if max_chars == 0 {
        return (String::new(), true);
    }

    let mut cut = text
        .char_indices()
        .nth(max_chars - 1)
        .map_or(text.len(), |(i, _)| i);
    if let Some(span) = patterns::placeholder_spans(text)
        .into_iter()
        .find(|s| s.start < cut && cut < s.end)
    {
        cut = span.start;
    }

    let mut out = text[..cut].trim_end().to_string();
    out.push(ELLIPSIS);
    (out, true)
}

/// Check a redactor's result against the policy it was asked to enforce.
fn validate(redacted: &Redacted, options: &SafeguardOptions) -> Result<(), SafeguardError> {
    let report = &redacted.report;
    if report.safe_mode != options.safe_mode || report.max_chars != options.max_chars {
        return Err(SafeguardError::InvalidReport(format!(
            "report options (safe_mode={}, max_chars={}) differ from request (safe_mode={}, max_chars={})",
            report.safe_mode, report.max_chars, options.safe_mode, options.max_chars
        )));
    }
    let len = redacted.text.chars().count();
    if options.safe_mode && len > options.max_chars {
        return Err(SafeguardError::InvalidReport(format!(
            "output has {len} chars, limit is {}",
            options.max_chars
        )));
    }
    Ok(())
}

/// Run `redactor`, falling back to the built-in algorithm on error or on a
/// result that violates the requested options. Never fails.
pub fn apply_safeguards(
    redactor: &dyn Redactor,
    input: &str,
    output: &str,
    options: &SafeguardOptions,
) -> Redacted {
    let result = redactor
        .redact(input, output, options)
        .and_then(|r| validate(&r, options).map(|()| r));
    match result {
        Ok(redacted) => redacted,
        Err(e) => {
            warn!(redactor = redactor.name(), error = %e, "redactor rejected, using built-in fallback");
            BuiltinRedactor.run(input, output, options, FALLBACK_ENGINE)
        }
    }
}
