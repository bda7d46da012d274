//! Input text normalisation.

use std::sync::LazyLock;

use regex::Regex;

static EXCESS_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("static regex"));
static HORIZONTAL_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("static regex"));

/// Clean raw input before it reaches a tokenizer or prompt.
///
/// Carriage returns become newlines, three or more consecutive newlines
/// collapse to a blank line, runs of spaces/tabs collapse to one space, and
/// surrounding whitespace is trimmed. Total over any input.
pub fn normalize(raw: &str) -> String {
    let text = raw.replace('\r', "\n");
    let text = EXCESS_NEWLINES.replace_all(&text, "\n\n");
    let text = HORIZONTAL_SPACE.replace_all(&text, " ");
    text.trim().to_string()
}
