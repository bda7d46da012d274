//! Output normalisation into a deduplicated, capped, wrapped bullet list.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// Column limit for wrapped bullet bodies.
pub const WRAP_WIDTH: usize = 120;

const CONTINUATION_INDENT: &str = "  ";

static BULLET_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[-•–]\s*").expect("static regex"));
static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]\s+").expect("static regex"));
static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\W+").expect("static regex"));

/// How many bullets a recipe keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulletCap {
    /// Lists shorter than `min` are kept whole; longer ones are cut to `max`.
    Range { min: usize, max: usize },
    /// Hard cap.
    AtMost(usize),
    Unbounded,
}

impl BulletCap {
    fn apply<T>(&self, items: &mut Vec<T>) {
        match *self {
            BulletCap::Range { min, max } if items.len() >= min => items.truncate(max),
            BulletCap::Range { .. } | BulletCap::Unbounded => {}
            BulletCap::AtMost(n) => items.truncate(n),
        }
    }
}

/// Normalise raw generated text into `- ` bullets, one per line group.
///
/// Text with two or more non-empty lines (or a single already-bulleted line)
/// is split by line, with one leading bullet marker stripped and indented
/// continuation lines joined to the bullet above. Anything else is split into
/// sentences. Candidates are deduplicated case- and punctuation-insensitively,
/// capped, and wrapped at [`WRAP_WIDTH`] columns.
///
/// Running it on its own output returns the same text.
pub fn to_bullets(raw: &str, cap: BulletCap) -> String {
    let mut bullets = dedupe(candidates(raw));
    cap.apply(&mut bullets);
    bullets
        .iter()
        .map(|body| format!("- {}", wrap(body)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn candidates(raw: &str) -> Vec<String> {
    let lines: Vec<&str> = raw.lines().filter(|l| !l.trim().is_empty()).collect();
    let single_bullet = lines.len() == 1 && BULLET_MARKER.is_match(lines[0]);
    if lines.len() >= 2 || single_bullet {
        line_candidates(&lines)
    } else {
        sentence_candidates(raw)
    }
}

fn line_candidates(lines: &[&str]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for line in lines {
        let indented = line.starts_with(char::is_whitespace);
        let trimmed = line.trim();
        let is_marked = BULLET_MARKER.is_match(trimmed);
        if indented && !is_marked {
            if let Some(prev) = out.last_mut() {
                prev.push(' ');
                prev.push_str(trimmed);
                continue;
            }
        }
        let body = BULLET_MARKER.replace(trimmed, "");
        let body = body.trim();
        if !body.is_empty() {
            out.push(body.to_string());
        }
    }
    out
}

fn sentence_candidates(raw: &str) -> Vec<String> {
    let text = raw.trim();
    let mut out = Vec::new();
    let mut start = 0;
    for m in SENTENCE_END.find_iter(text) {
        // keep the punctuation mark, drop the whitespace after it
        push_sentence(&mut out, &text[start..m.start() + 1]);
        start = m.end();
    }
    push_sentence(&mut out, &text[start..]);
    out
}

fn push_sentence(out: &mut Vec<String>, sentence: &str) {
    let t = sentence.trim_matches(|c| matches!(c, ' ' | '\n' | '-' | '•' | '–'));
    if !t.is_empty() {
        out.push(t.to_string());
    }
}

/// Lowercase, non-word runs collapsed to one space, trimmed.
fn dedupe_key(body: &str) -> String {
    NON_WORD.replace_all(&body.to_lowercase(), " ").trim().to_string()
}

fn dedupe(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| {
            let key = dedupe_key(item);
            !key.is_empty() && seen.insert(key)
        })
        .collect()
}

fn starts_with_marker(word: &str) -> bool {
    word.starts_with(['-', '•', '–'])
}

/// Greedy word wrap. The first line holds up to `WRAP_WIDTH` characters of body;
/// continuation lines count their two-space indent against the width. Words
/// longer than a line are kept whole.
///
/// A continuation line never starts with a word beginning with a bullet
/// marker, since it would read back as a new bullet. Such a word stays on the
/// current line even past the width.
fn wrap(body: &str) -> String {
    let mut out = String::new();
    let mut line_len = 0;
    let mut line_start = true;
    for word in body.split_whitespace() {
        let word_len = word.chars().count();
        if !line_start && line_len + 1 + word_len > WRAP_WIDTH && !starts_with_marker(word) {
            out.push('\n');
            out.push_str(CONTINUATION_INDENT);
            line_len = CONTINUATION_INDENT.len();
            line_start = true;
        }
        if !line_start {
            out.push(' ');
            line_len += 1;
        }
        out.push_str(word);
        line_len += word_len;
        line_start = false;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUMMARY: BulletCap = BulletCap::Range { min: 5, max: 8 };

    #[test]
    fn line_mode_strips_markers() {
        let out = to_bullets("• first point\n– second point\n  - third point\nfourth", BulletCap::Unbounded);
        assert_eq!(out, "- first point\n- second point\n- third point\n- fourth");
    }

    #[test]
    fn sentence_mode_splits_on_terminal_punctuation() {
        let out = to_bullets("The cat sat. The dog ran! Did it rain? Yes", BulletCap::Unbounded);
        assert_eq!(out, "- The cat sat.\n- The dog ran!\n- Did it rain?\n- Yes");
    }

    #[test]
    fn sentence_mode_strips_bullet_chars() {
        let out = to_bullets("  Keep going.   – Stop here –  ", BulletCap::Unbounded);
        assert_eq!(out, "- Keep going.\n- Stop here");
    }

    #[test]
    fn dedupe_ignores_case_and_punctuation() {
        let out = to_bullets("Ship the report.\nship the report\nSHIP, the report!", BulletCap::Unbounded);
        assert_eq!(out, "- Ship the report.");
    }

    #[test]
    fn punctuation_only_lines_are_dropped() {
        let out = to_bullets("real line\n...\n- !!", BulletCap::Unbounded);
        assert_eq!(out, "- real line");
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert_eq!(to_bullets("", SUMMARY), "");
        assert_eq!(to_bullets("  \n \n", SUMMARY), "");
    }

    #[test]
    fn range_cap_keeps_short_lists_whole() {
        let four = "a1\nb2\nc3\nd4";
        assert_eq!(to_bullets(four, SUMMARY).lines().count(), 4);

        let ten = (0..10).map(|i| format!("point {i}")).collect::<Vec<_>>().join("\n");
        let out = to_bullets(&ten, SUMMARY);
        assert_eq!(out.lines().count(), 8);
        assert!(out.ends_with("- point 7"));
    }

    #[test]
    fn hard_cap() {
        let many = (0..20).map(|i| format!("idea {i}")).collect::<Vec<_>>().join("\n");
        assert_eq!(to_bullets(&many, BulletCap::AtMost(12)).lines().count(), 12);
        assert_eq!(to_bullets(&many, BulletCap::Unbounded).lines().count(), 20);
    }

    #[test]
    fn long_bodies_wrap_with_indent() {
        let body = vec!["word"; 60].join(" ");
        let out = to_bullets(&format!("{body}\nshort"), BulletCap::Unbounded);
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines.len() >= 3);
        assert!(lines[0].starts_with("- word"));
        assert!(lines[1].starts_with("  word"));
        assert!(lines[0].chars().count() <= WRAP_WIDTH + 2);
        assert!(lines[1].chars().count() <= WRAP_WIDTH);
        assert_eq!(*lines.last().unwrap(), "- short");
    }

    #[test]
    fn idempotent_on_own_output() {
        let long = vec!["alpha beta gamma."; 20].join(" ");
        let inputs = [
            "The cat sat. The dog ran. The cat sat.".to_string(),
            "• one\n• two\n• One!".to_string(),
            format!("{long}\nsecond bullet"),
            long.clone(),
            "- A single bullet. With two sentences.".to_string(),
            format!("{} -5% growth expected\nsecond bullet", "abcdefghi ".repeat(12).trim_end()),
            format!("{} – aside – and more\nnext", "x".repeat(118)),
        ];
        for input in &inputs {
            let once = to_bullets(input, BulletCap::Unbounded);
            assert_eq!(to_bullets(&once, BulletCap::Unbounded), once, "input: {input:?}");
        }
    }

    #[test]
    fn marker_words_never_open_a_continuation_line() {
        let filler = "abcdefghi ".repeat(12);
        let out = to_bullets(&format!("{}-5% growth expected\nsecond", filler), BulletCap::Unbounded);
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].ends_with(" -5%"), "{out}");
        assert_eq!(lines[1], "  growth expected");
        assert_eq!(lines[2], "- second");
        assert!(out.contains("-5%"));
    }

    #[test]
    fn merged_chunk_outputs_are_rebulleted() {
        let merged = "- Ship the report.\n- Book the venue.\n- ship the report\n- Call Sam.";
        assert_eq!(
            to_bullets(merged, BulletCap::AtMost(12)),
            "- Ship the report.\n- Book the venue.\n- Call Sam."
        );
    }
}
