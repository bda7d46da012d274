//! Heuristic PII patterns, redaction and input scanning.
//!
//! The patterns are deliberately simple and will miss or over-match; they are
//! a guard rail, not a detector.

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("static regex")
});
// Anchored: candidates are tested at each start position, see `phone_spans`.
static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\+?\d{1,3}[-.\s]?)?(?:\d[ -]?){9,12}$").expect("static regex")
});
static AADHAAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4}\s?\d{4}\s?\d{4}\b").expect("static regex"));
static CREDIT_CARD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:\d[ -]*?){13,19}\b").expect("static regex"));
static API_KEY_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:api[_-]?key|secret[_-]?key|token)\b").expect("static regex")
});

/// Longest text the phone pattern can match, in bytes (all ASCII).
const PHONE_MAX_LEN: usize = 1 + 3 + 1 + 12 * 2;
const PHONE_MIN_LEN: usize = 9;

/// Case-insensitive substrings counted under the `keywords` flag.
pub const SENSITIVE_KEYWORDS: &[&str] = &[
    "password",
    "passwd",
    "secret",
    "credential",
    "otp",
    "api key",
    "secret key",
    "access token",
    "bearer",
    "ssn",
    "aadhaar",
    "pan number",
    "credit card",
    "cvv",
];

pub const KEYWORDS_FLAG: &str = "keywords";

/// Redaction categories in the order they are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Email,
    Phone,
    Aadhaar,
    CreditCard,
    ApiKeyHint,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Email,
        Category::Phone,
        Category::Aadhaar,
        Category::CreditCard,
        Category::ApiKeyHint,
    ];

    /// Key used in redaction and flag maps.
    pub fn key(&self) -> &'static str {
        match self {
            Category::Email => "email",
            Category::Phone => "phone",
            Category::Aadhaar => "aadhaar",
            Category::CreditCard => "creditcard",
            Category::ApiKeyHint => "apikey_hint",
        }
    }

    pub fn placeholder(&self) -> &'static str {
        match self {
            Category::Email => "[EMAIL]",
            Category::Phone => "[PHONE]",
            Category::Aadhaar => "[AADHAAR]",
            Category::CreditCard => "[CARD]",
            Category::ApiKeyHint => "[SECRET]",
        }
    }

    /// Non-overlapping byte ranges matched in `text`, left to right.
    pub fn spans(&self, text: &str) -> Vec<Range<usize>> {
        let re = match self {
            Category::Phone => return phone_spans(text),
            Category::Email => &*EMAIL,
            Category::Aadhaar => &*AADHAAR,
            Category::CreditCard => &*CREDIT_CARD,
            Category::ApiKeyHint => &*API_KEY_HINT,
        };
        re.find_iter(text).map(|m| m.range()).collect()
    }
}

/// Phone numbers must not touch another digit on either side.
///
/// For every start not preceded by a digit, take the longest candidate that
/// matches the pattern and is not followed by a digit. A trailing separator is
/// left outside the span.
fn phone_spans(text: &str) -> Vec<Range<usize>> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut start = 0;
    while start < bytes.len() {
        let b = bytes[start];
        let can_start = (b == b'+' || b.is_ascii_digit()) && (start == 0 || !bytes[start - 1].is_ascii_digit());
        if can_start {
            if let Some(mut end) = longest_phone_at(text, start) {
                while matches!(bytes[end - 1], b' ' | b'-') {
                    end -= 1;
                }
                spans.push(start..end);
                start = end;
                continue;
            }
        }
        start += 1;
    }
    spans
}

fn longest_phone_at(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let upper = (start + PHONE_MAX_LEN).min(bytes.len());
    (start + PHONE_MIN_LEN..=upper).rev().find(|&end| {
        text.is_char_boundary(end)
            && bytes.get(end).is_none_or(|b| !b.is_ascii_digit())
            && PHONE.is_match(&text[start..end])
    })
}

/// Replace every span of `category` in `text` with its placeholder.
fn redact_category(text: &str, category: Category) -> (String, usize) {
    let spans = category.spans(text);
    if spans.is_empty() {
        return (text.to_string(), 0);
    }
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for span in &spans {
        out.push_str(&text[last..span.start]);
        out.push_str(category.placeholder());
        last = span.end;
    }
    out.push_str(&text[last..]);
    (out, spans.len())
}

/// All-zero redaction counts, one entry per category.
pub fn empty_counts() -> BTreeMap<String, usize> {
    Category::ALL.iter().map(|c| (c.key().to_string(), 0)).collect()
}

/// Apply every category in order; later patterns see earlier placeholders.
///
/// Returns the redacted text and the number of replacements per category.
pub fn redact_pii(text: &str) -> (String, BTreeMap<String, usize>) {
    let mut counts = BTreeMap::new();
    let mut current = text.to_string();
    for category in Category::ALL {
        let (next, n) = redact_category(&current, category);
        counts.insert(category.key().to_string(), n);
        current = next;
    }
    (current, counts)
}

/// Count possible PII markers in `text` without changing it.
///
/// Each category is counted on the unmodified text; `keywords` is the number
/// of distinct entries of [`SENSITIVE_KEYWORDS`] present.
pub fn scan_text(text: &str) -> BTreeMap<String, usize> {
    let mut flags: BTreeMap<String, usize> = Category::ALL
        .iter()
        .map(|c| (c.key().to_string(), c.spans(text).len()))
        .collect();
    let lower = text.to_lowercase();
    let keywords = SENSITIVE_KEYWORDS.iter().filter(|k| lower.contains(*k)).count();
    flags.insert(KEYWORDS_FLAG.to_string(), keywords);
    flags
}

/// Byte ranges of placeholder tokens present in `text`.
pub(crate) fn placeholder_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans: Vec<Range<usize>> = Category::ALL
        .iter()
        .flat_map(|c| text.match_indices(c.placeholder()).map(|(i, p)| i..i + p.len()))
        .collect();
    spans.sort_by_key(|s| s.start);
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redacted(text: &str) -> String {
        redact_pii(text).0
    }

    #[test]
    fn email_is_redacted() {
        let (out, counts) = redact_pii("mail a.b+c@example.co.uk or x@y.io");
        assert_eq!(out, "mail [EMAIL] or [EMAIL]");
        assert_eq!(counts["email"], 2);
    }

    #[test]
    fn phone_with_country_code_and_separators() {
        assert_eq!(redacted("call +91 98765 43210 today"), "call [PHONE] today");
        assert_eq!(redacted("call 555-123-4567."), "call [PHONE].");
    }

    #[test]
    fn phone_not_adjacent_to_digits() {
        // 20 digits in a row: no 9..12 digit window is digit-bounded
        let long = "12345678901234567890";
        assert!(Category::Phone.spans(long).is_empty());
        // too short
        assert!(Category::Phone.spans("ref 12345678").is_empty());
    }

    #[test]
    fn aadhaar_groups() {
        let text = "id 1234 5678 9012";
        assert_eq!(Category::Aadhaar.spans(text).len(), 1);
        // Phone runs first and claims the 12 digits.
        let (out, counts) = redact_pii(text);
        assert_eq!(out, "id [PHONE]");
        assert_eq!(counts["phone"], 1);
        assert_eq!(counts["aadhaar"], 0);
    }

    #[test]
    fn card_numbers() {
        let (out, counts) = redact_pii("card 4111111111111111 ok");
        assert_eq!(out, "card [CARD] ok");
        assert_eq!(counts["creditcard"], 1);
        assert_eq!(counts["phone"], 0);
    }

    #[test]
    fn grouped_card_is_partly_claimed_by_phone() {
        // Phone runs first and takes the longest digit-bounded prefix.
        let (out, counts) = redact_pii("card 4111-1111-1111-1111 ok");
        assert_eq!(out, "card [PHONE]-1111 ok");
        assert_eq!(counts["phone"], 1);
        assert!(!out.contains("4111"));
    }

    #[test]
    fn api_key_hints_case_insensitive() {
        let (out, counts) = redact_pii("set API_KEY and secret-key and Token, not tokens");
        assert_eq!(out, "set [SECRET] and [SECRET] and [SECRET], not tokens");
        assert_eq!(counts["apikey_hint"], 3);
    }

    #[test]
    fn counts_cover_every_category() {
        let (out, counts) = redact_pii("nothing here");
        assert_eq!(out, "nothing here");
        assert_eq!(counts, empty_counts());
        assert_eq!(counts.len(), 5);
    }

    #[test]
    fn scan_counts_original_text_and_keywords() {
        let flags = scan_text("Password: hunter2, mail a@b.com, OTP 1234, Bearer token");
        assert_eq!(flags["email"], 1);
        assert_eq!(flags["apikey_hint"], 1);
        // password, otp, bearer
        assert_eq!(flags[KEYWORDS_FLAG], 3);
        assert_eq!(flags.len(), 6);
    }

    #[test]
    fn keywords_counted_once_each() {
        let flags = scan_text("secret secret SECRET");
        assert_eq!(flags[KEYWORDS_FLAG], 1);
    }

    #[test]
    fn non_ascii_text_is_safe() {
        let (out, _) = redact_pii("José → +44 20 7946 0958 ✓ ünïcødé");
        assert_eq!(out, "José → [PHONE] ✓ ünïcødé");
    }

    #[test]
    fn finds_placeholders() {
        let spans = placeholder_spans("a [PHONE] b [EMAIL]");
        assert_eq!(spans, vec![2..9, 12..19]);
    }
}
