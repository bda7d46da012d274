//! Safeguard policy properties.

use std::collections::BTreeMap;

use ops_companion::safeguards::patterns::{self, Category};
use ops_companion::safeguards::{
    apply_safeguards, BuiltinRedactor, Redacted, Redactor, SafeguardError, SafeguardOptions, SafeguardReport,
};

fn safe(max_chars: usize) -> SafeguardOptions {
    SafeguardOptions { safe_mode: true, max_chars }
}

fn builtin(input: &str, output: &str, options: SafeguardOptions) -> Redacted {
    apply_safeguards(&BuiltinRedactor, input, output, &options)
}

const SAMPLES: &[&str] = &[
    "",
    "plain text with nothing to hide",
    "Contact me at a@b.com now",
    "call +1 415 555 0100 or +91 98765 43210, mail x.y@corp.example.org",
    "aadhaar 1234 5678 9012 and card 4111111111111111 and token=abc",
    "Héllo wörld, naïve café résumé, emoji 🚀🚀🚀 and more text after it",
    "- bullet one\n- bullet two with api-key\n  continued line\n- three",
];

#[test]
fn test_short_limit_redacts_and_truncates() {
    let r = builtin("Contact me at a@b.com now", "Contact me at a@b.com now", safe(20));
    assert_eq!(r.report.redactions["email"], 1);
    assert!(r.report.truncated);
    assert!(r.text.chars().count() <= 20);
    assert!(r.text.ends_with('…'));
    assert!(!r.text.contains("a@b.com"));
}

#[test]
fn test_placeholder_kept_when_it_fits() {
    let r = builtin("", "Contact me at a@b.com now", safe(30));
    assert_eq!(r.text, "Contact me at [EMAIL] now");
    assert!(!r.report.truncated);
}

#[test]
fn test_safe_mode_never_exceeds_limit() {
    for sample in SAMPLES {
        for max_chars in [1, 5, 20, 50, 64, 600] {
            let r = builtin(sample, sample, safe(max_chars));
            let len = r.text.chars().count();
            assert!(len <= max_chars, "{len} > {max_chars} for {sample:?}");
            assert_eq!(r.report.truncated, r.text.ends_with('…'));
        }
    }
}

#[test]
fn test_unsafe_mode_is_identity() {
    for sample in SAMPLES {
        for max_chars in [0, 5, 600] {
            let r = builtin(sample, sample, SafeguardOptions { safe_mode: false, max_chars });
            assert_eq!(r.text, *sample);
            assert!(!r.report.truncated);
            assert!(r.report.redactions.values().all(|&n| n == 0));
        }
    }
}

#[test]
fn test_redaction_counts_match_placeholders() {
    for sample in SAMPLES {
        let r = builtin(sample, sample, safe(4000));
        assert!(!r.report.truncated);
        for category in Category::ALL {
            let placed = r.text.matches(category.placeholder()).count();
            assert_eq!(r.report.redactions[category.key()], placed, "{} in {sample:?}", category.key());
        }
    }
}

#[test]
fn test_flags_scan_input_in_both_modes() {
    let input = "my password and cvv, mail a@b.com";
    for safe_mode in [true, false] {
        let r = builtin(input, "clean output", SafeguardOptions { safe_mode, max_chars: 600 });
        assert_eq!(r.report.flags["email"], 1);
        assert_eq!(r.report.flags[patterns::KEYWORDS_FLAG], 2);
        assert_eq!(r.text, "clean output");
    }
}

#[test]
fn test_report_serialises_with_engine() {
    let r = builtin("", "x", safe(600));
    let json = serde_json::to_value(&r.report).unwrap();
    assert_eq!(json["engine"], "builtin");
    assert_eq!(json["redactions"].as_object().unwrap().len(), 5);
    assert_eq!(json["flags"].as_object().unwrap().len(), 6);
}

/// Ignores the requested limit.
struct WrongLimit;

impl Redactor for WrongLimit {
    fn name(&self) -> &str {
        "wrong-limit"
    }

    fn redact(&self, _: &str, output: &str, options: &SafeguardOptions) -> Result<Redacted, SafeguardError> {
        Ok(Redacted {
            text: output.to_string(),
            report: SafeguardReport {
                safe_mode: options.safe_mode,
                max_chars: options.max_chars + 1,
                truncated: false,
                redactions: BTreeMap::new(),
                flags: BTreeMap::new(),
                engine: "wrong-limit".into(),
            },
        })
    }
}

#[test]
fn test_disagreeing_report_triggers_fallback() {
    let r = apply_safeguards(&WrongLimit, "", "reach me at a@b.com", &safe(600));
    assert_eq!(r.report.engine, "builtin-fallback");
    assert_eq!(r.report.max_chars, 600);
    assert_eq!(r.text, "reach me at [EMAIL]");
}
