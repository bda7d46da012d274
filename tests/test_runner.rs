//! End-to-end runs against the dummy backend.

use std::fs;
use std::sync::Arc;

use ops_companion::config::{self, Config, ModelsConfig};
use ops_companion::engine::cache::ModelCache;
use ops_companion::engine::providers::{self, dummy::DummyBackend};
use ops_companion::engine::{Backend, EngineError, Pipeline, TaskKind, Tokenizer};
use ops_companion::events::EventLog;
use ops_companion::runner::{RunError, RunRequest, Runner};
use ops_companion::safeguards::{Redacted, Redactor, SafeguardError, SafeguardOptions};
use tempfile::TempDir;

fn runner_with(cfg: &Config) -> Runner {
    let backend = providers::build(&cfg.engine, None).unwrap();
    let cache = Arc::new(ModelCache::new(backend, cfg.engine.cache_capacity));
    Runner::from_config(cfg, cache)
}

fn story(words: usize) -> String {
    let base = [
        "Mara", "left", "the", "harbor", "at", "dawn.", "She", "found", "a", "map", "in", "her", "father's", "desk.",
        "The", "storm", "forced", "her", "crew", "to", "turn", "back.",
    ];
    base.iter().cycle().take(words).copied().collect::<Vec<_>>().join(" ")
}

#[test]
fn test_summary_of_short_input() {
    let dir = TempDir::new().unwrap();
    let runner = runner_with(&Config::test_default(dir.path()));

    let event = runner.run(&RunRequest::new(story(50))).unwrap();

    assert!(!event.output.is_empty());
    assert!(event.output.starts_with("- "));
    assert!(!event.safeguards.truncated);
    assert!(event.safeguards.safe_mode);
    assert_eq!(event.safeguards.max_chars, 600);
    assert_eq!(event.recipe, "summary");
    assert_eq!(event.model, ModelsConfig::default().summary_fast);
    assert_eq!(event.chunks, 1);
    assert!(event.timestamp.ends_with('Z'));
    // latency is whole milliseconds
    assert!(event.latency_ms < 60_000);
}

#[test]
fn test_long_input_is_chunked() {
    let dir = TempDir::new().unwrap();
    let mut cfg = Config::test_default(dir.path());
    cfg.engine.context_limit = 100;
    let runner = runner_with(&cfg);

    let mut req = RunRequest::new(story(200)).with_recipe("action_items");
    req.max_chars = 4000;
    let event = runner.run(&req).unwrap();

    // 36-token windows with an 18-token overlap over 200 words
    assert_eq!(event.chunks, 11);
    assert!(!event.output.is_empty());
    // merged chunk outputs are one line each, so one bullet per chunk
    assert_eq!(event.output.lines().filter(|l| l.starts_with("- ")).count(), event.chunks);
    assert!(!event.safeguards.truncated);
}

#[test]
fn test_long_summary_uses_long_model() {
    let dir = TempDir::new().unwrap();
    let runner = runner_with(&Config::test_default(dir.path()));
    let text = story(900);
    assert!(text.chars().count() > 4000);

    let event = runner.run(&RunRequest::new(text)).unwrap();
    assert_eq!(event.model, ModelsConfig::default().summary_long);
}

#[test]
fn test_model_override() {
    let dir = TempDir::new().unwrap();
    let runner = runner_with(&Config::test_default(dir.path()));
    let mut req = RunRequest::new(story(30)).with_recipe("brainstorm");
    req.model_name = Some("acme/tiny".into());
    assert_eq!(runner.run(&req).unwrap().model, "acme/tiny");
}

#[test]
fn test_events_are_persisted() {
    let dir = TempDir::new().unwrap();
    let cfg = Config::test_default(dir.path());
    let runner = runner_with(&cfg);

    runner.run(&RunRequest::new(story(20))).unwrap();
    let second = runner.run(&RunRequest::new(story(25)).with_recipe("brainstorm")).unwrap();

    let events = EventLog::new(&cfg.events_file).read_all().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1], second);
    assert_ne!(events[0].id, events[1].id);
}

#[test]
fn test_no_persist_leaves_log_untouched() {
    let dir = TempDir::new().unwrap();
    let cfg = Config::test_default(dir.path());
    let runner = runner_with(&cfg);
    let mut req = RunRequest::new(story(20));
    req.persist = false;
    runner.run(&req).unwrap();
    assert!(!cfg.events_file.exists());
}

#[test]
fn test_corrupt_log_is_backed_up() {
    let dir = TempDir::new().unwrap();
    let cfg = Config::test_default(dir.path());
    fs::write(&cfg.events_file, "[{\"truncated").unwrap();
    let runner = runner_with(&cfg);

    runner.run(&RunRequest::new(story(20))).unwrap();

    let backup = dir.path().join("events.bak.json");
    assert_eq!(fs::read_to_string(backup).unwrap(), "[{\"truncated");
    assert_eq!(EventLog::new(&cfg.events_file).read_all().unwrap().len(), 1);
}

#[test]
fn test_invalid_requests_are_rejected() {
    let dir = TempDir::new().unwrap();
    let cfg = Config::test_default(dir.path());
    let runner = runner_with(&cfg);

    let err = runner.run(&RunRequest::new("hi").with_recipe("nope")).unwrap_err();
    assert!(matches!(err, RunError::UnknownRecipe(_)));
    assert!(err.to_string().contains("summary, action_items, brainstorm"));

    let mut req = RunRequest::new("hi");
    req.max_chars = 10;
    assert!(matches!(runner.run(&req), Err(RunError::InvalidRequest(_))));

    assert!(!cfg.events_file.exists());
}

#[test]
fn test_safeguards_applied_to_output() {
    let dir = TempDir::new().unwrap();
    let runner = runner_with(&Config::test_default(dir.path()));
    let text = "Ping ravi@example.com or call +91 98765 43210. Rotate the api_key today.";

    let event = runner.run(&RunRequest::new(text)).unwrap();
    assert!(!event.output.contains("ravi@example.com"));
    assert_eq!(event.safeguards.redactions["email"], 1);
    assert_eq!(event.safeguards.redactions["phone"], 1);
    assert_eq!(event.safeguards.redactions["apikey_hint"], 1);
    assert_eq!(event.safeguards.flags["email"], 1);

    let mut unsafe_req = RunRequest::new(text);
    unsafe_req.safe_mode = false;
    let event = runner.run(&unsafe_req).unwrap();
    assert!(event.output.contains("ravi@example.com"));
    assert!(event.safeguards.redactions.values().all(|&n| n == 0));
    assert_eq!(event.safeguards.flags["email"], 1);
}

#[test]
fn test_output_respects_max_chars() {
    let dir = TempDir::new().unwrap();
    let runner = runner_with(&Config::test_default(dir.path()));
    let mut req = RunRequest::new(story(120)).with_recipe("action_items");
    req.max_chars = 50;
    let event = runner.run(&req).unwrap();
    assert!(event.output.chars().count() <= 50);
    assert!(event.safeguards.truncated);
    assert!(event.output.ends_with('…'));
}

struct Refusing;

impl Redactor for Refusing {
    fn name(&self) -> &str {
        "refusing"
    }

    fn redact(&self, _: &str, _: &str, _: &SafeguardOptions) -> Result<Redacted, SafeguardError> {
        Err(SafeguardError::Failed("unavailable".into()))
    }
}

#[test]
fn test_custom_redactor_falls_back() {
    let dir = TempDir::new().unwrap();
    let runner = runner_with(&Config::test_default(dir.path())).with_redactor(Arc::new(Refusing));
    let event = runner.run(&RunRequest::new("Mail a@b.com now. Then rest.")).unwrap();
    assert_eq!(event.safeguards.engine, "builtin-fallback");
    assert_eq!(event.safeguards.redactions["email"], 1);
}

/// Dummy generation, but every tokenizer load fails.
struct NoTokenizer(DummyBackend);

impl Backend for NoTokenizer {
    fn name(&self) -> &str {
        "no-tokenizer"
    }

    fn load(&self, task: TaskKind, model: &str) -> Result<Arc<dyn Pipeline>, EngineError> {
        self.0.load(task, model)
    }

    fn tokenizer(&self, model: &str) -> Result<Arc<dyn Tokenizer>, EngineError> {
        Err(EngineError::Tokenizer(format!("no tokenizer for {model}")))
    }
}

#[test]
fn test_tokenizer_failure_falls_back_to_word_tokenizer() {
    let cache = Arc::new(ModelCache::new(Arc::new(NoTokenizer(DummyBackend::new(None, 1024))), 2));
    let runner = Runner::new(ModelsConfig::default(), cache);
    let mut req = RunRequest::new(story(40));
    req.persist = false;
    let event = runner.run(&req).unwrap();
    assert_eq!(event.chunks, 1);
    assert!(!event.output.is_empty());
}

#[test]
fn test_default_config_file_loads() {
    let cfg = config::load_from(std::path::Path::new("config/default.toml"), Some("/tmp/oc-test"), None).unwrap();
    assert_eq!(cfg.engine.provider, "dummy");
    assert_eq!(cfg.models, ModelsConfig::default());
    assert_eq!(cfg.events_file, std::path::PathBuf::from("/tmp/oc-test/events.json"));
}
