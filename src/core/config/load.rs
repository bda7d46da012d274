//! Configuration loading with env-var overrides.
//!
//! Reads TOML files, supports `[meta] base = "..."` inheritance chains,
//! and applies `OPS_COMPANION_WORK_DIR` and `OPS_COMPANION_LOG_LEVEL` env overrides.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::AppError;

use super::raw::{self, RawCompanion, RawConfig};
use super::types::*;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
const DEFAULT_WORK_DIR: &str = "~/.ops-companion";

/// Deep-merge two TOML values.
/// Tables are merged recursively; the overlay only needs to specify keys that
/// differ from the base. For every other type (string, integer, array, …)
/// the overlay value replaces the base value wholesale.
fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_tbl), toml::Value::Table(overlay_tbl)) => {
            for (key, ov_val) in overlay_tbl {
                let merged = match base_tbl.remove(&key) {
                    Some(base_val) => merge_toml(base_val, ov_val),
                    None => ov_val,
                };
                base_tbl.insert(key, merged);
            }
            toml::Value::Table(base_tbl)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file, follow any `[meta] base = "..."` chain, and return the
/// fully merged `toml::Value`. `visited` carries canonicalized paths already
/// seen in this chain so circular references are caught early.
fn load_raw_merged(path: &Path, visited: &mut HashSet<PathBuf>) -> Result<toml::Value, AppError> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical) {
        return Err(AppError::Config(format!(
            "circular base reference detected at: {}",
            path.display()
        )));
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let overlay_val: toml::Value = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    if let Some(base_str) = overlay_val
        .get("meta")
        .and_then(|m| m.get("base"))
        .and_then(|b| b.as_str())
    {
        let base_path = if Path::new(base_str).is_absolute() {
            PathBuf::from(base_str)
        } else {
            path.parent().unwrap_or(Path::new(".")).join(base_str)
        };
        let base_val = load_raw_merged(&base_path, visited)?;
        Ok(merge_toml(base_val, overlay_val))
    } else {
        Ok(overlay_val)
    }
}

/// Load config from the given path, or `config/default.toml`, then apply env-var overrides.
/// If no path is given and `config/default.toml` does not exist, returns the built-in defaults.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let work_dir_override = env::var("OPS_COMPANION_WORK_DIR").ok();
    let log_level_override = env::var("OPS_COMPANION_LOG_LEVEL").ok();

    if let Some(path) = config_path {
        return load_from(
            Path::new(path),
            work_dir_override.as_deref(),
            log_level_override.as_deref(),
        );
    }

    let default_path = Path::new(DEFAULT_CONFIG_PATH);
    if default_path.exists() {
        load_from(
            default_path,
            work_dir_override.as_deref(),
            log_level_override.as_deref(),
        )
    } else {
        Ok(builtin_default(
            work_dir_override.as_deref(),
            log_level_override.as_deref(),
        ))
    }
}

/// Defaults used when no config file exists.
pub fn builtin_default(work_dir_override: Option<&str>, log_level_override: Option<&str>) -> Config {
    let raw = RawConfig {
        companion: RawCompanion {
            name: raw::default_name(),
            work_dir: DEFAULT_WORK_DIR.to_string(),
            log_level: raw::default_log_level(),
            events_file: raw::default_events_file(),
        },
        engine: Default::default(),
        models: Default::default(),
        safeguards: Default::default(),
        service: Default::default(),
    };
    resolve(raw, work_dir_override, log_level_override)
}

/// Internal loader. Accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
/// Follows `[meta] base = "..."` inheritance chains before resolving.
pub fn load_from(
    path: &Path,
    work_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let merged_val = load_raw_merged(path, &mut HashSet::new())?;

    let parsed: RawConfig = Deserialize::deserialize(merged_val).map_err(|e: toml::de::Error| {
        AppError::Config(format!("config error in {}: {e}", path.display()))
    })?;

    Ok(resolve(parsed, work_dir_override, log_level_override))
}

fn resolve(
    parsed: RawConfig,
    work_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Config {
    let c = parsed.companion;

    let work_dir = expand_home(work_dir_override.unwrap_or(&c.work_dir));
    let log_level = log_level_override.unwrap_or(&c.log_level).to_string();
    let events_file = relative_to(&work_dir, &c.events_file);

    let defaults = ModelsConfig::default();
    let models = ModelsConfig {
        summary_fast: parsed.models.summary_fast.unwrap_or(defaults.summary_fast),
        summary_long: parsed.models.summary_long.unwrap_or(defaults.summary_long),
        text2text_fast: parsed.models.text2text_fast.unwrap_or(defaults.text2text_fast),
        long_input_chars: parsed.models.long_input_chars.unwrap_or(defaults.long_input_chars),
    };

    Config {
        name: c.name,
        log_level,
        events_file,
        engine: EngineConfig {
            provider: parsed.engine.provider,
            api_base_url: parsed.engine.api_base_url,
            timeout_seconds: parsed.engine.timeout_seconds,
            context_limit: parsed.engine.context_limit.max(1),
            tokenizer_dir: parsed
                .engine
                .tokenizer_dir
                .map(|dir| relative_to(&work_dir, &dir)),
            cache_capacity: parsed.engine.cache_capacity.max(1),
        },
        models,
        safeguards: SafeguardDefaults {
            safe_mode: parsed.safeguards.safe_mode,
            max_chars: parsed.safeguards.max_chars,
        },
        service: ServiceConfig { bind: parsed.service.bind },
        engine_api_token: env::var("HF_API_TOKEN").ok().filter(|t| !t.is_empty()),
        work_dir,
    }
}

/// Expand `~` and resolve relative paths against `base`.
fn relative_to(base: &Path, value: &str) -> PathBuf {
    let p = expand_home(value);
    if p.is_absolute() { p } else { base.join(p) }
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
