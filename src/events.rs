//! Run events and the JSON-array event log.
//!
//! The log is a single file holding a JSON array of events. Every append
//! rewrites the whole file through a temp file and a rename, under a
//! process-wide lock, so concurrent runs never lose each other's events.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::safeguards::SafeguardReport;

/// Serialises every read-modify-write of any event log in the process.
static LOG_LOCK: Mutex<()> = Mutex::new(());

/// One completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    /// RFC 3339, UTC, millisecond precision.
    pub timestamp: String,
    pub recipe: String,
    pub model: String,
    /// First 2000 characters of the normalised input.
    pub input_excerpt: String,
    pub output: String,
    pub latency_ms: u64,
    /// Number of chunks generated (1 for a single pass).
    pub chunks: usize,
    pub safeguards: SafeguardReport,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

pub fn timestamp_now() -> String {
    format_timestamp(Utc::now())
}

fn format_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("event log io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot serialize event log: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<stem>.bak.json` next to the log.
    pub fn backup_path(&self) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "events".to_string());
        self.path.with_file_name(format!("{stem}.bak.json"))
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "events.json".to_string());
        self.path.with_file_name(format!("{name}.tmp"))
    }

    fn io_err(&self, source: io::Error) -> EventLogError {
        EventLogError::Io { path: self.path.clone(), source }
    }

    /// Read the current array. `Ok(None)` means the file exists but is not a JSON array.
    fn read_array(&self) -> Result<Option<Vec<Value>>, EventLogError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Some(Vec::new())),
            Err(e) => return Err(self.io_err(e)),
        };
        if raw.trim().is_empty() {
            return Ok(Some(Vec::new()));
        }
        Ok(serde_json::from_str::<Vec<Value>>(&raw).ok())
    }

    /// Append `event`, moving a corrupt log aside first.
    pub fn append(&self, event: &Event) -> Result<(), EventLogError> {
        let _guard = LOG_LOCK.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }

        let mut events = match self.read_array()? {
            Some(events) => events,
            None => {
                let backup = self.backup_path();
                warn!(
                    path = %self.path.display(),
                    backup = %backup.display(),
                    "event log is not a JSON array, moving it aside"
                );
                fs::rename(&self.path, &backup).map_err(|e| self.io_err(e))?;
                Vec::new()
            }
        };
        events.push(serde_json::to_value(event)?);

        let data = serde_json::to_string_pretty(&events)?;
        let tmp = self.temp_path();
        fs::write(&tmp, data).map_err(|e| self.io_err(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))?;
        debug!(path = %self.path.display(), total = events.len(), "event appended");
        Ok(())
    }

    /// All events in the log; a corrupt log reads as empty and is left in place.
    /// Entries that do not decode as events are skipped.
    pub fn read_all(&self) -> Result<Vec<Event>, EventLogError> {
        let _guard = LOG_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let values = self.read_array()?.unwrap_or_default();
        Ok(values
            .into_iter()
            .filter_map(|v| serde_json::from_value::<Event>(v).ok())
            .collect())
    }
}
