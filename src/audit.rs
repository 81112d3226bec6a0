use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use thiserror::Error;
use crate::resolver::FailureKind;
use crate::trigger::EventKind;

#[derive(Error, Debug)]
pub enum Error {
    #[error("write audit log {path}: {err}")]
    Write {
        err: std::io::Error,
        path: String,
    },

    #[error("serialize audit record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// What happened during one resolution, independent of when.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub actor: String,
    pub git_ref: String,
    pub event_kind: EventKind,
    pub override_used: bool,
    pub override_notes: Option<String>,
    pub target_environment: String,
    pub should_deploy: bool,
    pub failure: Option<FailureKind>,
}

/// Audit trail of a resolution. Created once and never modified.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    entry: AuditEntry,
    /// SHA-256 over every field except the timestamp.
    fingerprint: String,
}

impl AuditRecord {
    pub fn new(timestamp: DateTime<Utc>, entry: AuditEntry) -> Self {
        let fingerprint = fingerprint(&entry);
        Self { timestamp, entry, fingerprint }
    }

    pub fn entry(&self) -> &AuditEntry {
        &self.entry
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }
}

fn fingerprint(entry: &AuditEntry) -> String {
    let event_kind = entry.event_kind.to_string();
    let override_used = entry.override_used.to_string();
    let should_deploy = entry.should_deploy.to_string();
    let failure = entry.failure.map(|f| f.to_string()).unwrap_or_default();
    let canonical = [
        entry.actor.as_str(),
        entry.git_ref.as_str(),
        event_kind.as_str(),
        override_used.as_str(),
        entry.override_notes.as_deref().unwrap_or_default(),
        entry.target_environment.as_str(),
        should_deploy.as_str(),
        failure.as_str(),
    ]
    .join("\n");
    sha256::digest(canonical)
}

/// Append-only JSON lines file. Existing content is never rewritten.
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn append(&self, record: &AuditRecord) -> Result<(), Error> {
        let line = record.to_json()?;
        let write_err = |err: std::io::Error| Error::Write {
            err,
            path: self.path.display().to_string(),
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(write_err)?;
        writeln!(file, "{line}").map_err(write_err)
    }
}

/// Emit the record through the logger under the `audit` target.
pub fn log(record: &AuditRecord) {
    match record.to_json() {
        Ok(json) => info!(target: "audit", "{json}"),
        Err(err) => warn!("audit record could not be serialized: {err}"),
    }
}
