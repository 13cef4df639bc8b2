use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};


#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OperationType {
    Install,
    Remove,
    Service,
    Tweak,
}

impl OperationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Remove => "remove",
            Self::Service => "service",
            Self::Tweak => "tweak",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    InProgress,
    Succeeded,
    Failed,
    Skipped,
}

impl OperationStatus {
    /// Statuses left behind by an interrupted or failed run; candidates for
    /// an idempotent retry on the next startup.
    pub fn is_resumable(self) -> bool {
        matches!(self, Self::InProgress | Self::Failed)
    }
}

/// Persisted status snapshot for one (operation type, item) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperationStateRecord {
    #[serde(rename = "Status")]
    pub status: OperationStatus,
    #[serde(rename = "Timestamp")]
    pub timestamp_unix: u64,
    #[serde(rename = "Data", default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

type SnapshotFile = BTreeMap<String, BTreeMap<String, OperationStateRecord>>;

/// Full in-memory copy of the state file, as read at process start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateSnapshot {
    operations: SnapshotFile,
}

impl StateSnapshot {
    pub fn get(&self, operation: OperationType, item_id: &str) -> Option<&OperationStateRecord> {
        self.operations
            .get(operation.as_str())
            .and_then(|records| records.get(item_id))
    }

    pub fn records(
        &self,
        operation: OperationType,
    ) -> impl Iterator<Item = (&str, &OperationStateRecord)> {
        self.operations
            .get(operation.as_str())
            .into_iter()
            .flatten()
            .map(|(item_id, record)| (item_id.as_str(), record))
    }

    /// Items whose last recorded status warrants a retry from `Pending`.
    pub fn resumable(&self, operation: OperationType) -> Vec<String> {
        self.records(operation)
            .filter(|(_, record)| record.status.is_resumable())
            .map(|(item_id, _)| item_id.to_string())
            .collect()
    }
}

/// Durable key-value record of operation attempts, backed by one JSON file
/// rewritten in full on every save. Snapshot semantics: at most one record
/// per (operation, item) key, last write wins. Single writer by construction;
/// the orchestrator serializes all calls.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn save(
        &self,
        operation: OperationType,
        item_id: &str,
        status: OperationStatus,
        data: Option<String>,
    ) -> Result<()> {
        let mut snapshot = self.read_file()?;
        snapshot
            .entry(operation.as_str().to_string())
            .or_default()
            .insert(
                item_id.to_string(),
                OperationStateRecord {
                    status,
                    timestamp_unix: current_unix_timestamp()?,
                    data,
                },
            );
        self.write_file(&snapshot)
    }

    pub fn load(
        &self,
        operation: OperationType,
        item_id: &str,
    ) -> Result<Option<OperationStateRecord>> {
        let snapshot = self.read_file()?;
        Ok(snapshot
            .get(operation.as_str())
            .and_then(|records| records.get(item_id))
            .cloned())
    }

    /// Reads the whole snapshot once, for the startup recovery pass. A
    /// missing file is an empty store; an unreadable or corrupt file is an
    /// error, since resuming against a fabricated clean slate would skip the
    /// recovery pass entirely.
    pub fn load_all(&self) -> Result<StateSnapshot> {
        Ok(StateSnapshot {
            operations: self.read_file()?,
        })
    }

    fn read_file(&self) -> Result<SnapshotFile> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(SnapshotFile::new()),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed reading operation state: {}", self.path.display())
                });
            }
        };

        serde_json::from_str(&content)
            .with_context(|| format!("failed parsing operation state: {}", self.path.display()))
    }

    fn write_file(&self, snapshot: &SnapshotFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating state directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(snapshot).with_context(|| {
            format!("failed serializing operation state: {}", self.path.display())
        })?;
        fs::write(&self.path, content)
            .with_context(|| format!("failed writing operation state: {}", self.path.display()))
    }
}

pub fn current_unix_timestamp() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system time is before unix epoch")?
        .as_secs())
}
