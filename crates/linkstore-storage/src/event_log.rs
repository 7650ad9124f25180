//! Append-only NDJSON event log.
//!
//! Each line is one [`LogEvent`], either a link entry or an owner
//! registration:
//!
//! ```text
//! {"uuid":1,"original_url":"https://example.com","short_url":"lk000000"}
//! {"uuid":2,"registered_user_id":7}
//! ```
//!
//! `user_id` and `is_deleted` are written only when set, so logs produced
//! without owners or deletions keep the three-field shape.

use linkstore_core::{OwnerId, Result, ShortCode, StorageError};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One durable record of a creation (or soft-deletion) event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Monotonic position of the entry within the log.
    #[serde(rename = "uuid")]
    pub sequence: u64,
    #[serde(rename = "original_url")]
    pub origin: String,
    #[serde(rename = "short_url")]
    pub code: ShortCode,
    #[serde(rename = "user_id", default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerId>,
    /// Marks a soft-deletion of `code` rather than its creation.
    #[serde(rename = "is_deleted", default, skip_serializing_if = "is_false")]
    pub deleted: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl LogEntry {
    pub fn created(sequence: u64, code: ShortCode, origin: String, owner: Option<OwnerId>) -> Self {
        Self {
            sequence,
            origin,
            code,
            owner,
            deleted: false,
        }
    }

    pub fn deleted(sequence: u64, code: ShortCode, origin: String, owner: Option<OwnerId>) -> Self {
        Self {
            sequence,
            origin,
            code,
            owner,
            deleted: true,
        }
    }
}

/// Allocation of an owner id, logged so ids stay unique across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRegistration {
    #[serde(rename = "uuid")]
    pub sequence: u64,
    #[serde(rename = "registered_user_id")]
    pub owner: OwnerId,
}

/// One line of the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogEvent {
    Link(LogEntry),
    OwnerRegistered(OwnerRegistration),
}

impl LogEvent {
    pub fn sequence(&self) -> u64 {
        match self {
            LogEvent::Link(entry) => entry.sequence,
            LogEvent::OwnerRegistered(registration) => registration.sequence,
        }
    }
}

impl From<LogEntry> for LogEvent {
    fn from(entry: LogEntry) -> Self {
        LogEvent::Link(entry)
    }
}

impl From<OwnerRegistration> for LogEvent {
    fn from(registration: OwnerRegistration) -> Self {
        LogEvent::OwnerRegistered(registration)
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.exists() => {
            fs::create_dir_all(dir).map_err(|e| {
                StorageError::Io(format!("couldn't create directory {}: {e}", dir.display()))
            })
        }
        _ => Ok(()),
    }
}

/// Writing half of the event log.
#[derive(Debug)]
pub struct LogProducer {
    path: PathBuf,
    file: Option<File>,
    /// Length of the file after the last fully written line.
    committed_len: u64,
    line: Vec<u8>,
}

impl LogProducer {
    /// Opens `path` for appending, creating it and its directory if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        ensure_parent_dir(&path)?;
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let committed_len = file.metadata()?.len();

        Ok(Self {
            path,
            file: Some(file),
            committed_len,
            line: Vec::with_capacity(256),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one line and syncs it to disk before returning.
    ///
    /// On failure the event must be treated as not persisted. A partially
    /// written line is truncated away; if that fails too the producer
    /// releases its file and every later write returns
    /// [`StorageError::Closed`].
    pub fn write_event(&mut self, event: &LogEvent) -> Result<()> {
        let file = self.file.as_mut().ok_or(StorageError::Closed)?;

        self.line.clear();
        serde_json::to_writer(&mut self.line, event)
            .map_err(|e| StorageError::Io(format!("failed to encode log entry: {e}")))?;
        self.line.push(b'\n');

        let written = file
            .write_all(&self.line)
            .and_then(|_| file.flush())
            .and_then(|_| file.sync_data());

        if let Err(err) = written {
            if let Err(truncate_err) = file.set_len(self.committed_len) {
                warn!(
                    path = %self.path.display(),
                    error = %truncate_err,
                    "failed to truncate torn log line, refusing further writes"
                );
                self.file = None;
            }
            return Err(err.into());
        }

        self.committed_len += self.line.len() as u64;
        debug!(sequence = event.sequence(), "appended log event");
        Ok(())
    }

    /// Syncs and releases the file handle. Calling it again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
            file.sync_all()?;
        }
        Ok(())
    }
}

/// Reading half of the event log.
#[derive(Debug)]
pub struct LogConsumer {
    path: PathBuf,
    reader: Option<BufReader<File>>,
}

impl LogConsumer {
    /// Opens `path` read-only, creating an empty log if none exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        ensure_parent_dir(&path)?;
        if !path.exists() {
            OpenOptions::new().create(true).append(true).open(&path)?;
        }
        let file = File::open(&path)?;

        Ok(Self {
            path,
            reader: Some(BufReader::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decodes every event from the start of the file, in append order.
    ///
    /// The first undecodable line aborts the scan with
    /// [`StorageError::CorruptLog`]. Empty lines are skipped.
    pub fn read_all_events(&mut self) -> Result<Vec<LogEvent>> {
        let reader = self.reader.as_mut().ok_or(StorageError::Closed)?;
        reader.seek(SeekFrom::Start(0))?;

        let mut events = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event = serde_json::from_str::<LogEvent>(&line).map_err(|e| {
                StorageError::CorruptLog {
                    line: index + 1,
                    message: e.to_string(),
                }
            })?;
            events.push(event);
        }

        Ok(events)
    }

    pub fn close(&mut self) -> Result<()> {
        self.reader.take();
        Ok(())
    }
}
