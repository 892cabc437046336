// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSONL state journal
//!
//! Records submissions and state transitions as one JSON line per event:
//! `{"seq":N,"event":{...}}`. Replayed at workspace open to restore the
//! resource-id watermark; the per-job state files stay authoritative for
//! restart decisions.

use crate::job::JobState;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from journal operations
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A journaled event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum JournalEvent {
    Submitted {
        locator: String,
        resource_id: u64,
        time_ms: u64,
    },
    StateChanged {
        locator: String,
        state: JobState,
    },
}

#[derive(Serialize)]
struct RecordRef<'a> {
    seq: u64,
    event: &'a JournalEvent,
}

#[derive(Deserialize)]
struct Record {
    seq: u64,
    event: JournalEvent,
}

/// Append-only JSONL journal.
pub struct Journal {
    file: File,
    path: PathBuf,
    seq: u64,
}

impl Journal {
    /// Open or create a journal, replaying existing entries. Returns the
    /// journal and the next resource id to hand out. A corrupt tail is
    /// tolerated with a warning.
    pub fn open(path: &Path) -> Result<(Journal, u64), JournalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut seq = 0;
        let mut next_resource_id = 0;
        if let Ok(existing) = File::open(path) {
            for line in BufReader::new(existing).lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Record>(&line) {
                    Ok(record) => {
                        seq = seq.max(record.seq);
                        if let JournalEvent::Submitted { resource_id, .. } = record.event {
                            next_resource_id = next_resource_id.max(resource_id + 1);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "corrupt journal entry, ignoring tail");
                        break;
                    }
                }
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok((
            Journal {
                file,
                path: path.to_owned(),
                seq,
            },
            next_resource_id,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event, flushed immediately.
    pub fn record(&mut self, event: &JournalEvent) -> Result<(), JournalError> {
        self.seq += 1;
        let line = serde_json::to_vec(&RecordRef {
            seq: self.seq,
            event,
        })?;
        self.file.write_all(&line)?;
        self.file.write_all(b"\n")?;
        self.file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
