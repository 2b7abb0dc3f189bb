//! Cross-invocation session coordination.
//!
//! A recording session is represented by a single JSON record on disk.
//! Presence of the record means a recording is active; absence means idle.
//! Independent process invocations (one starting a recording, a later one
//! stopping it) discover each other exclusively through this record, so it
//! must be published atomically and must never outlive its owning process
//! unnoticed: a record whose `owner_pid` is dead is stale and gets reaped by
//! whoever finds it.

use crate::defaults;
use crate::error::{DictoggleError, Result};
use crate::sys;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Capture stream parameters stored alongside the session record.
///
/// Descriptive metadata only; the capturing process's configuration is
/// authoritative.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CaptureParams {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for CaptureParams {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            channels: defaults::CHANNELS,
        }
    }
}

/// The on-disk session record: single source of truth for "is a recording
/// active, and by which process, for which artifact".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub owner_pid: i32,
    pub created_at: u64,
    pub audio_artifact_path: PathBuf,
    pub capture_parameters: CaptureParams,
}

impl SessionRecord {
    /// Create a record owned by the calling process, stamped with the
    /// current time.
    pub fn new(audio_artifact_path: PathBuf, capture_parameters: CaptureParams) -> Self {
        Self {
            owner_pid: std::process::id() as i32,
            created_at: epoch_secs(),
            audio_artifact_path,
            capture_parameters,
        }
    }

    /// Override the owner pid (tests, or recording on behalf of a child).
    pub fn with_owner_pid(mut self, pid: i32) -> Self {
        self.owner_pid = pid;
        self
    }

    /// Override the creation timestamp.
    pub fn with_created_at(mut self, created_at: u64) -> Self {
        self.created_at = created_at;
        self
    }

    /// Age of the record in seconds. A `created_at` in the future yields 0.
    pub fn age_secs(&self) -> u64 {
        epoch_secs().saturating_sub(self.created_at)
    }

    /// A record is stale when its owner is no longer alive, or when it is
    /// implausibly old (pid reuse after a crash) or timestamped in the
    /// future (clock damage). Stale records are treated as if no session
    /// existed.
    pub fn is_stale(&self) -> bool {
        if !sys::process_alive(self.owner_pid) {
            return true;
        }
        self.created_at > epoch_secs() || self.age_secs() > defaults::STALE_RECORD_AGE_SECS
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Handle to an acquired session. Owned by the capturing process.
#[derive(Debug)]
pub struct SessionHandle {
    store: SessionStore,
    record: SessionRecord,
}

impl SessionHandle {
    /// The record published for this session.
    pub fn record(&self) -> &SessionRecord {
        &self.record
    }

    /// Path the capture will be flushed to.
    pub fn artifact_path(&self) -> &Path {
        &self.record.audio_artifact_path
    }

    /// Remove the session record. Idempotent: an already-removed record is
    /// success.
    pub fn release(self) -> Result<()> {
        self.store.release()
    }
}

/// Store managing the single well-known session record file.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Create a store for the record at `path`. The parent directory is
    /// created on first acquire.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Path of the canonical record file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Non-destructive read of the current record.
    ///
    /// A missing file is idle (`None`). An unparsable file is equivalent to
    /// idle: the corrupt record is removed so the next invocation starts
    /// clean.
    pub fn inspect(&self) -> Result<Option<SessionRecord>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<SessionRecord>(&contents) {
            Ok(record) => Ok(Some(record)),
            Err(_) => {
                // Corrupt state is idle, not a crash; reap it.
                self.release()?;
                Ok(None)
            }
        }
    }

    /// Atomically publish `record`, acquiring the session.
    ///
    /// Succeeds iff no record exists or the existing one is stale (the stale
    /// record is reaped first). The record is serialized to a temporary file
    /// in the same directory and linked into place, so a concurrent reader
    /// never observes a partial record and exactly one of two racing
    /// acquires wins; the loser gets [`DictoggleError::SessionActive`].
    pub fn acquire(&self, record: SessionRecord) -> Result<SessionHandle> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        if let Some(existing) = self.inspect()? {
            if existing.is_stale() {
                self.release()?;
            } else {
                return Err(DictoggleError::SessionActive {
                    pid: existing.owner_pid,
                });
            }
        }

        let payload = serde_json::to_vec_pretty(&record).map_err(|e| {
            DictoggleError::SessionCorrupt {
                path: self.path.display().to_string(),
                message: e.to_string(),
            }
        })?;

        let tmp = self.temp_path(record.owner_pid);
        fs::write(&tmp, &payload)?;

        // link(2) is the linearization point: atomic, and fails with EEXIST
        // for the loser of a concurrent acquire.
        let linked = fs::hard_link(&tmp, &self.path);
        let _ = fs::remove_file(&tmp);

        match linked {
            Ok(()) => Ok(SessionHandle {
                store: self.clone(),
                record,
            }),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let winner = self.inspect()?.map(|r| r.owner_pid).unwrap_or(0);
                Err(DictoggleError::SessionActive { pid: winner })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove the record. Idempotent: "already gone" is success.
    pub fn release(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn temp_path(&self, pid: i32) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| defaults::SESSION_FILE_NAME.to_string());
        self.path.with_file_name(format!(".{}.{}.tmp", name, pid))
    }
}
