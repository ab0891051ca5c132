//! Mutual exclusion between runs sharing one artifact directory.
//!
//! The lock is a file created with `create_new`, so exactly one process can
//! hold it. It is removed when the guard drops. A crashed run leaves it
//! behind; `RunLock::force_release` clears it.

use crate::error::{Result, RetrainError};
use crate::paths;
use crate::types::RunId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockHolder {
    pub run_id: RunId,
    pub pid: u32,
    pub token: Uuid,
    pub acquired_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    holder: LockHolder,
}

impl RunLock {
    pub fn acquire(root: &Path, run_id: &RunId) -> Result<Self> {
        let path = paths::lock_path(root);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let holder = LockHolder {
            run_id: run_id.clone(),
            pid: std::process::id(),
            token: Uuid::new_v4(),
            acquired_at: Utc::now(),
        };

        let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(match Self::holder(root)? {
                    Some(h) => RetrainError::RunInProgress {
                        run_id: h.run_id.to_string(),
                        pid: h.pid,
                    },
                    None => RetrainError::RunInProgress {
                        run_id: "unknown".to_string(),
                        pid: 0,
                    },
                });
            }
            Err(e) => return Err(e.into()),
        };
        publish(&path, file, &holder)?;

        tracing::debug!(lock = %path.display(), run_id = %run_id, "run lock acquired");
        Ok(Self { path, holder })
    }

    /// Who holds the lock under `root`, if anyone.
    ///
    /// A lock file that cannot be parsed still counts as held.
    pub fn holder(root: &Path) -> Result<Option<LockHolder>> {
        let path = paths::lock_path(root);
        match std::fs::read_to_string(&path) {
            Ok(data) => Ok(serde_json::from_str(&data).ok()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a lock left behind by a crashed run. Returns true if one existed.
    pub fn force_release(root: &Path) -> Result<bool> {
        let path = paths::lock_path(root);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::warn!(lock = %path.display(), "run lock force-released");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Write `holder` into the freshly created lock `file` at `path`. On failure
/// the file is removed so a half-written lock never blocks later runs.
fn publish(path: &Path, mut file: File, holder: &LockHolder) -> Result<()> {
    let written = serde_json::to_vec_pretty(holder)
        .map_err(RetrainError::from)
        .and_then(|data| Ok(file.write_all(&data)?))
        .and_then(|()| Ok(file.sync_all()?));
    if written.is_err() {
        drop(file);
        if let Err(e) = std::fs::remove_file(path) {
            tracing::error!(lock = %path.display(), error = %e, "failed to remove half-written run lock");
        }
    }
    written
}

impl Drop for RunLock {
    fn drop(&mut self) {
        // Only remove the file if it is still ours.
        let ours = std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|d| serde_json::from_str::<LockHolder>(&d).ok())
            .is_some_and(|h| h.token == self.holder.token);
        if ours {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::error!(lock = %self.path.display(), error = %e, "failed to release run lock");
            }
        }
    }
}
