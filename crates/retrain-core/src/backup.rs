//! Point-in-time copies of the artifact directory.
//!
//! Layout of one backup:
//!
//! ```text
//! backups/model_backup_<run-id>/
//!     model/          full copy of the artifact directory
//!     metadata.json   BackupMetadata
//! ```

use crate::error::{Result, RetrainError};
use crate::io;
use crate::paths;
use crate::types::RunId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub backup_time: RunId,
    pub model_path: PathBuf,
    pub backup_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Backup {
    /// `model_backup_<run-id>` directory.
    pub dir: PathBuf,
    pub metadata: BackupMetadata,
}

impl Backup {
    pub fn model_dir(&self) -> PathBuf {
        self.dir.join(paths::BACKUP_MODEL_DIR)
    }
}

#[derive(Debug, Clone)]
pub struct BackupManager {
    root: PathBuf,
}

impl BackupManager {
    pub fn new(backups_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: backups_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copy the whole artifact directory into a fresh backup for `run_id`.
    ///
    /// Returns `NoArtifact` when `source` does not exist; callers treat that
    /// as a valid first run. Any other error means the copy is unusable.
    pub fn snapshot(&self, run_id: &RunId, source: &Path) -> Result<Backup> {
        if !source.is_dir() {
            warn!(source = %source.display(), "no existing artifact to back up");
            return Err(RetrainError::NoArtifact(source.to_path_buf()));
        }

        let dir = paths::backup_dir(&self.root, run_id);
        if dir.join(paths::BACKUP_MODEL_DIR).exists() {
            return Err(RetrainError::Backup(format!(
                "backup {} already exists",
                dir.display()
            )));
        }
        io::ensure_dir(&dir).map_err(|e| RetrainError::Backup(e.to_string()))?;

        let model_dir = dir.join(paths::BACKUP_MODEL_DIR);
        io::copy_dir_all(source, &model_dir).map_err(|e| {
            RetrainError::Backup(format!("copy to {} failed: {e}", model_dir.display()))
        })?;

        let metadata = BackupMetadata {
            backup_time: run_id.clone(),
            model_path: source.to_path_buf(),
            backup_path: model_dir.clone(),
        };
        let data = serde_json::to_vec_pretty(&metadata)?;
        io::atomic_write(&dir.join(paths::BACKUP_METADATA), &data)
            .map_err(|e| RetrainError::Backup(e.to_string()))?;

        info!(backup = %model_dir.display(), "artifact backed up");
        Ok(Backup { dir, metadata })
    }

    /// Replace `target` with the backup's copy. Safe to repeat.
    pub fn restore(&self, backup: &Backup, target: &Path) -> Result<()> {
        let model_dir = backup.model_dir();
        if !model_dir.is_dir() {
            return Err(RetrainError::BackupMissing(model_dir));
        }
        io::replace_dir(&model_dir, target).map_err(|e| {
            RetrainError::Restore(format!(
                "{} -> {}: {e}",
                model_dir.display(),
                target.display()
            ))
        })?;
        info!(from = %model_dir.display(), to = %target.display(), "artifact restored");
        Ok(())
    }

    /// Open the backup taken by `run_id`.
    pub fn open(&self, run_id: &RunId) -> Result<Backup> {
        let dir = paths::backup_dir(&self.root, run_id);
        let meta_path = dir.join(paths::BACKUP_METADATA);
        if !meta_path.exists() {
            return Err(RetrainError::BackupMissing(dir));
        }
        let metadata: BackupMetadata = serde_json::from_str(&std::fs::read_to_string(meta_path)?)?;
        Ok(Backup { dir, metadata })
    }

    /// All readable backups, newest first.
    pub fn list(&self) -> Result<Vec<Backup>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut backups = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(id) = name
                .to_str()
                .and_then(|n| n.strip_prefix(paths::BACKUP_PREFIX))
                .and_then(|n| n.parse::<RunId>().ok())
            else {
                continue;
            };
            match self.open(&id) {
                Ok(b) => backups.push(b),
                Err(e) => warn!(dir = %entry.path().display(), error = %e, "skipping unreadable backup"),
            }
        }
        backups.sort_by(|a, b| b.metadata.backup_time.cmp(&a.metadata.backup_time));
        Ok(backups)
    }
}
