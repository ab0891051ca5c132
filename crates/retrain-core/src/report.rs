use crate::dataset::DatasetStats;
use crate::error::{Result, RetrainError};
use crate::io;
use crate::paths;
use crate::types::{Outcome, RunId, Stage};
use chrono::{DateTime, FixedOffset, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// What happened when the run tried to undo its changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RollbackStatus {
    Restored,
    /// No backup exists (first run); the artifact directory was left as is.
    BackupMissing,
    /// The restore itself failed. The artifact directory is in an unknown state.
    Failed { error: String },
}

impl fmt::Display for RollbackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollbackStatus::Restored => f.write_str("restored"),
            RollbackStatus::BackupMissing => f.write_str("backup missing"),
            RollbackStatus::Failed { error } => write!(f, "FAILED: {error}"),
        }
    }
}

/// The one record a run leaves behind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub run_id: RunId,
    pub data_source: String,
    pub outcome: Outcome,
    pub final_stage: Stage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback: Option<RollbackStatus>,
    pub backup_path: Option<PathBuf>,
    pub log_path: PathBuf,
    pub artifact_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<DatasetStats>,
    /// True when the quality gate failed and the run continued anyway.
    #[serde(default)]
    pub quality_overridden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_at: Option<DateTime<Local>>,
    pub started_at: DateTime<FixedOffset>,
    pub finished_at: DateTime<FixedOffset>,
}

impl Report {
    /// Persist as `report_<run-id>.json` under `logs_dir`. Refuses to
    /// overwrite: a run writes exactly one report.
    pub fn write(&self, logs_dir: &Path) -> Result<PathBuf> {
        let path = paths::report_path(logs_dir, &self.run_id);
        let data = serde_json::to_vec_pretty(self)?;
        match io::write_new(&path, &data) {
            Ok(()) => Ok(path),
            Err(RetrainError::Io(e)) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(RetrainError::ReportExists(path))
            }
            Err(e) => Err(e),
        }
    }

    pub fn load(logs_dir: &Path, run_id: &RunId) -> Result<Self> {
        let path = paths::report_path(logs_dir, run_id);
        if !path.exists() {
            return Err(RetrainError::ReportNotFound(run_id.to_string()));
        }
        Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
    }

    /// Every report under `logs_dir`, newest first. Unparseable files are skipped.
    pub fn list(logs_dir: &Path) -> Result<Vec<Self>> {
        if !logs_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut reports = Vec::new();
        for entry in std::fs::read_dir(logs_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(id) = name
                .to_str()
                .and_then(|n| n.strip_prefix("report_"))
                .and_then(|n| n.strip_suffix(".json"))
                .and_then(|n| n.parse::<RunId>().ok())
            else {
                continue;
            };
            match Self::load(logs_dir, &id) {
                Ok(r) => reports.push(r),
                Err(e) => tracing::warn!(file = %entry.path().display(), error = %e, "skipping report"),
            }
        }
        reports.sort_by(|a, b| b.run_id.cmp(&a.run_id));
        Ok(reports)
    }
}
