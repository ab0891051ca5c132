use crate::command::ExitStatus;
use crate::quality::QualityIssue;
use crate::validator::InvalidReason;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetrainError {
    #[error("not initialized: run 'retrain init'")]
    NotInitialized,

    #[error("setup failed: {0}")]
    Setup(String),

    #[error("another run is in progress (run {run_id}, pid {pid}); use 'retrain unlock' if it is stale")]
    RunInProgress { run_id: String, pid: u32 },

    #[error("no artifact at {}", .0.display())]
    NoArtifact(PathBuf),

    #[error("backup failed: {0}")]
    Backup(String),

    #[error("no backup to restore from: {}", .0.display())]
    BackupMissing(PathBuf),

    #[error("restore failed, artifact directory may be incomplete: {0}")]
    Restore(String),

    #[error("export command {status}")]
    Export { status: ExitStatus },

    #[error("data quality rejected: {0}")]
    QualityRejected(QualityIssue),

    #[error("train command {status}; see {}", log.display())]
    Train { status: ExitStatus, log: PathBuf },

    #[error("validation failed: {0}")]
    Validation(InvalidReason),

    #[error("failed to spawn '{program}': {reason}")]
    CommandSpawn { program: String, reason: String },

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("invalid run id '{0}': expected YYYYMMDD_HHMMSS_mmm")]
    InvalidRunId(String),

    #[error("report already written: {}", .0.display())]
    ReportExists(PathBuf),

    #[error("report not found: {0}")]
    ReportNotFound(String),

    #[error("stage panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl RetrainError {
    /// Expected stops before training: the collaborator reported failure or
    /// the operator rejected the data. Nothing has written into the artifact
    /// directory yet, so there is nothing to roll back.
    pub fn is_clean_stop(&self) -> bool {
        matches!(
            self,
            RetrainError::Export { .. } | RetrainError::QualityRejected(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RetrainError>;
