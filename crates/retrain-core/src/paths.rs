use crate::types::RunId;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const RETRAIN_DIR: &str = ".retrain";
pub const CONFIG_FILE: &str = ".retrain/config.yaml";
pub const LOCK_FILE: &str = ".retrain/run.lock";

pub const BACKUP_PREFIX: &str = "model_backup_";
pub const BACKUP_MODEL_DIR: &str = "model";
pub const BACKUP_METADATA: &str = "metadata.json";

pub const DEPLOYED_MARKER: &str = "deployed_at.txt";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn retrain_dir(root: &Path) -> PathBuf {
    root.join(RETRAIN_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn lock_path(root: &Path) -> PathBuf {
    root.join(LOCK_FILE)
}

/// Resolve a configured path: absolute paths are kept, relative ones hang off `root`.
pub fn resolve(root: &Path, configured: &Path) -> PathBuf {
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        root.join(configured)
    }
}

pub fn backup_dir(backups: &Path, run_id: &RunId) -> PathBuf {
    backups.join(format!("{BACKUP_PREFIX}{run_id}"))
}

pub fn training_log(logs: &Path, run_id: &RunId) -> PathBuf {
    logs.join(format!("training_{run_id}.log"))
}

pub fn report_path(logs: &Path, run_id: &RunId) -> PathBuf {
    logs.join(format!("report_{run_id}.json"))
}
