use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use retrain_core::{
    backup::BackupManager, config::Config, lock::RunLock, types::RunId, RetrainError,
};
use std::path::Path;

#[derive(Subcommand)]
pub enum BackupSubcommand {
    /// List backups, newest first
    List,

    /// Snapshot the current artifact directory now
    Create,

    /// Replace the artifact directory with a backup
    Restore {
        /// Run id of the backup (YYYYMMDD_HHMMSS_mmm)
        run_id: String,
    },
}

pub fn run(root: &Path, subcmd: BackupSubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let manager = BackupManager::new(config.backups_path(root));
    match subcmd {
        BackupSubcommand::List => list(&manager, json),
        BackupSubcommand::Create => create(root, &config, &manager, json),
        BackupSubcommand::Restore { run_id } => restore(root, &config, &manager, &run_id, json),
    }
}

fn list(manager: &BackupManager, json: bool) -> anyhow::Result<()> {
    let backups = manager.list().context("failed to list backups")?;
    if json {
        let items: Vec<_> = backups.iter().map(|b| &b.metadata).collect();
        return print_json(&items);
    }
    if backups.is_empty() {
        println!("No backups in {}.", manager.root().display());
        return Ok(());
    }
    let rows: Vec<Vec<String>> = backups
        .iter()
        .map(|b| {
            vec![
                b.metadata.backup_time.to_string(),
                b.metadata.backup_path.display().to_string(),
                b.metadata.model_path.display().to_string(),
            ]
        })
        .collect();
    print_table(&["RUN ID", "BACKUP", "SOURCE"], &rows);
    Ok(())
}

fn create(root: &Path, config: &Config, manager: &BackupManager, json: bool) -> anyhow::Result<()> {
    let run_id = RunId::now();
    let _lock = RunLock::acquire(root, &run_id)?;
    let source = config.artifact_path(root);
    let backup = match manager.snapshot(&run_id, &source) {
        Err(RetrainError::NoArtifact(p)) => {
            anyhow::bail!("nothing to back up: no artifact at {}", p.display())
        }
        other => other.context("backup failed")?,
    };
    if json {
        return print_json(&backup.metadata);
    }
    println!("Backed up {} to {}", source.display(), backup.model_dir().display());
    Ok(())
}

fn restore(
    root: &Path,
    config: &Config,
    manager: &BackupManager,
    run_id: &str,
    json: bool,
) -> anyhow::Result<()> {
    let id: RunId = run_id.parse()?;
    let _lock = RunLock::acquire(root, &id)?;
    let backup = manager
        .open(&id)
        .with_context(|| format!("no backup for run {id}"))?;
    let target = config.artifact_path(root);
    manager
        .restore(&backup, &target)
        .with_context(|| format!("failed to restore {}", target.display()))?;
    tracing::warn!(backup = %backup.model_dir().display(), "artifact restored by hand");

    if json {
        return print_json(&serde_json::json!({
            "restored": backup.metadata,
            "artifact": target,
        }));
    }
    println!("Restored {} from {}", target.display(), backup.model_dir().display());
    Ok(())
}
