//! The retraining state machine.
//!
//! ```text
//! Setup → Backup → Export → QualityGate → Train → Validate → Deploy → Completed
//!                    │           │          │         │         └──→ Declined
//!                    └───────────┴──→ Failed│         │
//!                                           └─────────┴──→ RollingBack → RolledBack
//! ```
//!
//! Every path ends with exactly one [`Report`] write. Rollback is attempted
//! when a stage that can write into the artifact directory fails, and for any
//! unexpected error or panic once the backup stage has completed.

use crate::artifact::ArtifactStore;
use crate::backup::{Backup, BackupManager};
use crate::command::CommandRunner;
use crate::config::Config;
use crate::dataset::DatasetStats;
use crate::decision::{DecisionPoint, Question};
use crate::deploy::{self, Promotion};
use crate::error::{Result, RetrainError};
use crate::io;
use crate::lock::RunLock;
use crate::paths;
use crate::quality::{self, QualityVerdict};
use crate::report::{Report, RollbackStatus};
use crate::types::{Outcome, RunId, Stage};
use crate::validator::{self, ModelLoader, Validation};
use chrono::{DateTime, FixedOffset, Local};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Per-run inputs that override the config.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub data_source: String,
    pub lookback_days: u32,
}

impl RunOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            data_source: config.data_source.clone(),
            lookback_days: config.export.lookback_days,
        }
    }
}

/// A run in flight. Only the pipeline mutates it.
struct Run {
    id: RunId,
    data_source: String,
    stage: Stage,
    backup: Option<Backup>,
    log_path: PathBuf,
    dataset: Option<DatasetStats>,
    quality_overridden: bool,
    deployed_at: Option<DateTime<Local>>,
    started_at: DateTime<FixedOffset>,
}

enum Finish {
    Completed,
    Declined,
}

pub struct Pipeline<'a> {
    root: &'a Path,
    config: &'a Config,
    runner: &'a dyn CommandRunner,
    decider: &'a dyn DecisionPoint,
    loader: &'a dyn ModelLoader,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        root: &'a Path,
        config: &'a Config,
        runner: &'a dyn CommandRunner,
        decider: &'a dyn DecisionPoint,
        loader: &'a dyn ModelLoader,
    ) -> Self {
        Self {
            root,
            config,
            runner,
            decider,
            loader,
        }
    }

    /// Execute one run to a terminal state and write its report.
    ///
    /// Stage failures are recorded in the returned report, not returned as
    /// `Err`. `Err` means no report could be written at all (the logs
    /// directory is unusable, or the report file already exists).
    pub fn run(&self, opts: &RunOptions) -> Result<Report> {
        let id = RunId::now();
        let logs_dir = self.config.logs_path(self.root);
        io::ensure_dir(&logs_dir).map_err(|e| {
            RetrainError::Setup(format!("cannot create {}: {e}", logs_dir.display()))
        })?;

        let mut run = Run {
            log_path: paths::training_log(&logs_dir, &id),
            id,
            data_source: opts.data_source.clone(),
            stage: Stage::Setup,
            backup: None,
            dataset: None,
            quality_overridden: false,
            deployed_at: None,
            started_at: Local::now().fixed_offset(),
        };
        info!(run_id = %run.id, data_source = %run.data_source, "run started");

        let mut lock = None;
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.drive(&mut run, &mut lock, opts)
        }))
        .unwrap_or_else(|payload| Err(RetrainError::Panicked(panic_message(&*payload))));

        let report = self.conclude(&mut run, result);
        let path = report.write(&logs_dir)?;
        info!(
            run_id = %report.run_id,
            outcome = %report.outcome,
            report = %path.display(),
            "run finished"
        );
        drop(lock);
        Ok(report)
    }

    fn drive(
        &self,
        run: &mut Run,
        lock: &mut Option<RunLock>,
        opts: &RunOptions,
    ) -> Result<Finish> {
        *lock = Some(RunLock::acquire(self.root, &run.id)?);
        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&run.log_path)
            .map_err(|e| {
                RetrainError::Setup(format!("cannot open {}: {e}", run.log_path.display()))
            })?;
        let backups = BackupManager::new(self.config.backups_path(self.root));
        io::ensure_dir(backups.root()).map_err(|e| {
            RetrainError::Setup(format!("cannot create {}: {e}", backups.root().display()))
        })?;
        writeln!(log, "run {} against {}", run.id, run.data_source)?;

        // Backup
        enter(run, &mut log, Stage::Backup)?;
        let artifact_dir = self.config.artifact_path(self.root);
        match backups.snapshot(&run.id, &artifact_dir) {
            Ok(backup) => {
                writeln!(log, "backup: {}", backup.model_dir().display())?;
                run.backup = Some(backup);
            }
            Err(RetrainError::NoArtifact(_)) => {
                writeln!(log, "backup: no existing artifact, nothing to protect")?;
            }
            Err(e) => return Err(e),
        }

        // Export
        enter(run, &mut log, Stage::Export)?;
        let export = self
            .config
            .export_command(self.root, &opts.data_source, opts.lookback_days);
        writeln!(log, "$ {}", export.display_line())?;
        let status = self.runner.run(&export, &mut log)?;
        if !status.success() {
            return Err(RetrainError::Export { status });
        }

        // QualityGate
        enter(run, &mut log, Stage::QualityGate)?;
        let exported = self.config.export_output_path(self.root);
        let (stats, verdict) = quality::inspect(&exported);
        run.dataset = stats;
        if let Some(s) = &stats {
            writeln!(
                log,
                "dataset: {} rows, {} phishing, {} normal",
                s.total, s.positive, s.negative
            )?;
        }
        if let QualityVerdict::Fail(issue) = verdict {
            warn!(run_id = %run.id, issue = %issue, "data quality check failed");
            writeln!(log, "quality: {issue}")?;
            let question = Question::ContinueDespiteQuality {
                issue: issue.clone(),
            };
            if !self.decider.decide(&question)? {
                return Err(RetrainError::QualityRejected(issue));
            }
            writeln!(log, "quality: continuing on operator/config decision")?;
            run.quality_overridden = true;
        }
        let dataset = self.config.train_dataset_path(self.root);
        if dataset != exported {
            std::fs::copy(&exported, &dataset)?;
            writeln!(log, "dataset promoted to {}", dataset.display())?;
        }

        // Train
        enter(run, &mut log, Stage::Train)?;
        let train = self.config.train_command(self.root);
        writeln!(log, "$ {}", train.display_line())?;
        let status = self.runner.run(&train, &mut log)?;
        if !status.success() {
            return Err(RetrainError::Train {
                status,
                log: run.log_path.clone(),
            });
        }

        // Validate
        enter(run, &mut log, Stage::Validate)?;
        let store = ArtifactStore::new(&artifact_dir, self.config.artifact.clone());
        if let Validation::Invalid(reason) = validator::validate(&store, self.loader) {
            return Err(RetrainError::Validation(reason));
        }
        writeln!(log, "validation: ok")?;

        // Deploy
        enter(run, &mut log, Stage::Deploy)?;
        match deploy::confirm(&store, self.decider)? {
            Promotion::Approved { deployed_at } => {
                writeln!(log, "deployed at {}", deployed_at.to_rfc3339())?;
                run.deployed_at = Some(deployed_at);
                run.stage = Stage::Completed;
                Ok(Finish::Completed)
            }
            Promotion::Declined => {
                writeln!(log, "deployment declined; artifact left unstamped")?;
                run.stage = Stage::Declined;
                Ok(Finish::Declined)
            }
        }
    }

    fn conclude(&self, run: &mut Run, result: Result<Finish>) -> Report {
        let mut report = Report {
            run_id: run.id.clone(),
            data_source: run.data_source.clone(),
            outcome: Outcome::Succeeded,
            final_stage: run.stage,
            failed_stage: None,
            error: None,
            rollback: None,
            backup_path: run.backup.as_ref().map(Backup::model_dir),
            log_path: run.log_path.clone(),
            artifact_path: self.config.artifact_path(self.root),
            dataset: run.dataset,
            quality_overridden: run.quality_overridden,
            deployed_at: run.deployed_at,
            started_at: run.started_at,
            finished_at: run.started_at,
        };

        match result {
            Ok(Finish::Completed) => {}
            Ok(Finish::Declined) => report.outcome = Outcome::Declined,
            Err(e) => {
                let failed = run.stage;
                error!(run_id = %run.id, stage = %failed, error = %e, "stage failed");
                report.outcome = Outcome::Failed;
                report.failed_stage = Some(failed);
                report.error = Some(format!("{failed}: {e}"));
                if failed.mutates_artifact() || (failed > Stage::Backup && !e.is_clean_stop()) {
                    let status = self.roll_back(run);
                    report.final_stage = match status {
                        RollbackStatus::Restored => Stage::RolledBack,
                        _ => Stage::Failed,
                    };
                    report.rollback = Some(status);
                } else {
                    report.final_stage = Stage::Failed;
                }
                if let Err(e) = self.append_log(run, &format!("failed at {failed}: {e}")) {
                    warn!(error = %e, "could not append to run log");
                }
            }
        }

        report.finished_at = Local::now().fixed_offset();
        report
    }

    fn roll_back(&self, run: &mut Run) -> RollbackStatus {
        run.stage = Stage::RollingBack;
        let target = self.config.artifact_path(self.root);
        let Some(backup) = &run.backup else {
            error!(
                run_id = %run.id,
                artifact = %target.display(),
                "no backup was taken; artifact directory left as the failed run wrote it"
            );
            return RollbackStatus::BackupMissing;
        };
        let backups = BackupManager::new(self.config.backups_path(self.root));
        match backups.restore(backup, &target) {
            Ok(()) => {
                info!(run_id = %run.id, backup = %backup.model_dir().display(), "rolled back");
                run.stage = Stage::RolledBack;
                RollbackStatus::Restored
            }
            Err(e) => {
                error!(
                    run_id = %run.id,
                    backup = %backup.model_dir().display(),
                    error = %e,
                    "ROLLBACK FAILED: artifact directory is in an unknown state"
                );
                RollbackStatus::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    fn append_log(&self, run: &Run, line: &str) -> Result<()> {
        if !run.log_path.exists() {
            return Ok(());
        }
        io::append_text(&run.log_path, &format!("{line}\n"))
    }
}

fn enter(run: &mut Run, log: &mut File, stage: Stage) -> Result<()> {
    run.stage = stage;
    info!(run_id = %run.id, stage = %stage, "stage");
    writeln!(log, "\n===== {stage} =====")?;
    Ok(())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::tests::write_artifact;
    use crate::backup::tests::tree;
    use crate::command::{CommandSpec, ExitStatus, ProcessRunner};
    use crate::decision::AutoDecider;
    use crate::validator::ReadableLoader;
    use std::cell::RefCell;
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Clone, Copy)]
    enum Export {
        Rows { positive: u64, negative: u64 },
        Fail,
        /// Scribbles into the artifact directory, then panics.
        Panic,
    }

    #[derive(Clone, Copy)]
    enum Train {
        Ok,
        /// Writes half an artifact, then exits 1.
        FailMidway,
        /// Exits 0 without writing a vocabulary.
        Incomplete,
        Panic,
        /// Runs a real process whose background child keeps writing into
        /// the artifact directory past the timeout.
        Hang,
    }

    struct FakeRunner {
        root: PathBuf,
        export: Export,
        train: Train,
        calls: RefCell<Vec<String>>,
    }

    impl FakeRunner {
        fn new(root: &Path, export: Export, train: Train) -> Self {
            Self {
                root: root.to_path_buf(),
                export,
                train,
                calls: RefCell::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, spec: &CommandSpec, log: &mut dyn Write) -> Result<ExitStatus> {
            self.calls.borrow_mut().push(spec.name.clone());
            let config = Config::default();
            match spec.name.as_str() {
                "export" => match self.export {
                    Export::Rows { positive, negative } => {
                        let out = config.export_output_path(&self.root);
                        std::fs::create_dir_all(out.parent().unwrap()).unwrap();
                        let mut csv = String::from("message,is_phishing\n");
                        for i in 0..positive {
                            csv.push_str(&format!("\"계좌 확인 {i}\",1\n"));
                        }
                        for i in 0..negative {
                            csv.push_str(&format!("see you at {i},0\n"));
                        }
                        std::fs::write(out, csv).unwrap();
                        writeln!(log, "exported {} rows", positive + negative)?;
                        Ok(ExitStatus::Success)
                    }
                    Export::Fail => {
                        writeln!(log, "pymongo.errors.ServerSelectionTimeoutError")?;
                        Ok(ExitStatus::Failed { code: Some(1) })
                    }
                    Export::Panic => {
                        let dir = config.artifact_path(&self.root);
                        std::fs::write(dir.join("saved_model.pb"), "clobbered").unwrap();
                        panic!("export driver crashed")
                    }
                },
                "train" => {
                    let dir = config.artifact_path(&self.root);
                    match self.train {
                        Train::Ok => {
                            write_artifact(&dir, "2.0.0");
                            writeln!(log, "Epoch 10/10")?;
                            Ok(ExitStatus::Success)
                        }
                        Train::FailMidway => {
                            std::fs::create_dir_all(&dir).unwrap();
                            std::fs::write(dir.join("saved_model.pb"), "half").unwrap();
                            std::fs::write(dir.join("checkpoint.tmp"), "x").unwrap();
                            writeln!(log, "ResourceExhaustedError: OOM")?;
                            Ok(ExitStatus::Failed { code: Some(1) })
                        }
                        Train::Incomplete => {
                            write_artifact(&dir, "2.0.0");
                            std::fs::remove_file(dir.join("vocabulary.json")).unwrap();
                            Ok(ExitStatus::Success)
                        }
                        Train::Panic => {
                            std::fs::create_dir_all(&dir).unwrap();
                            std::fs::write(dir.join("saved_model.pb"), "torn").unwrap();
                            panic!("collaborator blew up")
                        }
                        Train::Hang => {
                            let script = format!(
                                "echo half > '{0}/saved_model.pb'; \
                                 (sleep 1; echo late > '{0}/late.bin') & wait",
                                dir.display()
                            );
                            let real = CommandSpec {
                                program: "sh".to_string(),
                                args: vec!["-c".to_string(), script],
                                timeout: Some(Duration::from_millis(200)),
                                ..spec.clone()
                            };
                            ProcessRunner.run(&real, log)
                        }
                    }
                }
                other => panic!("unexpected command {other}"),
            }
        }
    }

    struct Answers {
        quality: bool,
        deploy: bool,
        asked: RefCell<Vec<Question>>,
    }

    impl Answers {
        fn new(quality: bool, deploy: bool) -> Self {
            Self {
                quality,
                deploy,
                asked: RefCell::new(Vec::new()),
            }
        }
    }

    impl DecisionPoint for Answers {
        fn decide(&self, question: &Question) -> Result<bool> {
            self.asked.borrow_mut().push(question.clone());
            Ok(match question {
                Question::ContinueDespiteQuality { .. } => self.quality,
                Question::ConfirmDeployment { .. } => self.deploy,
            })
        }
    }

    fn execute(root: &Path, runner: &FakeRunner, decider: &dyn DecisionPoint) -> Report {
        let config = Config::default();
        let pipeline = Pipeline::new(root, &config, runner, decider, &ReadableLoader);
        let report = pipeline.run(&RunOptions::from_config(&config)).unwrap();
        assert!(report.final_stage.is_terminal(), "{:?}", report.final_stage);
        report
    }

    fn artifact_dir(root: &Path) -> PathBuf {
        Config::default().artifact_path(root)
    }

    fn report_count(root: &Path) -> usize {
        Report::list(&Config::default().logs_path(root)).unwrap().len()
    }

    fn auto() -> AutoDecider {
        AutoDecider {
            continue_on_quality_failure: false,
        }
    }

    #[test]
    fn first_run_end_to_end_succeeds() {
        let root = TempDir::new().unwrap();
        let runner = FakeRunner::new(
            root.path(),
            Export::Rows {
                positive: 500,
                negative: 300,
            },
            Train::Ok,
        );
        let report = execute(root.path(), &runner, &auto());

        assert_eq!(report.outcome, Outcome::Succeeded);
        assert_eq!(report.final_stage, Stage::Completed);
        assert_eq!(report.backup_path, None);
        assert_eq!(report.dataset, Some(DatasetStats::new(800, 500, 300)));
        assert!(report.deployed_at.is_some());
        assert_eq!(runner.calls(), vec!["export", "train"]);

        let store = ArtifactStore::new(artifact_dir(root.path()), Default::default());
        assert!(store.deployed_at().unwrap().is_some());
        assert!(Config::default().train_dataset_path(root.path()).exists());
        assert_eq!(report_count(root.path()), 1);

        let log = std::fs::read_to_string(&report.log_path).unwrap();
        assert!(log.contains("===== export ====="));
        assert!(log.contains("exported 800 rows"));
        assert!(log.contains("Epoch 10/10"));
    }

    #[test]
    fn train_failure_restores_prior_artifact() {
        let root = TempDir::new().unwrap();
        write_artifact(&artifact_dir(root.path()), "1.0.0");
        let before = tree(&artifact_dir(root.path()));

        let runner = FakeRunner::new(
            root.path(),
            Export::Rows {
                positive: 200,
                negative: 200,
            },
            Train::FailMidway,
        );
        let report = execute(root.path(), &runner, &auto());

        assert_eq!(report.outcome, Outcome::Failed);
        assert_eq!(report.failed_stage, Some(Stage::Train));
        assert_eq!(report.final_stage, Stage::RolledBack);
        assert_eq!(report.rollback, Some(RollbackStatus::Restored));
        let backup = report.backup_path.clone().unwrap();
        assert!(backup.ends_with(format!("model_backup_{}/model", report.run_id)));
        assert_eq!(tree(&backup), before);
        assert_eq!(tree(&artifact_dir(root.path())), before);
        assert_eq!(report_count(root.path()), 1);

        let log = std::fs::read_to_string(&report.log_path).unwrap();
        assert!(log.contains("ResourceExhaustedError"));
    }

    #[test]
    fn validation_failure_restores_prior_artifact() {
        let root = TempDir::new().unwrap();
        write_artifact(&artifact_dir(root.path()), "1.0.0");
        let before = tree(&artifact_dir(root.path()));

        let runner = FakeRunner::new(
            root.path(),
            Export::Rows {
                positive: 200,
                negative: 200,
            },
            Train::Incomplete,
        );
        let report = execute(root.path(), &runner, &auto());

        assert_eq!(report.outcome, Outcome::Failed);
        assert_eq!(report.failed_stage, Some(Stage::Validate));
        assert!(report.error.as_deref().unwrap().contains("missing-member"));
        assert_eq!(tree(&artifact_dir(root.path())), before);
    }

    #[test]
    fn export_failure_never_touches_artifact() {
        let root = TempDir::new().unwrap();
        write_artifact(&artifact_dir(root.path()), "1.0.0");
        let before = tree(&artifact_dir(root.path()));

        let runner = FakeRunner::new(root.path(), Export::Fail, Train::Ok);
        let report = execute(root.path(), &runner, &auto());

        assert_eq!(report.outcome, Outcome::Failed);
        assert_eq!(report.failed_stage, Some(Stage::Export));
        assert_eq!(report.final_stage, Stage::Failed);
        assert_eq!(report.rollback, None);
        assert_eq!(runner.calls(), vec!["export"]);
        assert_eq!(tree(&artifact_dir(root.path())), before);
        assert_eq!(report_count(root.path()), 1);
    }

    #[test]
    fn rejected_quality_stops_before_training() {
        let root = TempDir::new().unwrap();
        let runner = FakeRunner::new(
            root.path(),
            Export::Rows {
                positive: 15,
                negative: 185,
            },
            Train::Ok,
        );
        let answers = Answers::new(false, true);
        let report = execute(root.path(), &runner, &answers);

        assert_eq!(report.outcome, Outcome::Failed);
        assert_eq!(report.failed_stage, Some(Stage::QualityGate));
        assert_eq!(report.rollback, None);
        assert!(!report.quality_overridden);
        assert_eq!(runner.calls(), vec!["export"]);
        assert!(!artifact_dir(root.path()).exists());
        assert!(matches!(
            answers.asked.borrow()[0],
            Question::ContinueDespiteQuality { .. }
        ));
    }

    #[test]
    fn quality_override_continues_to_deploy() {
        let root = TempDir::new().unwrap();
        let runner = FakeRunner::new(
            root.path(),
            Export::Rows {
                positive: 10,
                negative: 40,
            },
            Train::Ok,
        );
        let answers = Answers::new(true, true);
        let report = execute(root.path(), &runner, &answers);

        assert_eq!(report.outcome, Outcome::Succeeded);
        assert!(report.quality_overridden);
        assert_eq!(answers.asked.borrow().len(), 2);
    }

    #[test]
    fn declined_deploy_leaves_artifact_unstamped() {
        let root = TempDir::new().unwrap();
        let runner = FakeRunner::new(
            root.path(),
            Export::Rows {
                positive: 100,
                negative: 100,
            },
            Train::Ok,
        );
        let report = execute(root.path(), &runner, &Answers::new(true, false));

        assert_eq!(report.outcome, Outcome::Declined);
        assert_eq!(report.final_stage, Stage::Declined);
        assert_eq!(report.deployed_at, None);
        assert!(report.error.is_none());
        let store = ArtifactStore::new(artifact_dir(root.path()), Default::default());
        assert!(store.exists());
        assert_eq!(store.deployed_at().unwrap(), None);
    }

    #[test]
    fn panic_in_collaborator_is_caught_and_rolled_back() {
        let root = TempDir::new().unwrap();
        write_artifact(&artifact_dir(root.path()), "1.0.0");
        let before = tree(&artifact_dir(root.path()));

        let runner = FakeRunner::new(
            root.path(),
            Export::Rows {
                positive: 100,
                negative: 100,
            },
            Train::Panic,
        );
        let report = execute(root.path(), &runner, &auto());

        assert_eq!(report.outcome, Outcome::Failed);
        assert_eq!(report.failed_stage, Some(Stage::Train));
        assert!(report.error.as_deref().unwrap().contains("collaborator blew up"));
        assert_eq!(tree(&artifact_dir(root.path())), before);
        assert!(RunLock::holder(root.path()).unwrap().is_none());
    }

    #[test]
    fn train_timeout_restores_prior_artifact() {
        let root = TempDir::new().unwrap();
        write_artifact(&artifact_dir(root.path()), "1.0.0");
        let before = tree(&artifact_dir(root.path()));

        let runner = FakeRunner::new(
            root.path(),
            Export::Rows {
                positive: 100,
                negative: 100,
            },
            Train::Hang,
        );
        let report = execute(root.path(), &runner, &auto());

        assert_eq!(report.outcome, Outcome::Failed);
        assert_eq!(report.failed_stage, Some(Stage::Train));
        assert!(report.error.as_deref().unwrap().contains("timed out"));
        assert_eq!(report.rollback, Some(RollbackStatus::Restored));
        assert_eq!(tree(&artifact_dir(root.path())), before);

        // Nothing the killed command spawned may write after the restore.
        std::thread::sleep(Duration::from_millis(1500));
        assert_eq!(tree(&artifact_dir(root.path())), before);
    }

    #[test]
    fn panic_after_backup_is_rolled_back() {
        let root = TempDir::new().unwrap();
        write_artifact(&artifact_dir(root.path()), "1.0.0");
        let before = tree(&artifact_dir(root.path()));

        let runner = FakeRunner::new(root.path(), Export::Panic, Train::Ok);
        let report = execute(root.path(), &runner, &auto());

        assert_eq!(report.outcome, Outcome::Failed);
        assert_eq!(report.failed_stage, Some(Stage::Export));
        assert!(report.error.as_deref().unwrap().contains("export driver crashed"));
        assert_eq!(report.rollback, Some(RollbackStatus::Restored));
        assert_eq!(report.final_stage, Stage::RolledBack);
        assert_eq!(tree(&artifact_dir(root.path())), before);
        assert_eq!(runner.calls(), vec!["export"]);
    }

    #[cfg(unix)]
    #[test]
    fn backup_failure_stops_before_export() {
        let root = TempDir::new().unwrap();
        let dir = artifact_dir(root.path());
        write_artifact(&dir, "1.0.0");
        let before = tree(&dir);
        let dangling = dir.join("dangling");
        std::os::unix::fs::symlink(root.path().join("gone"), &dangling).unwrap();

        let runner = FakeRunner::new(
            root.path(),
            Export::Rows {
                positive: 100,
                negative: 100,
            },
            Train::Ok,
        );
        let report = execute(root.path(), &runner, &auto());

        assert_eq!(report.outcome, Outcome::Failed);
        assert_eq!(report.failed_stage, Some(Stage::Backup));
        assert_eq!(report.final_stage, Stage::Failed);
        assert_eq!(report.rollback, None);
        assert!(report.error.as_deref().unwrap().contains("backup failed"));
        assert!(runner.calls().is_empty());
        assert_eq!(report_count(root.path()), 1);

        assert!(dangling.symlink_metadata().is_ok());
        std::fs::remove_file(&dangling).unwrap();
        assert_eq!(tree(&dir), before);
    }

    #[test]
    fn first_run_failure_reports_missing_backup() {
        let root = TempDir::new().unwrap();
        let runner = FakeRunner::new(
            root.path(),
            Export::Rows {
                positive: 100,
                negative: 100,
            },
            Train::FailMidway,
        );
        let report = execute(root.path(), &runner, &auto());

        assert_eq!(report.outcome, Outcome::Failed);
        assert_eq!(report.rollback, Some(RollbackStatus::BackupMissing));
        assert_eq!(report.final_stage, Stage::Failed);
        assert_eq!(report.backup_path, None);
    }

    #[test]
    fn concurrent_run_is_refused_with_a_report() {
        let root = TempDir::new().unwrap();
        write_artifact(&artifact_dir(root.path()), "1.0.0");
        let before = tree(&artifact_dir(root.path()));
        let held = RunLock::acquire(root.path(), &"20261017_000000_000".parse().unwrap()).unwrap();

        let runner = FakeRunner::new(
            root.path(),
            Export::Rows {
                positive: 100,
                negative: 100,
            },
            Train::Ok,
        );
        let report = execute(root.path(), &runner, &auto());

        assert_eq!(report.outcome, Outcome::Failed);
        assert_eq!(report.failed_stage, Some(Stage::Setup));
        assert!(report.error.as_deref().unwrap().contains("in progress"));
        assert!(runner.calls().is_empty());
        assert_eq!(tree(&artifact_dir(root.path())), before);
        drop(held);
    }

    #[test]
    fn lock_is_released_after_run() {
        let root = TempDir::new().unwrap();
        let runner = FakeRunner::new(root.path(), Export::Fail, Train::Ok);
        execute(root.path(), &runner, &auto());
        assert!(RunLock::holder(root.path()).unwrap().is_none());
    }
}
