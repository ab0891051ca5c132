use crate::cmd::report::print_report;
use crate::cmd::validate::Loader;
use crate::output::print_json;
use anyhow::Context;
use clap::Args;
use retrain_core::{
    command::ProcessRunner,
    config::Config,
    decision::{AutoDecider, DecisionPoint, PromptDecider},
    paths,
    pipeline::{Pipeline, RunOptions},
    report::{Report, RollbackStatus},
    types::{Outcome, Stage},
};
use std::path::Path;

#[derive(Args)]
pub struct RunArgs {
    /// Production data source connection string
    #[arg(long, env = "MONGO_URI")]
    pub data_source: Option<String>,

    /// Lookback window for the export, in days
    #[arg(long)]
    pub days: Option<u32>,

    /// Answer every decision point without prompting (deployment is approved)
    #[arg(long)]
    pub auto: bool,

    /// In --auto mode, train even when the data quality check fails
    #[arg(long, requires = "auto")]
    pub continue_on_quality_failure: bool,
}

// ---------------------------------------------------------------------------
// RunExit: typed non-zero exit codes
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum RunExit {
    Failed { stage: Stage },
    /// The artifact directory could not be restored after a failure.
    RollbackFailed { stage: Stage },
}

impl RunExit {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunExit::Failed { .. } => 2,
            RunExit::RollbackFailed { .. } => 3,
        }
    }

    fn from_report(report: &Report) -> Option<Self> {
        if report.outcome != Outcome::Failed {
            return None;
        }
        let stage = report.failed_stage.unwrap_or(Stage::Setup);
        Some(match report.rollback {
            Some(RollbackStatus::Failed { .. }) => RunExit::RollbackFailed { stage },
            _ => RunExit::Failed { stage },
        })
    }
}

impl std::fmt::Display for RunExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunExit::Failed { stage } => write!(f, "run failed at stage '{stage}'"),
            RunExit::RollbackFailed { stage } => write!(
                f,
                "run failed at stage '{stage}' and the rollback failed; \
                 the artifact directory needs manual recovery (see 'retrain backup list')"
            ),
        }
    }
}

impl std::error::Error for RunExit {}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

pub fn run(root: &Path, args: RunArgs, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    for w in config.validate() {
        tracing::warn!("config: {}", w.message);
    }

    let opts = RunOptions {
        data_source: args.data_source.unwrap_or_else(|| config.data_source.clone()),
        lookback_days: args.days.unwrap_or(config.export.lookback_days),
    };

    let runner = ProcessRunner;
    let loader = Loader::for_config(root, &config, &runner);
    let auto = AutoDecider {
        continue_on_quality_failure: args.continue_on_quality_failure
            || config.continue_on_quality_failure,
    };
    let prompt;
    let decider: &dyn DecisionPoint = if args.auto {
        &auto
    } else {
        prompt = PromptDecider::stdio();
        &prompt
    };

    let report = Pipeline::new(root, &config, &runner, decider, &loader)
        .run(&opts)
        .context("run aborted before a report could be written")?;

    if json {
        print_json(&report)?;
    } else {
        print_report(&report);
        let path = paths::report_path(&config.logs_path(root), &report.run_id);
        println!("report: {}", path.display());
    }

    match RunExit::from_report(&report) {
        Some(exit) => Err(exit.into()),
        None => Ok(()),
    }
}
