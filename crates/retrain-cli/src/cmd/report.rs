use crate::output::{print_fields, print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use retrain_core::{config::Config, report::Report, types::RunId};
use std::path::Path;

#[derive(Subcommand)]
pub enum ReportSubcommand {
    /// List run reports, newest first
    List,

    /// Show one run report
    Show {
        /// Run id (YYYYMMDD_HHMMSS_mmm)
        run_id: String,
    },
}

pub fn run(root: &Path, subcmd: ReportSubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let logs = config.logs_path(root);
    match subcmd {
        ReportSubcommand::List => list(&logs, json),
        ReportSubcommand::Show { run_id } => {
            let id: RunId = run_id.parse()?;
            let report = Report::load(&logs, &id)?;
            if json {
                print_json(&report)
            } else {
                print_report(&report);
                Ok(())
            }
        }
    }
}

fn list(logs: &Path, json: bool) -> anyhow::Result<()> {
    let reports = Report::list(logs).context("failed to read reports")?;
    if json {
        return print_json(&reports);
    }
    if reports.is_empty() {
        println!("No runs recorded in {}.", logs.display());
        return Ok(());
    }
    let rows: Vec<Vec<String>> = reports
        .iter()
        .map(|r| {
            vec![
                r.run_id.to_string(),
                r.outcome.to_string(),
                r.final_stage.to_string(),
                r.failed_stage.map(|s| s.to_string()).unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["RUN ID", "OUTCOME", "FINAL STAGE", "FAILED AT"], &rows);
    Ok(())
}

/// Human summary of a report. Shared with `retrain run`.
pub fn print_report(report: &Report) {
    let mut fields = vec![
        ("run", report.run_id.to_string()),
        ("outcome", report.outcome.to_string()),
        ("final stage", report.final_stage.to_string()),
    ];
    if let Some(stage) = report.failed_stage {
        fields.push(("failed at", stage.to_string()));
    }
    if let Some(err) = &report.error {
        fields.push(("error", err.clone()));
    }
    if let Some(rollback) = &report.rollback {
        fields.push(("rollback", rollback.to_string()));
    }
    if let Some(d) = &report.dataset {
        fields.push((
            "dataset",
            format!("{} rows ({} phishing, {} normal)", d.total, d.positive, d.negative),
        ));
    }
    if report.quality_overridden {
        fields.push(("quality", "failed, continued by decision".to_string()));
    }
    fields.push((
        "backup",
        report
            .backup_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "none".to_string()),
    ));
    fields.push(("log", report.log_path.display().to_string()));
    fields.push(("artifact", report.artifact_path.display().to_string()));
    if let Some(at) = report.deployed_at {
        fields.push(("deployed at", at.to_rfc3339()));
    }
    print_fields(&fields);
}
