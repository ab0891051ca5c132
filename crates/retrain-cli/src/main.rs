mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    artifact::ArtifactSubcommand, backup::BackupSubcommand, config::ConfigSubcommand,
    report::ReportSubcommand, run::RunArgs, run::RunExit,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "retrain",
    about = "Continuous retraining pipeline: export, gate, train, validate and deploy with rollback",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .retrain/)
    #[arg(long, global = true, env = "RETRAIN_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .retrain/config.yaml and the backup and log directories
    Init,

    /// Execute one retraining run
    Run(RunArgs),

    /// Check a dataset against the quality gate
    Quality {
        /// Dataset CSV (default: the configured export output)
        dataset: Option<PathBuf>,
    },

    /// Validate the current artifact directory
    Validate,

    /// Inspect the deployed artifact
    Artifact {
        #[command(subcommand)]
        subcommand: ArtifactSubcommand,
    },

    /// List, take and restore artifact backups
    Backup {
        #[command(subcommand)]
        subcommand: BackupSubcommand,
    },

    /// Read run reports
    Report {
        #[command(subcommand)]
        subcommand: ReportSubcommand,
    },

    /// Show or validate the project configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Remove a run lock left behind by a crashed run
    Unlock,
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run(_) | Commands::Backup { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Run(args) => cmd::run::run(&root, args, cli.json),
        Commands::Quality { dataset } => cmd::quality::run(&root, dataset.as_deref(), cli.json),
        Commands::Validate => cmd::validate::run(&root, cli.json),
        Commands::Artifact { subcommand } => cmd::artifact::run(&root, subcommand, cli.json),
        Commands::Backup { subcommand } => cmd::backup::run(&root, subcommand, cli.json),
        Commands::Report { subcommand } => cmd::report::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
        Commands::Unlock => cmd::unlock::run(&root, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        let code = e.downcast_ref::<RunExit>().map_or(1, RunExit::exit_code);
        std::process::exit(code);
    }
}
