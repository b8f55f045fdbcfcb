use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "autopilot")]
#[command(version, about = "Resumable job autopilot: plan, create, wait, master/export")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Also write JSON logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags for `autopilot run`. Unset flags fall back to autopilot.toml.
#[derive(clap::Args, Clone, Debug)]
pub struct RunArgs {
    /// High-level intent, e.g. a genre or mood
    pub intent: String,

    /// Number of jobs to run
    #[arg(short = 'n', long)]
    pub count: Option<usize>,

    /// Continue from the checkpoint if it matches this intent
    #[arg(long)]
    pub resume: bool,

    /// Planner strategy: auto, template, model
    #[arg(long)]
    pub planner: Option<String>,

    /// Model identifier for the model planner
    #[arg(long)]
    pub model: Option<String>,

    /// Plan each job from several scored candidates
    #[arg(long)]
    pub phase2: bool,

    /// Candidates per Phase-2 round
    #[arg(long)]
    pub candidates: Option<usize>,

    /// Seconds to wait between create and master/export
    #[arg(long)]
    pub wait_phase: Option<u64>,

    /// Seconds to wait between jobs
    #[arg(long)]
    pub wait_between: Option<u64>,

    /// Export mode: full, multitrack
    #[arg(long)]
    pub export: Option<String>,

    /// Retries per step after the first attempt
    #[arg(long)]
    pub retries: Option<u32>,

    /// Stop the run when a job fails instead of moving on
    #[arg(long)]
    pub stop_on_error: bool,

    /// Stop instead of pausing on a blocking condition
    #[arg(long)]
    pub no_pause: bool,

    /// Stop starting new jobs after this many hours
    #[arg(long)]
    pub max_hours: Option<f64>,

    /// Use an executor that succeeds without running anything
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run jobs through the pipeline
    Run(RunArgs),
    /// Run one Phase-2 planning round and print the decision
    Plan {
        intent: String,

        /// Job index to plan for (0-based)
        #[arg(long, default_value = "0")]
        index: usize,

        #[arg(long)]
        candidates: Option<usize>,

        /// Planner strategy: auto, template, model
        #[arg(long)]
        planner: Option<String>,

        #[arg(long)]
        model: Option<String>,
    },
    /// Show the checkpoint of an unfinished run
    Status,
    /// Signal a paused run to continue
    ResumeSignal,
    /// Delete the checkpoint and any stale resume flag
    Reset {
        #[arg(long)]
        force: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default autopilot.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = autopilot::telemetry::init(cli.verbose, cli.log_file.as_deref())?;

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Run(args) => cmd::cmd_run(&cli, project_dir, args).await?,
        Commands::Plan {
            intent,
            index,
            candidates,
            planner,
            model,
        } => {
            cmd::cmd_plan(
                project_dir,
                intent,
                *index,
                *candidates,
                planner.as_deref(),
                model.as_deref(),
            )
            .await?
        }
        Commands::Status => cmd::cmd_status(project_dir)?,
        Commands::ResumeSignal => cmd::cmd_resume_signal(project_dir)?,
        Commands::Reset { force } => cmd::cmd_reset(project_dir, *force)?,
        Commands::Config { command } => cmd::cmd_config(project_dir, command.clone())?,
    }

    Ok(())
}
