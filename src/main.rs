use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use stagehand_common::Stage;
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "stagehand")]
#[command(version, about = "Drive a feature through gated delivery stages")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Approve every stage without prompting (`run` only)
    #[arg(long, global = true)]
    pub yes: bool,

    /// Print command results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Pipeline state file. Overrides stagehand.toml and STAGEHAND_STATE_FILE.
    #[arg(long, global = true)]
    pub state_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new stagehand project
    Init,
    /// Start a new pipeline, replacing any existing one
    Start {
        feature: String,
        description: Option<String>,
    },
    /// Execute the current stage
    Continue,
    /// Show pipeline progress and what to do next
    Status,
    /// Approve a stage and advance to the next one
    Approve {
        stage: String,
        /// Free text recorded with the approval
        #[arg(long)]
        input: Option<String>,
        /// Alternative to select (id or 1-based index)
        #[arg(long)]
        alternative: Option<String>,
        /// Recommendation to accept (id or 1-based index)
        #[arg(long)]
        recommendation: Option<String>,
    },
    /// Record input (e.g. answers to questions) for the current stage
    Input {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Run the requirements analysis stage directly
    Spec,
    /// Run the technical design stage directly
    Tech,
    /// Run the implementation stage directly
    Impl,
    /// Run the testing stage directly
    Test,
    /// Run the security review stage directly
    Sec,
    /// Run the performance review stage directly
    Perf,
    /// Run the documentation stage directly
    Docs,
    /// Run the release readiness stage directly
    Ready,
    /// Halt the pipeline (emergency stop)
    Halt {
        #[arg(num_args = 0..)]
        reason: Vec<String>,
    },
    /// Clear the emergency stop
    Resume,
    /// Reject a stage so it is redone
    Reject {
        stage: String,
        #[arg(long, default_value = "")]
        reason: String,
    },
    /// Select an alternative for the current stage (id or 1-based index)
    Select { choice: String },
    /// Accept a recommendation for the current stage (id or 1-based index)
    Recommend { choice: String },
    /// Run the remaining stages with an interactive approval gate
    Run,
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
    /// Initialize a default stagehand.toml file
    Init,
}

fn setup_logging(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let default = if verbose {
        "stagehand=debug"
    } else {
        "stagehand=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Init => cmd::cmd_init(&project_dir)?,
        Commands::Start {
            feature,
            description,
        } => cmd::cmd_start(&cli, &project_dir, feature, description.as_deref())?,
        Commands::Continue => cmd::cmd_continue(&cli, &project_dir).await?,
        Commands::Status => cmd::cmd_status(&cli, &project_dir)?,
        Commands::Approve {
            stage,
            input,
            alternative,
            recommendation,
        } => cmd::cmd_approve(
            &cli,
            &project_dir,
            stage,
            input.as_deref(),
            alternative.as_deref(),
            recommendation.as_deref(),
        )?,
        Commands::Input { text } => cmd::cmd_input(&cli, &project_dir, &text.join(" "))?,
        Commands::Spec => cmd::cmd_stage(&cli, &project_dir, Stage::Spec).await?,
        Commands::Tech => cmd::cmd_stage(&cli, &project_dir, Stage::Tech).await?,
        Commands::Impl => cmd::cmd_stage(&cli, &project_dir, Stage::Impl).await?,
        Commands::Test => cmd::cmd_stage(&cli, &project_dir, Stage::Test).await?,
        Commands::Sec => cmd::cmd_stage(&cli, &project_dir, Stage::Sec).await?,
        Commands::Perf => cmd::cmd_stage(&cli, &project_dir, Stage::Perf).await?,
        Commands::Docs => cmd::cmd_stage(&cli, &project_dir, Stage::Docs).await?,
        Commands::Ready => cmd::cmd_stage(&cli, &project_dir, Stage::Ready).await?,
        Commands::Halt { reason } => cmd::cmd_halt(&cli, &project_dir, &reason.join(" "))?,
        Commands::Resume => cmd::cmd_resume(&cli, &project_dir)?,
        Commands::Reject { stage, reason } => cmd::cmd_reject(&cli, &project_dir, stage, reason)?,
        Commands::Select { choice } => cmd::cmd_select(&cli, &project_dir, choice)?,
        Commands::Recommend { choice } => cmd::cmd_recommend(&cli, &project_dir, choice)?,
        Commands::Run => cmd::cmd_run(&cli, &project_dir).await?,
        Commands::Config { command } => cmd::cmd_config(&cli, &project_dir, command.clone())?,
    }

    Ok(())
}
