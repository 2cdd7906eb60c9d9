//! Pipeline commands: one Command Layer call each, printed as text or JSON.

use anyhow::{Context, Result};
use stagehand::commands::{CommandOutcome, PipelineCommands};
use stagehand::config::{CliOverrides, Config};
use stagehand::orchestrator::{FileStateStore, Orchestrator};
use stagehand::processors::ConfiguredFactory;
use stagehand_common::Stage;
use std::path::Path;

use super::super::Cli;

pub type FileCommands = PipelineCommands<FileStateStore, ConfiguredFactory>;

pub fn load_config(cli: &Cli, project_dir: &Path) -> Result<Config> {
    Config::load(
        project_dir,
        CliOverrides {
            state_file: cli.state_file.clone(),
            verbose: cli.verbose,
        },
    )
}

/// Build the command layer over the configured state file and processors.
pub fn open_pipeline(cli: &Cli, project_dir: &Path) -> Result<(Config, FileCommands)> {
    let config = load_config(cli, project_dir)?;
    let factory = ConfiguredFactory::from_config(&config);
    tracing::debug!(
        state_file = %config.state_file().display(),
        processors = %factory.describe(),
        "pipeline opened"
    );
    let store = FileStateStore::new(config.state_file().to_path_buf());
    let commands = PipelineCommands::new(Orchestrator::new(store, factory));
    Ok((config, commands))
}

pub fn emit(cli: &Cli, outcome: &CommandOutcome) -> Result<()> {
    if cli.json {
        let json = serde_json::to_string_pretty(outcome).context("Failed to encode result")?;
        println!("{}", json);
    } else {
        stagehand::ui::print_outcome(outcome, cli.verbose);
    }
    Ok(())
}

pub fn cmd_start(
    cli: &Cli,
    project_dir: &Path,
    feature: &str,
    description: Option<&str>,
) -> Result<()> {
    let (_, commands) = open_pipeline(cli, project_dir)?;
    emit(cli, &commands.start(feature, description))
}

pub async fn cmd_continue(cli: &Cli, project_dir: &Path) -> Result<()> {
    let (_, commands) = open_pipeline(cli, project_dir)?;
    emit(cli, &commands.continue_pipeline().await)
}

pub fn cmd_status(cli: &Cli, project_dir: &Path) -> Result<()> {
    let (config, commands) = open_pipeline(cli, project_dir)?;
    if !cli.json && !commands.orchestrator().store().exists() {
        println!(
            "No pipeline state at {} - showing defaults. Run 'stagehand start <feature>' to begin.",
            config.state_file().display()
        );
    }
    emit(cli, &commands.status())
}

pub fn cmd_approve(
    cli: &Cli,
    project_dir: &Path,
    stage: &str,
    input: Option<&str>,
    alternative: Option<&str>,
    recommendation: Option<&str>,
) -> Result<()> {
    let (_, commands) = open_pipeline(cli, project_dir)?;
    emit(
        cli,
        &commands.approve(stage, input, alternative, recommendation),
    )
}

pub fn cmd_input(cli: &Cli, project_dir: &Path, text: &str) -> Result<()> {
    let (_, commands) = open_pipeline(cli, project_dir)?;
    emit(cli, &commands.input(text))
}

pub async fn cmd_stage(cli: &Cli, project_dir: &Path, stage: Stage) -> Result<()> {
    let (_, commands) = open_pipeline(cli, project_dir)?;
    emit(cli, &commands.run_agent(stage).await)
}

pub fn cmd_halt(cli: &Cli, project_dir: &Path, reason: &str) -> Result<()> {
    let (_, commands) = open_pipeline(cli, project_dir)?;
    emit(cli, &commands.halt(reason))
}

pub fn cmd_resume(cli: &Cli, project_dir: &Path) -> Result<()> {
    let (_, commands) = open_pipeline(cli, project_dir)?;
    emit(cli, &commands.resume())
}

pub fn cmd_reject(cli: &Cli, project_dir: &Path, stage: &str, reason: &str) -> Result<()> {
    let (_, commands) = open_pipeline(cli, project_dir)?;
    emit(cli, &commands.reject(stage, reason))
}

pub fn cmd_select(cli: &Cli, project_dir: &Path, choice: &str) -> Result<()> {
    let (_, commands) = open_pipeline(cli, project_dir)?;
    emit(cli, &commands.select_alternative(choice))
}

pub fn cmd_recommend(cli: &Cli, project_dir: &Path, choice: &str) -> Result<()> {
    let (_, commands) = open_pipeline(cli, project_dir)?;
    emit(cli, &commands.approve_recommendation(choice))
}
