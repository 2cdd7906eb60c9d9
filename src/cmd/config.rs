//! Configuration view and validation commands: `stagehand config`.

use anyhow::Result;

use super::super::{Cli, ConfigCommands};
use super::pipeline::load_config;

pub fn cmd_config(cli: &Cli, project_dir: &std::path::Path, command: Option<ConfigCommands>) -> Result<()> {
    use stagehand::config::{CONFIG_FILE, StagehandToml};
    use stagehand::init::get_stagehand_dir;
    use stagehand::processors::ConfiguredFactory;

    let stagehand_dir = get_stagehand_dir(project_dir);
    let config_path = stagehand_dir.join(CONFIG_FILE);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Stagehand Configuration");
            println!("=======================");
            println!();

            let toml = if config_path.exists() {
                println!("Config file: {}", config_path.display());
                StagehandToml::load(&config_path)?
            } else {
                println!("No stagehand.toml found at {}", config_path.display());
                println!("Using default configuration.");
                StagehandToml::default()
            };
            println!();

            println!("[pipeline]");
            println!("  state_file = \"{}\"", toml.pipeline.state_file.display());
            println!("  docs_root = \"{}\"", toml.pipeline.docs_root.display());
            println!();

            if toml.processor.command.is_some() || !toml.processor.args.is_empty() {
                println!("[processor]");
                if let Some(command) = &toml.processor.command {
                    println!("  command = \"{}\"", command);
                }
                if !toml.processor.args.is_empty() {
                    println!("  args = {:?}", toml.processor.args);
                }
                println!();
            }

            for (name, stage) in &toml.stages {
                if let Some(require) = stage.require_approval {
                    println!("[stages.{}]", name);
                    println!("  require_approval = {}", require);
                    println!();
                }
            }

            // Effective values (including env/CLI overrides)
            println!("Effective values (with env/CLI overrides):");
            let config = load_config(cli, project_dir)?;
            println!("  state_file = \"{}\"", config.state_file().display());
            println!("  docs_root = \"{}\"", config.docs_root().display());
            println!("  processors = {}", ConfiguredFactory::from_config(&config).describe());
            println!();

            if !config_path.exists() {
                println!("Run 'stagehand config init' to create a stagehand.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No stagehand.toml found. Using defaults (valid).");
                return Ok(());
            }

            let toml = StagehandToml::load(&config_path)?;
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("stagehand.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if !stagehand_dir.exists() {
                std::fs::create_dir_all(&stagehand_dir)?;
            }

            StagehandToml::default().save(&config_path)?;

            println!("Created stagehand.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [pipeline] state_file, docs_root");
            println!("  - [processor] command, args for an external stage processor");
            println!("  - [stages.<stage>] require_approval");
            println!();
        }
    }

    Ok(())
}
