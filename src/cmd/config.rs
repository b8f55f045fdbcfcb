//! Configuration view and validation commands: `autopilot config`.

use anyhow::{Context, Result};
use std::path::PathBuf;

use super::super::ConfigCommands;

use autopilot::pilot_config::{CONFIG_FILE, PilotConfig, PilotToml};

pub fn cmd_config(project_dir: PathBuf, command: Option<ConfigCommands>) -> Result<()> {
    let pilot = PilotConfig::new(project_dir)?;
    let config_path = pilot.config_file();

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Autopilot Configuration");
            println!("=======================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No {} found at {}", CONFIG_FILE, config_path.display());
                println!("Using defaults. Run 'autopilot config init' to create one.");
            }
            println!();

            println!("Effective values (with env overrides):");
            println!();
            let rendered = toml::to_string_pretty(&pilot.toml)
                .context("Failed to render configuration")?;
            for line in rendered.lines() {
                println!("  {}", line);
            }
            println!();

            println!("Files:");
            println!("  checkpoint    = {}", pilot.checkpoint_path().display());
            println!("  events        = {}", pilot.events_path().display());
            println!("  artifacts     = {}", pilot.artifacts_path().display());
            println!("  resume_signal = {}", pilot.resume_signal_path().display());
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let warnings = pilot.validate();
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
                println!("{} already exists at {}", CONFIG_FILE, config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if !pilot.pilot_dir.exists() {
                std::fs::create_dir_all(&pilot.pilot_dir)?;
            }

            PilotToml::default().save(&config_path)?;

            println!("Created {} at {}", CONFIG_FILE, config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [run] count, waits, export_mode, retries");
            println!("  - [planner] strategy, model, phase2");
            println!("  - [executor] create_cmd and export_cmd");
            println!();
        }
    }

    Ok(())
}
