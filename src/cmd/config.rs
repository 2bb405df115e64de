//! Configuration view and init commands: `review-gate config`.

use anyhow::Result;

use super::super::ConfigCommands;

pub fn cmd_config(project_dir: &std::path::Path, command: Option<ConfigCommands>) -> Result<()> {
    use review_gate::config::{CONFIG_FILE, GateConfig, GateToml};
    use review_gate::init::get_gate_dir;

    let gate_dir = get_gate_dir(project_dir);
    let config_path = gate_dir.join(CONFIG_FILE);

    match command {
        None | Some(ConfigCommands::Show) => {
            let gate_toml = if config_path.exists() {
                println!("Config file: {}", config_path.display());
                GateToml::load(&config_path)?
            } else {
                println!("No gate.toml found at {}", config_path.display());
                println!("Using default configuration.");
                GateToml::default()
            };
            println!();
            print!("{}", toml::to_string_pretty(&gate_toml)?);
            println!();

            println!("Effective values (with env overrides):");
            let config = GateConfig::new(project_dir.to_path_buf())?;
            println!("  reviewer = \"{}\"", config.toml.reviewer());
            println!("  channels = {:?}", config.toml.channels());

            let warnings = config.validate();
            if !warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                anyhow::bail!("Config already exists at {}", config_path.display());
            }
            std::fs::create_dir_all(&gate_dir)?;
            GateToml::default().save(&config_path)?;
            println!("Wrote default configuration to {}", config_path.display());
        }
    }

    Ok(())
}
