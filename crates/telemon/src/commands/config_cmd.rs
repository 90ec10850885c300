//! Config subcommand handlers.

use owo_colors::OwoColorize;

use telemon_config::{Config, save_config_to};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::commands::{config_path, load_config};
use crate::error::CliError;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            println!("{}", config_path(global).display());
            Ok(())
        }

        ConfigCommand::Show => {
            let config = load_config(global)?;
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }

        ConfigCommand::Init { force } => {
            let path = config_path(global);
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            save_config_to(&Config::starter(), &path)?;
            eprintln!("{} wrote {}", "✓".green(), path.display());
            Ok(())
        }
    }
}
