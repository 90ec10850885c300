//! Subcommand handlers.

pub mod config_cmd;
pub mod ports;
pub mod run;

use telemon_config::Config;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Load the config named by `--config`, or the platform default.
///
/// An explicit path must exist; the default path may be absent.
pub fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    match &global.config {
        Some(path) => {
            if !path.is_file() {
                return Err(CliError::NoConfig {
                    path: path.display().to_string(),
                });
            }
            Ok(telemon_config::load_config_from(path)?)
        }
        None => Ok(telemon_config::load_config()?),
    }
}

/// Where `config init` writes and `config path` points.
pub fn config_path(global: &GlobalOpts) -> std::path::PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(telemon_config::config_path)
}
