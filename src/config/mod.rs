mod schema;

pub use schema::*;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "LAGPROBE_CONFIG";

/// Paths tried when no explicit config file is given
pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["config/lagprobe.toml", "lagprobe.toml"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the config named by `LAGPROBE_CONFIG`, else the first default path
/// that loads, else built-in defaults
///
/// An explicitly named file that fails to load is an error; default
/// locations are only tried.
pub fn load_or_default() -> Result<Config, ConfigError> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        let config = load_config(&path)?;
        info!(path = %path, "Loaded configuration");
        return Ok(config);
    }

    for path in DEFAULT_CONFIG_PATHS {
        if !Path::new(path).exists() {
            continue;
        }
        match load_config(path) {
            Ok(config) => {
                info!(path = path, "Loaded configuration");
                return Ok(config);
            }
            Err(e) => {
                warn!(path = path, error = %e, "Failed to load config");
            }
        }
    }

    info!("Using default configuration");
    Ok(Config::default())
}
