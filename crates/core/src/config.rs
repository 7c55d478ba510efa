//! Configuration file discovery and loading
//!
//! The ingestion jobs resolve every setting in this order:
//! 1. CLI arguments
//! 2. Environment variables (handled by clap)
//! 3. A TOML config file found by [`find_config_file`]
//! 4. Built-in defaults

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::APP_NAME;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Where the effective config file came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// Path named by the caller or by the config env var
    Explicit(PathBuf),
    /// Found in the working directory
    CurrentDir(PathBuf),
    /// Found under $XDG_CONFIG_HOME/weatherbit-ingest/
    XdgConfig(PathBuf),
    /// Found under /etc/weatherbit-ingest/
    System(PathBuf),
    /// Nothing found
    Defaults,
}

impl ConfigSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigSource::Explicit(p)
            | ConfigSource::CurrentDir(p)
            | ConfigSource::XdgConfig(p)
            | ConfigSource::System(p) => Some(p),
            ConfigSource::Defaults => None,
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.path() {
            Some(path) => write!(f, "{}", path.display()),
            None => write!(f, "(defaults)"),
        }
    }
}

/// Locate `filename`, checking `env_var` first and then the working
/// directory, the XDG config home and `/etc`.
///
/// A path given through `env_var` that does not exist is ignored so that the
/// remaining locations are still searched.
pub fn find_config_file(env_var: &str, filename: &str) -> ConfigSource {
    if let Ok(path) = env::var(env_var) {
        let path = PathBuf::from(path);
        if path.is_file() {
            return ConfigSource::Explicit(path);
        }
        debug!("{} points at missing file {}", env_var, path.display());
    }

    let candidates = [
        ConfigSource::CurrentDir(PathBuf::from(filename)),
        ConfigSource::XdgConfig(xdg_config_home().join(APP_NAME).join(filename)),
        ConfigSource::System(PathBuf::from("/etc").join(APP_NAME).join(filename)),
    ];

    candidates
        .into_iter()
        .find(|candidate| candidate.path().is_some_and(Path::is_file))
        .unwrap_or(ConfigSource::Defaults)
}

fn xdg_config_home() -> PathBuf {
    match (env::var("XDG_CONFIG_HOME"), env::var("HOME")) {
        (Ok(xdg), _) => PathBuf::from(xdg),
        (_, Ok(home)) => PathBuf::from(home).join(".config"),
        _ => PathBuf::from(".config"),
    }
}

/// Parse the TOML file behind `source`, or return `T::default()` when no
/// file was found.
pub fn load_config<T: DeserializeOwned + Default>(source: &ConfigSource) -> Result<T, ConfigError> {
    let Some(path) = source.path() else {
        return Ok(T::default());
    };
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Sample {
        prefix: Option<String>,
        request_delay_ms: Option<u64>,
    }

    #[test]
    fn test_config_source_display() {
        let source = ConfigSource::CurrentDir(PathBuf::from("ingest.toml"));
        assert_eq!(format!("{}", source), "ingest.toml");

        let source = ConfigSource::Defaults;
        assert_eq!(format!("{}", source), "(defaults)");
    }

    #[test]
    fn test_load_config_defaults_without_file() {
        let loaded: Sample = load_config(&ConfigSource::Defaults).unwrap();
        assert_eq!(loaded, Sample::default());
    }

    #[test]
    fn test_load_config_from_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ingest.toml");
        fs::write(&path, "prefix = \"weather-data\"\nrequest_delay_ms = 250\n").unwrap();

        let loaded: Sample = load_config(&ConfigSource::Explicit(path)).unwrap();
        assert_eq!(loaded.prefix.as_deref(), Some("weather-data"));
        assert_eq!(loaded.request_delay_ms, Some(250));
    }

    #[test]
    fn test_load_config_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ingest.toml");
        fs::write(&path, "request_delay_ms = \"soon\"").unwrap();

        let loaded: Result<Sample, _> = load_config(&ConfigSource::Explicit(path.clone()));
        match loaded {
            Err(ConfigError::Parse { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected a parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_config_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let loaded: Result<Sample, _> = load_config(&ConfigSource::Explicit(path.clone()));
        match loaded {
            Err(err @ ConfigError::Read { .. }) => {
                assert!(err.to_string().contains("absent.toml"));
            }
            other => panic!("expected a read error, got {:?}", other),
        }
    }
}
