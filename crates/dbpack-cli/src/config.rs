//! `dbpack.toml` loading and environment overrides.
//!
//! Precedence: command-line flags, then environment, then file, then defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use dbpack_introspect::IntrospectOptions;

pub const DEFAULT_CONFIG_FILE: &str = "dbpack.toml";
pub const ENV_DATABASE_URL: &str = "DBPACK_DATABASE_URL";
pub const ENV_RENDER_TIMEOUT: &str = "DBPACK_RENDER_TIMEOUT_SECS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
    #[error("no database connection: pass --conn, set DBPACK_DATABASE_URL or add [database] url")]
    MissingConnection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IntrospectConfig {
    pub include_views: bool,
    pub include_system_tables: bool,
    pub ignore_tables: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub program: String,
    pub format: String,
    pub timeout_secs: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            program: "dot".to_string(),
            format: "png".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub archive: Option<PathBuf>,
    pub run_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("out"),
            archive: None,
            run_dir: PathBuf::from("runs"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub introspect: IntrospectConfig,
    pub renderer: RendererConfig,
    pub output: OutputConfig,
}

impl Settings {
    /// Read `path`, or `dbpack.toml` in the working directory when `path` is
    /// `None`. Only an explicitly named file has to exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        match std::fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content, &path),
            Err(err) if !required && err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read { path, source }),
        }
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `DBPACK_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_DATABASE_URL).filter(|value| !value.trim().is_empty()) {
            self.database.url = Some(url);
        }
        if let Some(raw) = lookup(ENV_RENDER_TIMEOUT) {
            self.renderer.timeout_secs = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_RENDER_TIMEOUT.to_string(),
                value: raw.clone(),
            })?;
        }
        Ok(())
    }

    pub fn connection(&self) -> Result<&str, ConfigError> {
        self.database
            .url
            .as_deref()
            .ok_or(ConfigError::MissingConnection)
    }

    pub fn introspect_options(&self) -> IntrospectOptions {
        IntrospectOptions {
            include_system_tables: self.introspect.include_system_tables,
            include_views: self.introspect.include_views,
            ignore_tables: self.introspect.ignore_tables.clone(),
        }
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.renderer.timeout_secs)
    }
}
