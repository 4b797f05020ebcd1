use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use engine::{
  config::SimConfig,
  source::{CommandSpec, ProcessSources},
};

use crate::synthetic::SyntheticConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config file {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("failed to parse config file: {0}")]
  Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
  pub simulation: Option<SimConfig>,
  pub sources: Option<SourcesConfig>,
  pub synthetic: Option<SyntheticConfig>,
}

/// External commands to run for each stream. The station count and station
/// id, or the station id and plane id, are appended as the last arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcesConfig {
  pub requests: Option<String>,
  pub servicing: Option<String>,
}

impl Config {
  pub fn from_path<T>(path: T) -> Result<Self, ConfigError>
  where
    T: AsRef<Path>,
  {
    let path = path.as_ref();
    let config =
      std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_owned(),
        source,
      })?;

    Ok(toml::from_str(&config)?)
  }

  /// `config.toml` in the platform config directory, if there is one.
  pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "airtraffic")
      .map(|dirs| dirs.config_dir().join("config.toml"))
      .filter(|path| path.is_file())
  }

  pub fn simulation(&self) -> SimConfig {
    self.simulation.clone().unwrap_or_default()
  }

  pub fn synthetic(&self) -> SyntheticConfig {
    self.synthetic.clone().unwrap_or_default()
  }

  /// Process-backed sources, when both commands are configured.
  pub fn process_sources(&self) -> Option<ProcessSources> {
    let sources = self.sources.as_ref()?;
    let requests = CommandSpec::parse(sources.requests.as_deref()?)?;
    let servicing = CommandSpec::parse(sources.servicing.as_deref()?)?;
    Some(ProcessSources::new(requests, servicing))
  }
}
