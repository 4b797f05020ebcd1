use thiserror::Error;

use crate::AirportId;

#[derive(Debug, Error)]
pub enum SourceError {
  #[error("failed to start `{command}`: {source}")]
  Spawn {
    command: String,
    #[source]
    source: std::io::Error,
  },
  #[error("no request source registered for station {0}")]
  NoRequestSource(AirportId),
  #[error("stream read failed: {0}")]
  Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
  #[error("invalid flight request '{0}'")]
  Malformed(String),
  #[error("invalid destination airport {id}")]
  OutOfRange { id: i64, station_count: u32 },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
  #[error("grid must have at least one cell")]
  EmptyGrid,
  #[error("at least one station is required")]
  NoStations,
  #[error("{stations} stations do not fit on a grid of {cells} cells")]
  StationsExceedGrid { stations: u32, cells: u64 },
  #[error("at least one plane per station is required")]
  NoPlanes,
  #[error("speed must be a positive number, got {0}")]
  InvalidSpeed(f32),
  #[error("step interval must be non-zero")]
  ZeroStepInterval,
  #[error("snap threshold must be a positive number, got {0}")]
  InvalidSnapThreshold(f32),
  #[error("update capacity must be non-zero")]
  ZeroUpdateCapacity,
}
