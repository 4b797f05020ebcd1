use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
  ARRIVAL_SNAP_THRESHOLD, DEFAULT_GRID_HEIGHT, DEFAULT_GRID_WIDTH,
  DEFAULT_LANDING_COOLDOWN, DEFAULT_PLANES_PER_STATION, DEFAULT_SPEED,
  DEFAULT_STATION_COUNT, DEFAULT_STEP_INTERVAL, DEFAULT_STOP_GRACE,
  DEFAULT_UPDATE_CAPACITY, error::ConfigError,
};

/// Tunables for a simulation run. Every field falls back to its default when
/// missing from a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
  pub grid_width: u32,
  pub grid_height: u32,
  pub station_count: u32,
  pub planes_per_station: u32,

  /// Grid units per second.
  pub speed: f32,
  pub step_interval_ms: u64,
  pub snap_threshold: f32,

  pub stop_grace_ms: u64,
  pub landing_cooldown_ms: u64,

  /// Allow a plane to take a new assignment while its previous turnaround
  /// is still being serviced.
  pub redispatch_during_servicing: bool,

  pub seed: Option<u64>,
  pub update_capacity: usize,
}

impl Default for SimConfig {
  fn default() -> Self {
    Self {
      grid_width: DEFAULT_GRID_WIDTH,
      grid_height: DEFAULT_GRID_HEIGHT,
      station_count: DEFAULT_STATION_COUNT,
      planes_per_station: DEFAULT_PLANES_PER_STATION,

      speed: DEFAULT_SPEED,
      step_interval_ms: DEFAULT_STEP_INTERVAL.as_millis() as u64,
      snap_threshold: ARRIVAL_SNAP_THRESHOLD,

      stop_grace_ms: DEFAULT_STOP_GRACE.as_millis() as u64,
      landing_cooldown_ms: DEFAULT_LANDING_COOLDOWN.as_millis() as u64,

      redispatch_during_servicing: false,

      seed: None,
      update_capacity: DEFAULT_UPDATE_CAPACITY,
    }
  }
}

impl SimConfig {
  pub fn step_interval(&self) -> Duration {
    Duration::from_millis(self.step_interval_ms)
  }

  pub fn stop_grace(&self) -> Duration {
    Duration::from_millis(self.stop_grace_ms)
  }

  pub fn landing_cooldown(&self) -> Duration {
    Duration::from_millis(self.landing_cooldown_ms)
  }

  pub fn plane_count(&self) -> u32 {
    self.station_count * self.planes_per_station
  }

  /// Distance covered by one motion step.
  pub fn step_length(&self) -> f32 {
    self.speed * self.step_interval().as_secs_f32()
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.grid_width == 0 || self.grid_height == 0 {
      return Err(ConfigError::EmptyGrid);
    }
    if self.station_count == 0 {
      return Err(ConfigError::NoStations);
    }
    if self.station_count as u64
      > self.grid_width as u64 * self.grid_height as u64
    {
      return Err(ConfigError::StationsExceedGrid {
        stations: self.station_count,
        cells: self.grid_width as u64 * self.grid_height as u64,
      });
    }
    if self.planes_per_station == 0 {
      return Err(ConfigError::NoPlanes);
    }
    if !(self.speed.is_finite() && self.speed > 0.0) {
      return Err(ConfigError::InvalidSpeed(self.speed));
    }
    if self.step_interval_ms == 0 {
      return Err(ConfigError::ZeroStepInterval);
    }
    if !(self.snap_threshold.is_finite() && self.snap_threshold > 0.0) {
      return Err(ConfigError::InvalidSnapThreshold(self.snap_threshold));
    }
    if self.update_capacity == 0 {
      return Err(ConfigError::ZeroUpdateCapacity);
    }

    Ok(())
  }
}
