use std::sync::Arc;

use glam::Vec2;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use turborand::{TurboRand, rng::Rng};

use crate::{
  AirportId, PlaneId, config::SimConfig, geometry::grid_contains,
};

use super::{
  airport::Airport,
  plane::{Plane, PlaneState},
};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
pub struct StateCounts {
  pub idle: usize,
  pub in_flight: usize,
  pub servicing: usize,
}

impl StateCounts {
  pub fn total(&self) -> usize {
    self.idle + self.in_flight + self.servicing
  }
}

/// The fixed registries of a run. Built once before any worker starts and
/// never resized afterwards; only each plane's own status changes.
#[derive(Debug)]
pub struct World {
  pub width: u32,
  pub height: u32,
  pub airports: Vec<Airport>,
  pub planes: Vec<Arc<Plane>>,
}

impl World {
  /// Places every station on its own random grid cell and parks
  /// `planes_per_station` planes at each one.
  pub fn generate(config: &SimConfig, rng: &Rng) -> Self {
    let mut cells: Vec<Vec2> = (0..config.grid_height)
      .cartesian_product(0..config.grid_width)
      .map(|(y, x)| Vec2::new(x as f32, y as f32))
      .collect();
    rng.shuffle(&mut cells);

    let airports = cells
      .into_iter()
      .take(config.station_count as usize)
      .enumerate()
      .map(|(id, pos)| Airport::new(id as AirportId, pos))
      .collect();

    Self::new(
      config.grid_width,
      config.grid_height,
      airports,
      config.planes_per_station,
    )
  }

  /// Builds the registries from known station positions. Plane ids are
  /// assigned station by station: station `s` owns planes
  /// `s * planes_per_station ..`.
  pub fn new(
    width: u32,
    height: u32,
    airports: Vec<Airport>,
    planes_per_station: u32,
  ) -> Self {
    let planes = airports
      .iter()
      .flat_map(|airport| {
        (0..planes_per_station).map(move |i| {
          let id = airport.id * planes_per_station + i;
          Arc::new(Plane::new(id, airport))
        })
      })
      .collect();

    Self {
      width,
      height,
      airports,
      planes,
    }
  }

  pub fn station_count(&self) -> u32 {
    self.airports.len() as u32
  }

  pub fn airport(&self, id: AirportId) -> Option<&Airport> {
    self.airports.iter().find(|a| a.id == id)
  }

  pub fn plane(&self, id: PlaneId) -> Option<&Arc<Plane>> {
    self.planes.iter().find(|p| p.id == id)
  }

  pub fn contains(&self, pos: Vec2) -> bool {
    grid_contains(pos, self.width, self.height)
  }

  pub fn state_counts(&self) -> StateCounts {
    let counts = self.planes.iter().map(|p| p.state()).counts();
    let get = |state| counts.get(&state).copied().unwrap_or_default();

    StateCounts {
      idle: get(PlaneState::Idle),
      in_flight: get(PlaneState::InFlight),
      servicing: get(PlaneState::Servicing),
    }
  }

  /// Empties every assignment queue and puts every plane back to idle on the
  /// station it last landed at. Returns how many queued destinations were
  /// dropped.
  pub fn reset(&self) -> usize {
    let mut dropped = 0;
    for plane in self.planes.iter() {
      dropped += plane.reset();
      let status = plane.status();
      if let Some(airport) = self.airport(status.location) {
        plane.set_position(airport.pos, status.rotation);
      }
    }
    dropped
  }
}
