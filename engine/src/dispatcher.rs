use std::sync::Arc;

use crate::{
  AirportId, PlaneId,
  entities::world::World,
  metrics::{MetricKind, Metrics},
  presentation::Presenter,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
  Assigned(PlaneId),
  NoPlaneAvailable,
  UnknownDestination,
}

/// Matches flight requests to idle planes.
///
/// Never blocks and never retries: a request nobody can take is dropped.
#[derive(Debug, Clone)]
pub struct Dispatcher {
  world: Arc<World>,
  metrics: Arc<Metrics>,
  presenter: Presenter,
}

impl Dispatcher {
  pub fn new(
    world: Arc<World>,
    metrics: Arc<Metrics>,
    presenter: Presenter,
  ) -> Self {
    Self {
      world,
      metrics,
      presenter,
    }
  }

  /// Assigns `destination` to the first idle plane in registry order.
  ///
  /// `origin` is the station the request came from and is only reported.
  pub fn dispatch(
    &self,
    origin: AirportId,
    destination: AirportId,
  ) -> DispatchOutcome {
    if self.world.airport(destination).is_none() {
      self.presenter.log_line(format!(
        "Error: Destination airport {destination} not found."
      ));
      return DispatchOutcome::UnknownDestination;
    }

    // Claiming checks and flips the plane's state under its own lock, so a
    // concurrent dispatch moves on to the next plane instead.
    let Some(plane) =
      self.world.planes.iter().find(|p| p.try_claim(destination))
    else {
      tracing::debug!(origin, destination, "request dropped");
      self.presenter.log_line(format!(
        "No available planes to handle request from Airport {origin} to \
         Airport {destination}."
      ));
      return DispatchOutcome::NoPlaneAvailable;
    };

    let in_flight = self.metrics.increment(MetricKind::InFlight);
    self.presenter.update_metric(MetricKind::InFlight, in_flight);
    self.presenter.log_line(format!(
      "Flight request: Plane {} to Airport {destination}.",
      plane.id
    ));

    DispatchOutcome::Assigned(plane.id)
  }
}
