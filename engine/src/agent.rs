use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;

use crate::{
  entities::{
    airport::Airport,
    plane::{Plane, PlaneState},
    world::World,
  },
  metrics::{MetricKind, Metrics},
  motion::{FlightOutcome, MotionSimulator},
  pool::WorkerPool,
  presentation::Presenter,
  servicing::ServicingCoordinator,
  source::SourceFactory,
};

/// Everything the agents of one run share.
#[derive(Debug)]
pub struct AgentContext<F> {
  pub world: Arc<World>,
  pub motion: MotionSimulator,
  pub servicing: ServicingCoordinator<F>,
  pub metrics: Arc<Metrics>,
  pub presenter: Presenter,
  /// Servicing episodes are spawned here so a stop reaches them too.
  pub pool: WorkerPool,
  pub landing_cooldown: Duration,
  pub redispatch_during_servicing: bool,
}

/// Lifecycle loop of one plane: wait for a destination, fly there, land,
/// hand the turnaround off to servicing, repeat.
#[derive(Debug)]
pub struct PlaneAgent<F> {
  plane: Arc<Plane>,
  ctx: Arc<AgentContext<F>>,
}

impl<F: SourceFactory> PlaneAgent<F> {
  pub fn new(plane: Arc<Plane>, ctx: Arc<AgentContext<F>>) -> Self {
    Self { plane, ctx }
  }

  pub async fn run(self, cancel: CancellationToken) {
    let id = self.plane.id;

    while !cancel.is_cancelled() {
      let next = tokio::select! {
        biased;

        _ = cancel.cancelled() => None,
        next = self.plane.next_assignment() => next,
      };
      let Some(destination) = next else {
        break;
      };

      let Some(airport) = self.ctx.world.airport(destination).copied() else {
        tracing::error!(plane = id, destination, "no such airport, skipping");
        self.plane.set_state(PlaneState::Idle);
        let in_flight = self.ctx.metrics.decrement(MetricKind::InFlight);
        self.ctx.presenter.update_metric(MetricKind::InFlight, in_flight);
        continue;
      };

      tracing::debug!(plane = id, destination, "departing");
      match self.ctx.motion.fly(&self.plane, &airport, &cancel).await {
        FlightOutcome::Arrived { steps } => {
          tracing::trace!(plane = id, steps, "arrived");
        }
        FlightOutcome::Cancelled => break,
      }
      if cancel.is_cancelled() {
        break;
      }

      self.land(&airport);
      if !self.start_servicing(&airport, &cancel) {
        break;
      }

      tokio::select! {
        biased;

        _ = cancel.cancelled() => break,
        _ = tokio::time::sleep(self.ctx.landing_cooldown) => {}
      }
    }

    tracing::debug!(plane = id, "agent stopped");
  }

  fn land(&self, airport: &Airport) {
    let in_flight = self.ctx.metrics.decrement(MetricKind::InFlight);
    self
      .ctx
      .presenter
      .update_metric(MetricKind::InFlight, in_flight);

    let state = if self.ctx.redispatch_during_servicing {
      PlaneState::Idle
    } else {
      PlaneState::Servicing
    };
    let status = self.plane.land(airport, state);

    self.ctx.presenter.update_plane_position(
      self.plane.id,
      status.pos,
      status.rotation,
    );
    self.ctx.presenter.log_line(format!(
      "Plane {} arrived at Airport {}.",
      self.plane.id, airport.id
    ));
  }

  /// Returns `false` if the pool is already shutting down.
  fn start_servicing(
    &self,
    airport: &Airport,
    cancel: &CancellationToken,
  ) -> bool {
    let servicing = self.ctx.servicing.clone();
    let plane = self.plane.clone();
    let station = airport.id;
    let cancel = cancel.clone();

    self.ctx.pool.spawn(async move {
      servicing.service(station, &plane, &cancel).await;
    })
  }
}

#[cfg(test)]
mod tests {
  use glam::Vec2;

  use super::*;
  use crate::{
    config::SimConfig,
    motion::MotionClock,
    presentation::test_support::drain_logs,
    source::ScriptedSources,
  };

  async fn wait_until(mut done: impl FnMut() -> bool) {
    while !done() {
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
  }

  struct Harness {
    ctx: Arc<AgentContext<ScriptedSources>>,
    sources: Arc<ScriptedSources>,
    cancel: CancellationToken,
  }

  impl Harness {
    fn new(sources: ScriptedSources, redispatch: bool) -> Self {
      let config = SimConfig {
        redispatch_during_servicing: redispatch,
        ..Default::default()
      };
      let airports = vec![
        Airport::new(0, Vec2::new(0.0, 0.0)),
        Airport::new(1, Vec2::new(0.0, 2.0)),
      ];
      let world = Arc::new(World::new(10, 10, airports, 1));
      let sources = Arc::new(sources);
      let metrics = Arc::new(Metrics::new());
      let presenter = Presenter::new(1024);
      let pool = WorkerPool::new();

      let (clock, driver) = MotionClock::new(config.step_interval());
      pool.spawn(driver.run(pool.token()));

      let ctx = Arc::new(AgentContext {
        world,
        motion: MotionSimulator::new(&config, clock, presenter.clone()),
        servicing: ServicingCoordinator::new(
          sources.clone(),
          metrics.clone(),
          presenter.clone(),
        ),
        metrics,
        presenter,
        pool: pool.clone(),
        landing_cooldown: config.landing_cooldown(),
        redispatch_during_servicing: redispatch,
      });

      Self {
        cancel: ctx.pool.token(),
        ctx,
        sources,
      }
    }

    fn plane(&self, id: u32) -> Arc<Plane> {
      self.ctx.world.planes[id as usize].clone()
    }

    fn spawn_agent(&self, id: u32) {
      let agent = PlaneAgent::new(self.plane(id), self.ctx.clone());
      self.ctx.pool.spawn(agent.run(self.cancel.clone()));
    }

    fn claim(&self, id: u32, destination: u32) {
      assert!(self.plane(id).try_claim(destination));
      self.ctx.metrics.increment(MetricKind::InFlight);
    }
  }

  #[tokio::test(start_paused = true)]
  async fn test_full_trip_lands_and_services() {
    let h = Harness::new(
      ScriptedSources::new().with_servicing_script(["refuelled"]),
      false,
    );
    let mut rx = h.ctx.presenter.subscribe();
    h.spawn_agent(0);
    h.claim(0, 1);

    let metrics = h.ctx.metrics.clone();
    wait_until(|| metrics.get(MetricKind::CompletedTrips) == 1).await;

    let status = h.plane(0).status();
    assert_eq!(status.pos, Vec2::new(0.0, 2.0));
    assert_eq!(status.location, 1);
    assert_eq!(status.state, PlaneState::Idle);
    assert_eq!(metrics.get(MetricKind::InFlight), 0);
    assert_eq!(metrics.get(MetricKind::Servicing), 0);
    assert_eq!(h.sources.servicing_opened(), vec![(1, 0)]);

    let logs = drain_logs(&mut rx);
    assert_eq!(
      logs,
      vec![
        "Plane 0 arrived at Airport 1.".to_owned(),
        "refuelled".to_owned(),
        "Plane 0 has completed servicing at Airport 1.".to_owned(),
      ]
    );

    h.ctx.pool.shutdown(Duration::from_secs(5)).await;
  }

  #[tokio::test(start_paused = true)]
  async fn test_plane_not_redispatched_until_serviced() {
    let h = Harness::new(ScriptedSources::new().holding_servicing(), false);
    h.spawn_agent(0);
    h.claim(0, 1);

    let sources = h.sources.clone();
    wait_until(|| !sources.servicing_opened().is_empty()).await;

    let plane = h.plane(0);
    assert_eq!(plane.state(), PlaneState::Servicing);
    assert!(!plane.try_claim(0));

    for held in h.sources.take_held() {
      held.feed.close();
    }
    wait_until(|| plane.state() == PlaneState::Idle).await;
    assert!(plane.try_claim(0));

    h.ctx.pool.shutdown(Duration::from_secs(5)).await;
  }

  #[tokio::test(start_paused = true)]
  async fn test_redispatch_allowed_during_servicing_when_enabled() {
    let h = Harness::new(ScriptedSources::new().holding_servicing(), true);
    h.spawn_agent(0);
    h.claim(0, 1);

    let sources = h.sources.clone();
    wait_until(|| !sources.servicing_opened().is_empty()).await;

    let plane = h.plane(0);
    assert_eq!(plane.state(), PlaneState::Idle);
    assert_eq!(h.ctx.metrics.get(MetricKind::Servicing), 1);
    assert!(plane.try_claim(0));

    h.ctx.pool.shutdown(Duration::from_secs(5)).await;
  }

  #[tokio::test(start_paused = true)]
  async fn test_cancel_mid_flight_stops_the_plane() {
    let h = Harness::new(ScriptedSources::new(), false);
    h.spawn_agent(0);
    h.claim(0, 1);

    let plane = h.plane(0);
    wait_until(|| plane.pos().y > 0.0).await;

    let report = h.ctx.pool.shutdown(Duration::from_secs(5)).await;
    assert_eq!(report.aborted, 0);

    let pos = plane.pos();
    assert!(pos.y > 0.0 && pos.y < 2.0, "plane at {pos}");
    assert_eq!(plane.state(), PlaneState::InFlight);
    assert!(h.sources.servicing_opened().is_empty());
  }
}
