use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use tokio::sync::Mutex;

use crate::{
  agent::{AgentContext, PlaneAgent},
  config::SimConfig,
  dispatcher::Dispatcher,
  entities::world::World,
  ingestor::RequestIngestor,
  metrics::{MetricKind, Metrics},
  motion::{MotionClock, MotionSimulator},
  pool::WorkerPool,
  presentation::{IncomingCommand, Presenter},
  servicing::ServicingCoordinator,
  source::SourceFactory,
};

/// Starts and stops simulation runs.
///
/// A run owns one [`WorkerPool`] holding an ingestor per station, an agent
/// per plane, the motion clock and every servicing episode. Start and stop
/// are serialized against each other and are safe to call at any time.
#[derive(Debug)]
pub struct SimulationController<F> {
  config: SimConfig,
  world: Arc<World>,
  sources: Arc<F>,
  metrics: Arc<Metrics>,
  presenter: Presenter,

  running: AtomicBool,
  run: Mutex<Option<WorkerPool>>,
}

impl<F: SourceFactory> SimulationController<F> {
  pub fn new(
    config: SimConfig,
    world: Arc<World>,
    sources: Arc<F>,
    presenter: Presenter,
  ) -> Self {
    Self {
      config,
      world,
      sources,
      metrics: Arc::new(Metrics::new()),
      presenter,

      running: AtomicBool::new(false),
      run: Mutex::new(None),
    }
  }

  pub fn is_running(&self) -> bool {
    self.running.load(Ordering::Acquire)
  }

  pub fn config(&self) -> &SimConfig {
    &self.config
  }

  pub fn world(&self) -> &Arc<World> {
    &self.world
  }

  pub fn metrics(&self) -> &Arc<Metrics> {
    &self.metrics
  }

  pub fn presenter(&self) -> &Presenter {
    &self.presenter
  }

  /// Returns `false`, after telling the user, if a run is already going.
  pub async fn start(&self) -> bool {
    let mut run = self.run.lock().await;
    if run.is_some() {
      self.presenter.log_line("Simulation is already running.");
      return false;
    }

    self.reset_for_run();

    let pool = WorkerPool::new();
    let cancel = pool.token();
    self.running.store(true, Ordering::Release);

    let (clock, driver) = MotionClock::new(self.config.step_interval());
    pool.spawn(driver.run(cancel.clone()));

    let dispatcher = Dispatcher::new(
      self.world.clone(),
      self.metrics.clone(),
      self.presenter.clone(),
    );
    let ctx = Arc::new(AgentContext {
      world: self.world.clone(),
      motion: MotionSimulator::new(
        &self.config,
        clock,
        self.presenter.clone(),
      ),
      servicing: ServicingCoordinator::new(
        self.sources.clone(),
        self.metrics.clone(),
        self.presenter.clone(),
      ),
      metrics: self.metrics.clone(),
      presenter: self.presenter.clone(),
      pool: pool.clone(),
      landing_cooldown: self.config.landing_cooldown(),
      redispatch_during_servicing: self.config.redispatch_during_servicing,
    });

    let station_count = self.world.station_count();
    for airport in self.world.airports.iter() {
      let ingestor = RequestIngestor::new(
        airport.id,
        station_count,
        self.sources.clone(),
        dispatcher.clone(),
        self.presenter.clone(),
      );
      let cancel = cancel.clone();
      pool.spawn(async move {
        ingestor.run(cancel).await;
      });
    }

    for plane in self.world.planes.iter() {
      let agent = PlaneAgent::new(plane.clone(), ctx.clone());
      pool.spawn(agent.run(cancel.clone()));
    }

    tracing::info!(
      stations = station_count,
      planes = self.world.planes.len(),
      "run started"
    );
    *run = Some(pool);
    self.presenter.log_line("Simulation Started.");
    true
  }

  /// Returns `false`, after telling the user, if nothing is running.
  pub async fn stop(&self) -> bool {
    let mut run = self.run.lock().await;
    let Some(pool) = run.take() else {
      self.presenter.log_line("Simulation is not running.");
      return false;
    };

    self.running.store(false, Ordering::Release);
    let report = pool.shutdown(self.config.stop_grace()).await;
    tracing::info!(aborted = report.aborted, "run stopped");

    self.presenter.log_line("Simulation Ended.");
    true
  }

  /// Handles commands until the sender side goes away, then stops any run
  /// still in progress.
  pub async fn serve(
    &self,
    commands: async_channel::Receiver<IncomingCommand>,
  ) {
    while let Ok(command) = commands.recv().await {
      tracing::debug!(?command, "received command");
      match command {
        IncomingCommand::Start => {
          self.start().await;
        }
        IncomingCommand::Stop => {
          self.stop().await;
        }
      }
    }

    if self.is_running() {
      self.stop().await;
    }
  }

  /// Puts the world back into its start-of-run state: empty queues, every
  /// plane idle on a station, and no flights or turnarounds counted.
  fn reset_for_run(&self) {
    let dropped = self.world.reset();
    if dropped > 0 {
      tracing::debug!(dropped, "discarded assignments from the last run");
    }

    self.metrics.reset(MetricKind::InFlight);
    self.metrics.reset(MetricKind::Servicing);
    for kind in MetricKind::ALL {
      self.presenter.update_metric(kind, self.metrics.get(kind));
    }

    for plane in self.world.planes.iter() {
      let status = plane.status();
      self
        .presenter
        .update_plane_position(plane.id, status.pos, status.rotation);
    }
  }
}
