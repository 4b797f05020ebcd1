use std::{sync::Arc, time::Duration};

use tokio::io::BufReader;
use turborand::{SeededCore, rng::Rng};

use engine::{
  config::SimConfig,
  controller::SimulationController,
  entities::world::World,
  presentation::{IncomingCommand, Presenter},
  source::SourceFactory,
};
use simulator::{
  CLI,
  commands::read_commands,
  config::Config,
  console::{format_metrics, render_updates},
  logging,
  synthetic::SyntheticSources,
};

#[tokio::main]
async fn main() {
  let guard = match logging::init(CLI.log_dir.as_deref()) {
    Ok(guard) => guard,
    Err(e) => {
      eprintln!("Unable to set up logging: {e}");
      std::process::exit(1);
    }
  };

  let code = run().await;

  // Reading stdin blocks a runtime thread that would otherwise keep the
  // process alive until the next line of input.
  drop(guard);
  std::process::exit(code);
}

async fn run() -> i32 {
  let config_path = CLI.config_path.clone().or_else(Config::default_path);
  let config = match config_path {
    Some(path) => match Config::from_path(&path) {
      Ok(config) => {
        tracing::info!("Loaded config from {}", path.display());
        config
      }
      Err(e) => {
        tracing::error!("{e}");
        return 2;
      }
    },
    None => Config::default(),
  };

  let mut sim = config.simulation();
  if CLI.seed.is_some() {
    sim.seed = CLI.seed;
  }
  if let Err(e) = sim.validate() {
    tracing::error!("Invalid simulation config: {e}");
    return 2;
  }

  let rng = match sim.seed {
    Some(seed) => Rng::with_seed(seed),
    None => Rng::new(),
  };
  let world = Arc::new(World::generate(&sim, &rng));
  for airport in world.airports.iter() {
    tracing::info!("{airport} at ({}, {})", airport.pos.x, airport.pos.y);
  }

  let presenter = Presenter::new(sim.update_capacity);
  let console = tokio::spawn(render_updates(
    presenter.subscribe(),
    CLI.positions_path.as_deref(),
  ));

  match config.process_sources() {
    Some(sources) if !CLI.synthetic => {
      tracing::info!(
        "Requests from `{}`, servicing from `{}`",
        sources.requests,
        sources.servicing
      );
      simulate(sim, world, Arc::new(sources), presenter).await;
    }
    _ => {
      tracing::info!("Using synthetic requests and servicing");
      let sources = SyntheticSources::new(config.synthetic(), sim.seed);
      simulate(sim, world, Arc::new(sources), presenter).await;
    }
  }

  match tokio::time::timeout(Duration::from_secs(1), console).await {
    Ok(Ok(metrics)) => println!("Final: [{}]", format_metrics(&metrics)),
    Ok(Err(e)) => tracing::error!("Console task failed: {e}"),
    Err(_) => tracing::warn!("Console did not finish in time"),
  }

  0
}

async fn simulate<F: SourceFactory>(
  sim: SimConfig,
  world: Arc<World>,
  sources: Arc<F>,
  presenter: Presenter,
) {
  let controller =
    Arc::new(SimulationController::new(sim, world, sources, presenter));
  let (command_tx, command_rx) = async_channel::unbounded();

  let serve = {
    let controller = controller.clone();
    tokio::spawn(async move { controller.serve(command_rx).await })
  };

  let run_for = CLI.run_for.map(Duration::from_secs);
  if CLI.autostart || run_for.is_some() {
    // The receiver is held by the serve task, so this cannot fail.
    let _ = command_tx.send(IncomingCommand::Start).await;
  } else {
    println!("Type start, stop or quit.");
  }

  let mut stdin = tokio::spawn(read_commands(
    BufReader::new(tokio::io::stdin()),
    command_tx.clone(),
  ));

  tokio::select! {
    _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted"),
    _ = &mut stdin => {}
    _ = async {
      match run_for {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
      }
    } => tracing::info!("Run time elapsed"),
  }

  stdin.abort();
  command_tx.close();
  if let Err(e) = serve.await {
    tracing::error!("Controller task failed: {e}");
  }

  let snapshot = controller.metrics().snapshot();
  tracing::info!(
    in_flight = snapshot.in_flight,
    servicing = snapshot.servicing,
    serviced = snapshot.serviced,
    completed_trips = snapshot.completed_trips,
    "Simulation finished"
  );
}
