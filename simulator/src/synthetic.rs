//! Built-in stand-ins for the external request and servicing programs.

use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use turborand::{SeededCore, TurboRand, rng::Rng};

use engine::{
  AirportId, PlaneId,
  error::SourceError,
  source::{ChannelFeed, ChannelSource, SourceFactory},
};

const SERVICING_TASKS: [&str; 5] = [
  "unloading passengers",
  "refuelling",
  "cleaning the cabin",
  "loading baggage",
  "boarding passengers",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
  pub min_request_delay_ms: u64,
  pub max_request_delay_ms: u64,
  /// Chance of a request line being garbage instead of a station id.
  pub malformed_chance: f64,

  pub min_servicing_ms: u64,
  pub max_servicing_ms: u64,
  pub servicing_steps: u32,
}

impl Default for SyntheticConfig {
  fn default() -> Self {
    Self {
      min_request_delay_ms: 500,
      max_request_delay_ms: 3000,
      malformed_chance: 0.05,

      min_servicing_ms: 500,
      max_servicing_ms: 2500,
      servicing_steps: 3,
    }
  }
}

impl SyntheticConfig {
  fn request_delay(&self, rng: &Rng) -> Duration {
    random_delay(rng, self.min_request_delay_ms, self.max_request_delay_ms)
  }

  fn servicing_step(&self, rng: &Rng) -> Duration {
    let total = random_delay(rng, self.min_servicing_ms, self.max_servicing_ms);
    total / self.servicing_steps.max(1)
  }
}

fn random_delay(rng: &Rng, min: u64, max: u64) -> Duration {
  Duration::from_millis(rng.u64(min.min(max)..=max.max(min)))
}

/// One request line: usually a station id, sometimes something the ingestor
/// has to reject.
pub fn request_line(
  rng: &Rng,
  station_count: u32,
  malformed_chance: f64,
) -> String {
  if !rng.chance(malformed_chance) {
    return rng.u32(0..station_count.max(1)).to_string();
  }

  match rng.u8(0..3) {
    0 => (station_count + rng.u32(0..100)).to_string(),
    1 => "mayday".to_owned(),
    _ => String::new(),
  }
}

/// [`SourceFactory`] that generates requests and servicing output in-process.
///
/// Every opened stream is driven by its own task, seeded from the factory's
/// generator so a fixed seed replays the same streams.
#[derive(Debug)]
pub struct SyntheticSources {
  config: SyntheticConfig,
  rng: Mutex<Rng>,
}

impl SyntheticSources {
  pub fn new(config: SyntheticConfig, seed: Option<u64>) -> Self {
    let rng = match seed {
      Some(seed) => Rng::with_seed(seed),
      None => Rng::new(),
    };

    Self {
      config,
      rng: Mutex::new(rng),
    }
  }

  fn stream_rng(&self) -> Rng {
    Rng::with_seed(self.rng.lock().u64(..))
  }
}

impl SourceFactory for SyntheticSources {
  type Requests = ChannelSource;
  type Servicing = ChannelSource;

  fn open_requests(
    &self,
    station: AirportId,
    station_count: u32,
  ) -> Result<ChannelSource, SourceError> {
    let (feed, source) = ChannelSource::pair();
    let config = self.config.clone();
    let rng = self.stream_rng();

    tokio::spawn(generate_requests(feed, config, rng, station, station_count));

    Ok(source)
  }

  fn open_servicing(
    &self,
    station: AirportId,
    plane: PlaneId,
  ) -> Result<ChannelSource, SourceError> {
    let (feed, source) = ChannelSource::pair();
    let config = self.config.clone();
    let rng = self.stream_rng();

    tokio::spawn(service(feed, config, rng, station, plane));

    Ok(source)
  }
}

/// Sleeps for `delay`, returning `false` instead if the reader of `feed`
/// goes away first.
async fn pause(feed: &ChannelFeed, delay: Duration) -> bool {
  tokio::select! {
    _ = feed.closed() => false,
    _ = tokio::time::sleep(delay) => true,
  }
}

async fn generate_requests(
  feed: ChannelFeed,
  config: SyntheticConfig,
  rng: Rng,
  station: AirportId,
  station_count: u32,
) {
  loop {
    let delay = config.request_delay(&rng);
    if !pause(&feed, delay).await {
      break;
    }
    let line = request_line(&rng, station_count, config.malformed_chance);
    if !feed.send_line(line) {
      break;
    }
  }
  tracing::trace!(station, "synthetic request stream closed");
}

async fn service(
  feed: ChannelFeed,
  config: SyntheticConfig,
  rng: Rng,
  station: AirportId,
  plane: PlaneId,
) {
  for _ in 0..config.servicing_steps {
    let delay = config.servicing_step(&rng);
    if !pause(&feed, delay).await {
      return;
    }
    let task = rng.sample(&SERVICING_TASKS).copied().unwrap_or("servicing");
    if !feed.send_line(format!("Plane {plane} at Airport {station}: {task}"))
    {
      return;
    }
  }
  feed.close();
}
