//! Line-oriented streams feeding the simulation.
//!
//! Flight requests and turnaround servicing both come from producers outside
//! the simulation. Each one is opened through a [`SourceFactory`] and read one
//! line at a time through [`LineSource`], so the real external processes
//! ([`ProcessSources`]) and in-memory stand-ins ([`ScriptedSources`]) are
//! interchangeable.

use std::{
  collections::HashMap,
  future::Future,
  io,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{AirportId, PlaneId, error::SourceError};

mod process;

pub use process::{CommandSpec, ProcessSource, ProcessSources};

pub trait LineSource: Send {
  /// The next line without its terminator, or `None` once the producer has
  /// closed the stream.
  ///
  /// Must be cancel safe: dropping the future before it completes loses no
  /// line.
  fn next_line(
    &mut self,
  ) -> impl Future<Output = Result<Option<String>, SourceError>> + Send;

  /// Waits for the producer to finish on its own.
  fn wait(&mut self) -> impl Future<Output = ()> + Send;

  /// Forcibly stops the producer.
  fn terminate(&mut self) -> impl Future<Output = ()> + Send;
}

pub trait SourceFactory: Send + Sync + 'static {
  type Requests: LineSource + 'static;
  type Servicing: LineSource + 'static;

  /// Opens the flight-request stream of `station`.
  fn open_requests(
    &self,
    station: AirportId,
    station_count: u32,
  ) -> Result<Self::Requests, SourceError>;

  /// Opens the servicing stream for `plane` turning around at `station`.
  fn open_servicing(
    &self,
    station: AirportId,
    plane: PlaneId,
  ) -> Result<Self::Servicing, SourceError>;
}

/// Writing half of a [`ChannelSource`].
#[derive(Debug, Clone)]
pub struct ChannelFeed {
  sender: async_channel::Sender<io::Result<String>>,
  terminated: Arc<AtomicBool>,
  reader_gone: CancellationToken,
}

impl ChannelFeed {
  /// Returns `false` if the reading side is gone.
  pub fn send_line(&self, line: impl Into<String>) -> bool {
    self.sender.try_send(Ok(line.into())).is_ok()
  }

  /// Makes the reader see an I/O failure.
  pub fn fail(&self, kind: io::ErrorKind) -> bool {
    self.sender.try_send(Err(io::Error::from(kind))).is_ok()
  }

  /// Ends the stream; the reader sees end-of-stream after any queued lines.
  pub fn close(&self) {
    self.sender.close();
  }

  /// Whether the reading side forcibly terminated the stream.
  pub fn is_terminated(&self) -> bool {
    self.terminated.load(Ordering::Acquire)
  }

  /// Resolves once the reading side is terminated or dropped.
  pub async fn closed(&self) {
    self.reader_gone.cancelled().await;
  }
}

/// In-memory [`LineSource`] fed through a [`ChannelFeed`].
#[derive(Debug)]
pub struct ChannelSource {
  receiver: async_channel::Receiver<io::Result<String>>,
  terminated: Arc<AtomicBool>,
  reader_gone: CancellationToken,
}

impl ChannelSource {
  pub fn pair() -> (ChannelFeed, ChannelSource) {
    let (sender, receiver) = async_channel::unbounded();
    let terminated = Arc::new(AtomicBool::new(false));
    let reader_gone = CancellationToken::new();

    (
      ChannelFeed {
        sender,
        terminated: terminated.clone(),
        reader_gone: reader_gone.clone(),
      },
      ChannelSource {
        receiver,
        terminated,
        reader_gone,
      },
    )
  }

  /// A source that yields `lines` and then closes.
  pub fn from_lines<I, S>(lines: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let (feed, source) = Self::pair();
    for line in lines {
      feed.send_line(line);
    }
    feed.close();
    source
  }
}

impl LineSource for ChannelSource {
  async fn next_line(&mut self) -> Result<Option<String>, SourceError> {
    match self.receiver.recv().await {
      Ok(Ok(line)) => Ok(Some(line)),
      Ok(Err(e)) => Err(SourceError::Io(e)),
      Err(_) => Ok(None),
    }
  }

  async fn wait(&mut self) {
    while let Ok(Ok(_)) = self.receiver.recv().await {}
  }

  async fn terminate(&mut self) {
    self.terminated.store(true, Ordering::Release);
    self.receiver.close();
    self.reader_gone.cancel();
  }
}

impl Drop for ChannelSource {
  fn drop(&mut self) {
    self.reader_gone.cancel();
  }
}

/// A servicing stream opened through [`ScriptedSources`] while servicing is
/// held, waiting for a test to drive it.
#[derive(Debug, Clone)]
pub struct HeldServicing {
  pub station: AirportId,
  pub plane: PlaneId,
  pub feed: ChannelFeed,
}

/// [`SourceFactory`] backed entirely by in-memory channels.
///
/// Request streams must be registered per station before they are opened;
/// opening an unregistered station fails. Servicing streams either replay a
/// fixed script and close, or are held open for the caller to drive.
#[derive(Debug, Default)]
pub struct ScriptedSources {
  requests: Mutex<HashMap<AirportId, ChannelSource>>,
  servicing_script: Vec<String>,
  hold_servicing: bool,
  held: Mutex<Vec<HeldServicing>>,
  servicing_opened: Mutex<Vec<(AirportId, PlaneId)>>,
}

impl ScriptedSources {
  pub fn new() -> Self {
    Self::default()
  }

  /// Every servicing stream replays `lines` and closes right away.
  pub fn with_servicing_script<I, S>(mut self, lines: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.servicing_script = lines.into_iter().map(Into::into).collect();
    self
  }

  /// Servicing streams stay open until driven through [`Self::take_held`].
  pub fn holding_servicing(mut self) -> Self {
    self.hold_servicing = true;
    self
  }

  /// Registers a fresh request stream for `station`, replacing any previous
  /// one that has not been opened yet.
  pub fn register_requests(&self, station: AirportId) -> ChannelFeed {
    let (feed, source) = ChannelSource::pair();
    self.requests.lock().insert(station, source);
    feed
  }

  pub fn take_held(&self) -> Vec<HeldServicing> {
    std::mem::take(&mut *self.held.lock())
  }

  /// Every (station, plane) servicing stream opened so far, in order.
  pub fn servicing_opened(&self) -> Vec<(AirportId, PlaneId)> {
    self.servicing_opened.lock().clone()
  }
}

impl SourceFactory for ScriptedSources {
  type Requests = ChannelSource;
  type Servicing = ChannelSource;

  fn open_requests(
    &self,
    station: AirportId,
    _station_count: u32,
  ) -> Result<ChannelSource, SourceError> {
    self
      .requests
      .lock()
      .remove(&station)
      .ok_or(SourceError::NoRequestSource(station))
  }

  fn open_servicing(
    &self,
    station: AirportId,
    plane: PlaneId,
  ) -> Result<ChannelSource, SourceError> {
    self.servicing_opened.lock().push((station, plane));

    let (feed, source) = ChannelSource::pair();
    for line in self.servicing_script.iter() {
      feed.send_line(line.clone());
    }

    if self.hold_servicing {
      self.held.lock().push(HeldServicing {
        station,
        plane,
        feed,
      });
    } else {
      feed.close();
    }

    Ok(source)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_channel_source_yields_lines_then_closes() {
    let mut source = ChannelSource::from_lines(["3", "", "7"]);
    assert_eq!(source.next_line().await.unwrap(), Some("3".to_owned()));
    assert_eq!(source.next_line().await.unwrap(), Some("".to_owned()));
    assert_eq!(source.next_line().await.unwrap(), Some("7".to_owned()));
    assert_eq!(source.next_line().await.unwrap(), None);
  }

  #[tokio::test]
  async fn test_channel_source_reports_failures() {
    let (feed, mut source) = ChannelSource::pair();
    feed.fail(io::ErrorKind::BrokenPipe);
    assert!(matches!(
      source.next_line().await,
      Err(SourceError::Io(e)) if e.kind() == io::ErrorKind::BrokenPipe
    ));
  }

  #[tokio::test]
  async fn test_terminate_is_visible_to_the_feed() {
    let (feed, mut source) = ChannelSource::pair();
    assert!(!feed.is_terminated());
    source.terminate().await;
    assert!(feed.is_terminated());
    assert!(!feed.send_line("too late"));
  }

  #[tokio::test]
  async fn test_feed_sees_the_reader_go_away() {
    let (feed, mut source) = ChannelSource::pair();
    source.terminate().await;
    feed.closed().await;

    let (feed, source) = ChannelSource::pair();
    drop(source);
    feed.closed().await;
  }

  #[test]
  fn test_unregistered_station_fails_to_open() {
    let sources = ScriptedSources::new();
    sources.register_requests(1);

    assert!(matches!(
      sources.open_requests(0, 10),
      Err(SourceError::NoRequestSource(0))
    ));
    assert!(sources.open_requests(1, 10).is_ok());
    // A registered stream is handed out once.
    assert!(sources.open_requests(1, 10).is_err());
  }

  #[tokio::test]
  async fn test_scripted_servicing_replays_and_closes() {
    let sources =
      ScriptedSources::new().with_servicing_script(["refuel", "clean"]);
    let mut source = sources.open_servicing(4, 41).unwrap();

    assert_eq!(source.next_line().await.unwrap(), Some("refuel".into()));
    assert_eq!(source.next_line().await.unwrap(), Some("clean".into()));
    assert_eq!(source.next_line().await.unwrap(), None);
    assert_eq!(sources.servicing_opened(), vec![(4, 41)]);
  }

  #[tokio::test]
  async fn test_held_servicing_waits_for_the_caller() {
    let sources = ScriptedSources::new().holding_servicing();
    let mut source = sources.open_servicing(2, 20).unwrap();

    let held = sources.take_held();
    assert_eq!(held.len(), 1);
    assert_eq!((held[0].station, held[0].plane), (2, 20));

    held[0].feed.send_line("working");
    held[0].feed.close();
    assert_eq!(source.next_line().await.unwrap(), Some("working".into()));
    assert_eq!(source.next_line().await.unwrap(), None);
  }
}
