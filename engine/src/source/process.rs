use core::fmt;
use std::{io, process::Stdio};

use tokio::{
  io::{AsyncBufReadExt, AsyncRead, BufReader},
  process::{Child, ChildStderr, ChildStdout, Command},
};

use crate::{AirportId, PlaneId, error::SourceError};

use super::{LineSource, SourceFactory};

/// A program plus the arguments that come before the per-stream ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
  pub program: String,
  pub args: Vec<String>,
}

impl CommandSpec {
  pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      program: program.into(),
      args: args.into_iter().map(Into::into).collect(),
    }
  }

  /// Splits a command line on whitespace. No quoting is supported.
  pub fn parse(line: &str) -> Option<Self> {
    let mut parts = line.split_whitespace();
    let program = parts.next()?;
    Some(Self::new(program, parts))
  }

  fn spawn(&self, extra: [String; 2]) -> Result<ProcessSource, SourceError> {
    let mut child = Command::new(&self.program)
      .args(&self.args)
      .args(&extra)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true)
      .spawn()
      .map_err(|source| SourceError::Spawn {
        command: format!("{self} {} {}", extra[0], extra[1]),
        source,
      })?;

    let stdout = child.stdout.take().map(RawLines::new);
    let stderr = child.stderr.take().map(RawLines::new);

    Ok(ProcessSource {
      child,
      stdout,
      stderr,
    })
  }
}

impl fmt::Display for CommandSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.program)?;
    for arg in self.args.iter() {
      write!(f, " {arg}")?;
    }
    Ok(())
  }
}

/// Opens sources by spawning external programs:
/// `<requests> <station count> <station>` and
/// `<servicing> <station> <plane>`.
#[derive(Debug, Clone)]
pub struct ProcessSources {
  pub requests: CommandSpec,
  pub servicing: CommandSpec,
}

impl ProcessSources {
  pub fn new(requests: CommandSpec, servicing: CommandSpec) -> Self {
    Self {
      requests,
      servicing,
    }
  }
}

impl SourceFactory for ProcessSources {
  type Requests = ProcessSource;
  type Servicing = ProcessSource;

  fn open_requests(
    &self,
    station: AirportId,
    station_count: u32,
  ) -> Result<ProcessSource, SourceError> {
    self
      .requests
      .spawn([station_count.to_string(), station.to_string()])
  }

  fn open_servicing(
    &self,
    station: AirportId,
    plane: PlaneId,
  ) -> Result<ProcessSource, SourceError> {
    self.servicing.spawn([station.to_string(), plane.to_string()])
  }
}

/// Newline-delimited reader that decodes each line lossily, so stray bytes
/// that are not UTF-8 never end the stream.
///
/// A partially read line stays in `buf` if `next_line` is dropped mid-read,
/// which keeps it usable inside `select!`.
#[derive(Debug)]
struct RawLines<R> {
  reader: BufReader<R>,
  buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> RawLines<R> {
  fn new(inner: R) -> Self {
    Self {
      reader: BufReader::new(inner),
      buf: Vec::new(),
    }
  }

  async fn next_line(&mut self) -> io::Result<Option<String>> {
    self.reader.read_until(b'\n', &mut self.buf).await?;
    if self.buf.is_empty() {
      return Ok(None);
    }

    let mut bytes = std::mem::take(&mut self.buf);
    if bytes.last() == Some(&b'\n') {
      bytes.pop();
      if bytes.last() == Some(&b'\r') {
        bytes.pop();
      }
    }
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
  }
}

enum Stream {
  Out,
  Err,
}

/// Output of a child process, with stdout and stderr merged line by line.
#[derive(Debug)]
pub struct ProcessSource {
  child: Child,
  stdout: Option<RawLines<ChildStdout>>,
  stderr: Option<RawLines<ChildStderr>>,
}

impl LineSource for ProcessSource {
  async fn next_line(&mut self) -> Result<Option<String>, SourceError> {
    loop {
      let (stream, line) = match (&mut self.stdout, &mut self.stderr) {
        (None, None) => return Ok(None),
        (Some(out), None) => (Stream::Out, out.next_line().await),
        (None, Some(err)) => (Stream::Err, err.next_line().await),
        (Some(out), Some(err)) => tokio::select! {
          line = out.next_line() => (Stream::Out, line),
          line = err.next_line() => (Stream::Err, line),
        },
      };

      match (stream, line?) {
        (_, Some(line)) => return Ok(Some(line)),
        (Stream::Out, None) => self.stdout = None,
        (Stream::Err, None) => self.stderr = None,
      }
    }
  }

  async fn wait(&mut self) {
    match self.child.wait().await {
      Ok(status) => tracing::debug!("source process exited: {status}"),
      Err(e) => tracing::warn!("unable to wait for source process: {e}"),
    }
  }

  async fn terminate(&mut self) {
    if let Err(e) = self.child.start_kill() {
      tracing::debug!("source process already gone: {e}");
    }
    self.wait().await;
  }
}

#[cfg(all(test, unix))]
mod tests {
  use std::sync::Arc;

  use glam::Vec2;
  use tokio_util::sync::CancellationToken;

  use super::*;
  use crate::{
    dispatcher::Dispatcher,
    entities::{
      airport::Airport,
      plane::{Plane, PlaneState},
      world::World,
    },
    ingestor::{IngestorExit, RequestIngestor},
    metrics::{MetricKind, Metrics},
    presentation::{Presenter, test_support::drain_logs},
    servicing::{ServicingCoordinator, ServicingOutcome},
  };

  fn shell(script: &str) -> CommandSpec {
    CommandSpec::new("sh", ["-c", script])
  }

  #[test]
  fn test_parse_command_line() {
    assert_eq!(
      CommandSpec::parse("  saed_flight_requests --fast "),
      Some(CommandSpec::new("saed_flight_requests", ["--fast"]))
    );
    assert_eq!(CommandSpec::parse("   "), None);
  }

  #[tokio::test]
  async fn test_request_process_gets_station_arguments() {
    // With `sh -c`, the appended arguments become $0 and $1.
    let sources = ProcessSources::new(
      shell("echo $0; echo $1; echo oops >&2"),
      shell("true"),
    );
    let mut source = sources.open_requests(3, 10).unwrap();

    let mut lines = Vec::new();
    while let Some(line) = source.next_line().await.unwrap() {
      lines.push(line);
    }
    source.wait().await;

    lines.sort();
    assert_eq!(lines, vec!["10", "3", "oops"]);
  }

  #[tokio::test]
  async fn test_terminate_stops_a_running_process() {
    let sources = ProcessSources::new(shell("true"), shell("exec sleep 30"));
    let mut source = sources.open_servicing(1, 12).unwrap();
    source.terminate().await;
    assert_eq!(source.next_line().await.unwrap(), None);
  }

  #[tokio::test]
  async fn test_missing_program_fails_to_spawn() {
    let sources = ProcessSources::new(
      CommandSpec::new("definitely-not-a-real-program", Vec::<String>::new()),
      shell("true"),
    );
    assert!(matches!(
      sources.open_requests(0, 10),
      Err(SourceError::Spawn { .. })
    ));
  }

  #[tokio::test]
  async fn test_invalid_utf8_is_decoded_lossily() {
    let sources = ProcessSources::new(
      shell(r"printf 'a\377b\r\n\ntail'"),
      shell("true"),
    );
    let mut source = sources.open_requests(0, 10).unwrap();

    let mut lines = Vec::new();
    while let Some(line) = source.next_line().await.unwrap() {
      lines.push(line);
    }
    source.wait().await;

    assert_eq!(lines, vec!["a\u{FFFD}b", "", "tail"]);
  }

  #[tokio::test]
  async fn test_invalid_utf8_request_is_reported_and_skipped() {
    let airports = (0..10)
      .map(|id| Airport::new(id, Vec2::new(id as f32, 0.0)))
      .collect();
    let world = Arc::new(World::new(10, 10, airports, 10));
    let metrics = Arc::new(Metrics::new());
    let presenter = Presenter::new(256);
    let mut rx = presenter.subscribe();
    let sources = Arc::new(ProcessSources::new(
      shell(r"printf '\377\n3\n'"),
      shell("true"),
    ));

    let ingestor = RequestIngestor::new(
      0,
      world.station_count(),
      sources,
      Dispatcher::new(world.clone(), metrics.clone(), presenter.clone()),
      presenter.clone(),
    );
    let exit = ingestor.run(CancellationToken::new()).await;

    assert_eq!(exit, IngestorExit::Closed);
    assert_eq!(metrics.get(MetricKind::InFlight), 1);
    assert_eq!(
      drain_logs(&mut rx),
      vec![
        "Error: Invalid flight request '\u{FFFD}' from Airport 0.".to_owned(),
        "Flight request: Plane 0 to Airport 3.".to_owned(),
      ]
    );
  }

  #[tokio::test]
  async fn test_invalid_utf8_servicing_output_still_completes() {
    let metrics = Arc::new(Metrics::new());
    let presenter = Presenter::new(256);
    let mut rx = presenter.subscribe();
    let sources = Arc::new(ProcessSources::new(
      shell("true"),
      shell(r"printf 'refuel\n\377 caf\351\ndone\n'"),
    ));
    let coordinator =
      ServicingCoordinator::new(sources, metrics.clone(), presenter.clone());
    let plane = Plane::new(1, &Airport::new(2, Vec2::ZERO));
    plane.set_state(PlaneState::Servicing);

    let outcome = coordinator
      .service(2, &plane, &CancellationToken::new())
      .await;

    assert_eq!(outcome, ServicingOutcome::Completed);
    assert_eq!(metrics.get(MetricKind::Serviced), 1);
    assert_eq!(metrics.get(MetricKind::CompletedTrips), 1);
    assert_eq!(plane.state(), PlaneState::Idle);
    assert_eq!(
      drain_logs(&mut rx),
      vec![
        "refuel".to_owned(),
        "\u{FFFD} caf\u{FFFD}".to_owned(),
        "done".to_owned(),
        "Plane 1 has completed servicing at Airport 2.".to_owned(),
      ]
    );
  }
}
