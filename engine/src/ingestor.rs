use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
  AirportId,
  dispatcher::Dispatcher,
  error::RequestError,
  presentation::Presenter,
  source::{LineSource, SourceFactory},
};

/// Parses one line of a request stream into a destination id.
///
/// Blank lines are not requests and yield `Ok(None)`.
pub fn parse_request(
  line: &str,
  station_count: u32,
) -> Result<Option<AirportId>, RequestError> {
  let line = line.trim();
  if line.is_empty() {
    return Ok(None);
  }

  let id: i64 = line
    .parse()
    .map_err(|_| RequestError::Malformed(line.to_owned()))?;
  if !(0..station_count as i64).contains(&id) {
    return Err(RequestError::OutOfRange { id, station_count });
  }

  Ok(Some(id as AirportId))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestorExit {
  /// The producer closed its stream.
  Closed,
  Cancelled,
  /// The stream could not be opened; the station takes no requests this run.
  OpenFailed,
  ReadFailed,
}

/// Feeds one station's flight requests into the [`Dispatcher`].
#[derive(Debug)]
pub struct RequestIngestor<F> {
  station: AirportId,
  station_count: u32,
  sources: Arc<F>,
  dispatcher: Dispatcher,
  presenter: Presenter,
}

impl<F: SourceFactory> RequestIngestor<F> {
  pub fn new(
    station: AirportId,
    station_count: u32,
    sources: Arc<F>,
    dispatcher: Dispatcher,
    presenter: Presenter,
  ) -> Self {
    Self {
      station,
      station_count,
      sources,
      dispatcher,
      presenter,
    }
  }

  pub async fn run(self, cancel: CancellationToken) -> IngestorExit {
    let station = self.station;
    let mut source =
      match self.sources.open_requests(station, self.station_count) {
        Ok(source) => source,
        Err(e) => {
          tracing::error!(station, "{e}");
          self.presenter.log_line(format!(
            "Error starting flight request process for Airport {station}."
          ));
          return IngestorExit::OpenFailed;
        }
      };

    let exit = loop {
      if cancel.is_cancelled() {
        break IngestorExit::Cancelled;
      }

      let read = tokio::select! {
        biased;

        _ = cancel.cancelled() => None,
        line = source.next_line() => Some(line),
      };
      let Some(read) = read else {
        break IngestorExit::Cancelled;
      };

      match read {
        Ok(Some(line)) => self.handle_line(&line),
        Ok(None) => break IngestorExit::Closed,
        Err(e) => {
          tracing::warn!(station, "{e}");
          self.presenter.log_line(format!(
            "Error reading flight requests from Airport {station}."
          ));
          break IngestorExit::ReadFailed;
        }
      }
    };

    source.terminate().await;
    tracing::debug!(station, ?exit, "ingestor stopped");
    exit
  }

  fn handle_line(&self, line: &str) {
    let station = self.station;
    match parse_request(line, self.station_count) {
      Ok(Some(destination)) => {
        self.dispatcher.dispatch(station, destination);
      }
      Ok(None) => {}
      Err(RequestError::OutOfRange { id, .. }) => {
        self.presenter.log_line(format!(
          "Error: Invalid destination airport {id} from Airport {station}."
        ));
      }
      Err(RequestError::Malformed(text)) => {
        self.presenter.log_line(format!(
          "Error: Invalid flight request '{text}' from Airport {station}."
        ));
      }
    }
  }
}
