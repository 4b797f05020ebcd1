use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
  AirportId,
  entities::plane::Plane,
  error::SourceError,
  metrics::{MetricKind, Metrics},
  presentation::Presenter,
  source::{LineSource, SourceFactory},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServicingOutcome {
  Completed,
  /// The run stopped mid-episode. Counters were left as they were.
  Interrupted,
  /// The servicing source could not be opened or failed mid-read.
  Failed,
}

enum Read {
  Line(Result<Option<String>, SourceError>),
  Cancelled,
}

/// Runs turnaround episodes against an external servicing source.
#[derive(Debug)]
pub struct ServicingCoordinator<F> {
  sources: Arc<F>,
  metrics: Arc<Metrics>,
  presenter: Presenter,
}

impl<F> Clone for ServicingCoordinator<F> {
  fn clone(&self) -> Self {
    Self {
      sources: self.sources.clone(),
      metrics: self.metrics.clone(),
      presenter: self.presenter.clone(),
    }
  }
}

impl<F: SourceFactory> ServicingCoordinator<F> {
  pub fn new(
    sources: Arc<F>,
    metrics: Arc<Metrics>,
    presenter: Presenter,
  ) -> Self {
    Self {
      sources,
      metrics,
      presenter,
    }
  }

  fn increment(&self, kind: MetricKind) {
    let value = self.metrics.increment(kind);
    self.presenter.update_metric(kind, value);
  }

  fn decrement(&self, kind: MetricKind) {
    let value = self.metrics.decrement(kind);
    self.presenter.update_metric(kind, value);
  }

  /// Services `plane` at `station` until the source closes on its own or
  /// `cancel` fires.
  pub async fn service(
    &self,
    station: AirportId,
    plane: &Plane,
    cancel: &CancellationToken,
  ) -> ServicingOutcome {
    let mut source = match self.sources.open_servicing(station, plane.id) {
      Ok(source) => source,
      Err(e) => {
        tracing::error!(station, plane = plane.id, "{e}");
        self.presenter.log_line(format!(
          "Error starting servicing for Plane {} at Airport {station}.",
          plane.id
        ));
        plane.finish_servicing();
        return ServicingOutcome::Failed;
      }
    };

    self.increment(MetricKind::Servicing);

    loop {
      let read = tokio::select! {
        biased;

        _ = cancel.cancelled() => Read::Cancelled,
        line = source.next_line() => Read::Line(line),
      };

      match read {
        Read::Line(Ok(Some(line))) => self.presenter.log_line(line),
        Read::Line(Ok(None)) => break,
        Read::Line(Err(e)) => {
          tracing::warn!(station, plane = plane.id, "{e}");
          source.terminate().await;
          self.decrement(MetricKind::Servicing);
          plane.finish_servicing();
          self.presenter.log_line(format!(
            "Error reading servicing output for Plane {}.",
            plane.id
          ));
          return ServicingOutcome::Failed;
        }
        Read::Cancelled => {
          source.terminate().await;
          return self.interrupted(plane);
        }
      }
    }

    // Output is closed; the episode ends when the producer exits.
    let exited = tokio::select! {
      biased;

      _ = cancel.cancelled() => false,
      _ = source.wait() => true,
    };
    if !exited || cancel.is_cancelled() {
      source.terminate().await;
      return self.interrupted(plane);
    }

    self.decrement(MetricKind::Servicing);
    self.increment(MetricKind::Serviced);
    self.increment(MetricKind::CompletedTrips);
    plane.finish_servicing();
    self.presenter.log_line(format!(
      "Plane {} has completed servicing at Airport {station}.",
      plane.id
    ));

    ServicingOutcome::Completed
  }

  fn interrupted(&self, plane: &Plane) -> ServicingOutcome {
    tracing::debug!(plane = plane.id, "servicing abandoned");
    self
      .presenter
      .log_line(format!("Servicing interrupted for Plane {}.", plane.id));
    ServicingOutcome::Interrupted
  }
}
