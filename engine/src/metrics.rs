use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum MetricKind {
  InFlight,
  Servicing,
  Serviced,
  CompletedTrips,
}

impl MetricKind {
  pub const ALL: [MetricKind; 4] = [
    MetricKind::InFlight,
    MetricKind::Servicing,
    MetricKind::Serviced,
    MetricKind::CompletedTrips,
  ];

  pub fn label(&self) -> &'static str {
    match self {
      MetricKind::InFlight => "Planes In-Flight",
      MetricKind::Servicing => "Planes Undergoing Servicing",
      MetricKind::Serviced => "Planes Finished Servicing",
      MetricKind::CompletedTrips => "Total Completed Plane Trips",
    }
  }
}

impl fmt::Display for MetricKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
pub struct MetricsSnapshot {
  pub in_flight: u64,
  pub servicing: u64,
  pub serviced: u64,
  pub completed_trips: u64,
}

impl MetricsSnapshot {
  pub fn get(&self, kind: MetricKind) -> u64 {
    match kind {
      MetricKind::InFlight => self.in_flight,
      MetricKind::Servicing => self.servicing,
      MetricKind::Serviced => self.serviced,
      MetricKind::CompletedTrips => self.completed_trips,
    }
  }

  pub fn set(&mut self, kind: MetricKind, value: u64) {
    match kind {
      MetricKind::InFlight => self.in_flight = value,
      MetricKind::Servicing => self.servicing = value,
      MetricKind::Serviced => self.serviced = value,
      MetricKind::CompletedTrips => self.completed_trips = value,
    }
  }
}

/// Four independent counters. Each one is updated atomically on its own;
/// there is no lock across the set.
#[derive(Debug, Default)]
pub struct Metrics {
  in_flight: AtomicU64,
  servicing: AtomicU64,
  serviced: AtomicU64,
  completed_trips: AtomicU64,
}

impl Metrics {
  pub fn new() -> Self {
    Self::default()
  }

  fn counter(&self, kind: MetricKind) -> &AtomicU64 {
    match kind {
      MetricKind::InFlight => &self.in_flight,
      MetricKind::Servicing => &self.servicing,
      MetricKind::Serviced => &self.serviced,
      MetricKind::CompletedTrips => &self.completed_trips,
    }
  }

  pub fn get(&self, kind: MetricKind) -> u64 {
    self.counter(kind).load(Ordering::Acquire)
  }

  /// Returns the new value.
  pub fn increment(&self, kind: MetricKind) -> u64 {
    self.counter(kind).fetch_add(1, Ordering::AcqRel) + 1
  }

  /// Returns the new value. Never goes below zero.
  pub fn decrement(&self, kind: MetricKind) -> u64 {
    match self.counter(kind).fetch_update(
      Ordering::AcqRel,
      Ordering::Acquire,
      |value| value.checked_sub(1),
    ) {
      Ok(previous) => previous - 1,
      Err(_) => {
        tracing::warn!("{kind} counter would go negative, leaving at zero");
        0
      }
    }
  }

  pub fn reset(&self, kind: MetricKind) {
    self.counter(kind).store(0, Ordering::Release);
  }

  pub fn snapshot(&self) -> MetricsSnapshot {
    let mut snapshot = MetricsSnapshot::default();
    for kind in MetricKind::ALL {
      snapshot.set(kind, self.get(kind));
    }
    snapshot
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;

  #[test]
  fn test_increment_and_decrement() {
    let metrics = Metrics::new();
    assert_eq!(metrics.increment(MetricKind::InFlight), 1);
    assert_eq!(metrics.increment(MetricKind::InFlight), 2);
    assert_eq!(metrics.decrement(MetricKind::InFlight), 1);
    assert_eq!(metrics.get(MetricKind::InFlight), 1);
    assert_eq!(metrics.get(MetricKind::Servicing), 0);
  }

  #[test]
  fn test_decrement_saturates_at_zero() {
    let metrics = Metrics::new();
    assert_eq!(metrics.decrement(MetricKind::Servicing), 0);
    assert_eq!(metrics.get(MetricKind::Servicing), 0);
  }

  #[test]
  fn test_snapshot_reads_every_counter() {
    let metrics = Metrics::new();
    metrics.increment(MetricKind::Serviced);
    metrics.increment(MetricKind::CompletedTrips);
    metrics.increment(MetricKind::CompletedTrips);

    assert_eq!(
      metrics.snapshot(),
      MetricsSnapshot {
        in_flight: 0,
        servicing: 0,
        serviced: 1,
        completed_trips: 2,
      }
    );
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn test_concurrent_updates_are_not_lost() {
    let metrics = Arc::new(Metrics::new());
    let mut handles = Vec::new();
    for _ in 0..8 {
      let metrics = metrics.clone();
      handles.push(tokio::spawn(async move {
        for _ in 0..1000 {
          metrics.increment(MetricKind::CompletedTrips);
        }
      }));
    }
    for handle in handles {
      handle.await.unwrap();
    }

    assert_eq!(metrics.get(MetricKind::CompletedTrips), 8000);
  }
}
