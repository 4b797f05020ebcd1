//! Constant-speed, straight-line flight between stations.
//!
//! All flights advance off one shared [`MotionClock`]: a single timer task
//! bumps a counter every step interval and every in-flight plane takes one
//! step per bump. A flight needs no timer or task of its own, and locks
//! nothing but its own plane.

use std::time::Duration;

use glam::Vec2;
use tokio::{
  sync::watch,
  time::{MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;

use crate::{
  config::SimConfig,
  entities::{airport::Airport, plane::Plane},
  geometry::{angle_between_points, clamp_to_grid},
  presentation::Presenter,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
  /// Within the snap threshold: the plane is placed on the destination.
  Arrived(Vec2),
  Moved { pos: Vec2, heading: f32 },
}

/// One step from `current` towards `destination`.
///
/// Steps never overshoot: when less than `step_length` remains the plane
/// lands on the destination and the following step snaps.
pub fn next_step(
  current: Vec2,
  destination: Vec2,
  step_length: f32,
  snap_threshold: f32,
) -> Step {
  let remaining = destination - current;
  let distance = remaining.length();
  if distance < snap_threshold {
    return Step::Arrived(destination);
  }

  let advance = step_length.min(distance);
  Step::Moved {
    pos: current + remaining / distance * advance,
    heading: angle_between_points(current, destination),
  }
}

/// Shared step timer for every flight.
#[derive(Debug, Clone)]
pub struct MotionClock {
  ticks: watch::Receiver<u64>,
}

/// Drives a [`MotionClock`]. Run it on its own task.
#[derive(Debug)]
pub struct MotionClockDriver {
  period: Duration,
  ticks: watch::Sender<u64>,
}

impl MotionClock {
  pub fn new(period: Duration) -> (Self, MotionClockDriver) {
    let (sender, receiver) = watch::channel(0);
    (
      Self { ticks: receiver },
      MotionClockDriver {
        period,
        ticks: sender,
      },
    )
  }

  /// A fresh view of the clock that only observes ticks from now on.
  fn subscribe(&self) -> watch::Receiver<u64> {
    let mut ticks = self.ticks.clone();
    ticks.borrow_and_update();
    ticks
  }
}

impl MotionClockDriver {
  pub async fn run(self, cancel: CancellationToken) {
    let mut interval = interval(self.period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
      tokio::select! {
        biased;

        _ = cancel.cancelled() => break,
        _ = interval.tick() => {
          self.ticks.send_modify(|tick| *tick = tick.wrapping_add(1));
        }
      }
    }

    tracing::debug!("motion clock stopped");
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightOutcome {
  Arrived { steps: u32 },
  Cancelled,
}

#[derive(Debug, Clone)]
pub struct MotionSimulator {
  step_length: f32,
  snap_threshold: f32,
  width: u32,
  height: u32,

  clock: MotionClock,
  presenter: Presenter,
}

impl MotionSimulator {
  pub fn new(
    config: &SimConfig,
    clock: MotionClock,
    presenter: Presenter,
  ) -> Self {
    Self {
      step_length: config.step_length(),
      snap_threshold: config.snap_threshold,
      width: config.grid_width,
      height: config.grid_height,

      clock,
      presenter,
    }
  }

  /// Flies `plane` to `destination`, one step per clock tick.
  ///
  /// Cancellation stops the plane where it is, at its last interpolated
  /// position.
  pub async fn fly(
    &self,
    plane: &Plane,
    destination: &Airport,
    cancel: &CancellationToken,
  ) -> FlightOutcome {
    let mut ticks = self.clock.subscribe();
    let mut steps = 0;

    loop {
      if cancel.is_cancelled() {
        return FlightOutcome::Cancelled;
      }

      let status = plane.status();
      match next_step(
        status.pos,
        destination.pos,
        self.step_length,
        self.snap_threshold,
      ) {
        Step::Arrived(pos) => {
          plane.set_position(pos, status.rotation);
          self
            .presenter
            .update_plane_position(plane.id, pos, status.rotation);
          return FlightOutcome::Arrived { steps };
        }
        Step::Moved { pos, heading } => {
          let pos = clamp_to_grid(pos, self.width, self.height);
          plane.set_position(pos, heading);
          self.presenter.update_plane_position(plane.id, pos, heading);
          steps += 1;
        }
      }

      tokio::select! {
        biased;

        _ = cancel.cancelled() => return FlightOutcome::Cancelled,
        changed = ticks.changed() => {
          if changed.is_err() {
            // The clock only stops when the run does.
            return FlightOutcome::Cancelled;
          }
        }
      }
    }
  }
}
