use glam::Vec2;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{AirportId, PlaneId};

use super::airport::Airport;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum PlaneState {
  #[default]
  Idle,
  InFlight,
  Servicing,
}

/// The mutable half of a plane. Only ever touched under that plane's own lock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaneStatus {
  pub pos: Vec2,
  pub rotation: f32,
  pub state: PlaneState,
  /// Station the plane last landed at.
  pub location: AirportId,
}

#[derive(Debug)]
pub struct Plane {
  pub id: PlaneId,
  pub home: AirportId,

  status: Mutex<PlaneStatus>,

  assignments_tx: async_channel::Sender<AirportId>,
  assignments_rx: async_channel::Receiver<AirportId>,
}

impl Plane {
  pub fn new(id: PlaneId, home: &Airport) -> Self {
    let (assignments_tx, assignments_rx) = async_channel::unbounded();

    Self {
      id,
      home: home.id,
      status: Mutex::new(PlaneStatus {
        pos: home.pos,
        rotation: 0.0,
        state: PlaneState::Idle,
        location: home.id,
      }),
      assignments_tx,
      assignments_rx,
    }
  }

  pub fn status(&self) -> PlaneStatus {
    *self.status.lock()
  }

  pub fn state(&self) -> PlaneState {
    self.status.lock().state
  }

  pub fn pos(&self) -> Vec2 {
    self.status.lock().pos
  }

  /// Destinations queued but not yet taken by the plane's agent.
  pub fn pending(&self) -> usize {
    self.assignments_rx.len()
  }

  /// Claims the plane for `destination` if it is idle with nothing queued.
  ///
  /// The idle check, the state change and the enqueue all happen under the
  /// plane's lock, so two concurrent callers can never both win the same
  /// plane.
  pub fn try_claim(&self, destination: AirportId) -> bool {
    let mut status = self.status.lock();
    if status.state != PlaneState::Idle || !self.assignments_rx.is_empty() {
      return false;
    }

    match self.assignments_tx.try_send(destination) {
      Ok(()) => {
        status.state = PlaneState::InFlight;
        true
      }
      Err(e) => {
        tracing::warn!(plane = self.id, "unable to queue assignment: {e}");
        false
      }
    }
  }

  /// Waits for the next queued destination. Returns `None` only if the queue
  /// has been closed.
  pub async fn next_assignment(&self) -> Option<AirportId> {
    self.assignments_rx.recv().await.ok()
  }

  pub fn set_position(&self, pos: Vec2, rotation: f32) {
    let mut status = self.status.lock();
    status.pos = pos;
    status.rotation = rotation;
  }

  pub fn set_state(&self, state: PlaneState) {
    self.status.lock().state = state;
  }

  /// Puts the plane down exactly on `airport` and moves it to `state`.
  pub fn land(&self, airport: &Airport, state: PlaneState) -> PlaneStatus {
    let mut status = self.status.lock();
    status.pos = airport.pos;
    status.state = state;
    status.location = airport.id;
    *status
  }

  /// Ends a turnaround. Leaves the plane alone if it has already moved on to
  /// another state.
  pub fn finish_servicing(&self) {
    let mut status = self.status.lock();
    if status.state == PlaneState::Servicing {
      status.state = PlaneState::Idle;
    }
  }

  /// Drops every queued destination and returns the plane to idle.
  pub fn reset(&self) -> usize {
    let mut status = self.status.lock();
    let mut drained = 0;
    while self.assignments_rx.try_recv().is_ok() {
      drained += 1;
    }
    status.state = PlaneState::Idle;
    drained
  }
}
