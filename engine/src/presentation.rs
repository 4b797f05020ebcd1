use async_broadcast::{InactiveReceiver, Receiver, Sender, TrySendError};
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::{PlaneId, metrics::MetricKind};

/// Updates posted by the simulation for whatever is presenting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type", content = "value")]
pub enum OutgoingUpdate {
  Log(String),
  Position {
    id: PlaneId,
    x: f32,
    y: f32,
    rotation: f32,
  },
  Metric {
    kind: MetricKind,
    value: u64,
  },
}

impl OutgoingUpdate {
  pub fn to_json(&self) -> Result<String, serde_json::Error> {
    serde_json::to_string(self)
  }
}

/// Commands a presentation layer sends back into the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncomingCommand {
  Start,
  Stop,
}

/// Post-and-forget handle onto the presentation channel.
///
/// Posting never blocks: when a subscriber falls behind, the oldest updates
/// are overwritten, and with no subscriber at all the update is dropped.
#[derive(Debug, Clone)]
pub struct Presenter {
  sender: Sender<OutgoingUpdate>,
  _keepalive: InactiveReceiver<OutgoingUpdate>,
}

impl Presenter {
  pub fn new(capacity: usize) -> Self {
    let (mut sender, receiver) = async_broadcast::broadcast(capacity.max(1));
    sender.set_overflow(true);

    Self {
      sender,
      _keepalive: receiver.deactivate(),
    }
  }

  pub fn subscribe(&self) -> Receiver<OutgoingUpdate> {
    self.sender.new_receiver()
  }

  pub fn log_line(&self, text: impl Into<String>) {
    let text = text.into();
    tracing::info!(target: "simulation", "{text}");
    self.post(OutgoingUpdate::Log(text));
  }

  pub fn update_plane_position(&self, id: PlaneId, pos: Vec2, rotation: f32) {
    self.post(OutgoingUpdate::Position {
      id,
      x: pos.x,
      y: pos.y,
      rotation,
    });
  }

  pub fn update_metric(&self, kind: MetricKind, value: u64) {
    self.post(OutgoingUpdate::Metric { kind, value });
  }

  fn post(&self, update: OutgoingUpdate) {
    match self.sender.try_broadcast(update) {
      Ok(_) | Err(TrySendError::Inactive(_)) => {}
      Err(e) => tracing::warn!("failed to post update: {e}"),
    }
  }
}
