use core::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::AirportId;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Airport {
  pub id: AirportId,
  pub pos: Vec2,
}

impl Airport {
  pub fn new(id: AirportId, pos: Vec2) -> Self {
    Self { id, pos }
  }
}

impl fmt::Display for Airport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Airport {}", self.id)
  }
}
