use std::time::Duration;

pub mod agent;
pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod entities;
pub mod error;
pub mod geometry;
pub mod ingestor;
pub mod metrics;
pub mod motion;
pub mod pool;
pub mod presentation;
pub mod servicing;
pub mod source;

pub use geometry::*;

pub type AirportId = u32;
pub type PlaneId = u32;

pub const DEFAULT_GRID_WIDTH: u32 = 10;
pub const DEFAULT_GRID_HEIGHT: u32 = 10;
pub const DEFAULT_STATION_COUNT: u32 = 10;
pub const DEFAULT_PLANES_PER_STATION: u32 = 10;

/// Grid units per second.
pub const DEFAULT_SPEED: f32 = 10.0;
pub const DEFAULT_STEP_INTERVAL: Duration = Duration::from_millis(25);
pub const ARRIVAL_SNAP_THRESHOLD: f32 = 0.5;

pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);
pub const DEFAULT_LANDING_COOLDOWN: Duration = Duration::from_millis(500);

/// Capacity of the presentation update channel. Oldest updates are dropped
/// once a slow consumer falls this far behind.
pub const DEFAULT_UPDATE_CAPACITY: usize = 4096;

pub const UP: f32 = 0.0;
pub const DOWN: f32 = 180.0;
pub const LEFT: f32 = 270.0;
pub const RIGHT: f32 = 90.0;

#[cfg(test)]
mod tests {
  use glam::Vec2;

  use crate::{
    DOWN, LEFT, RIGHT, UP,
    geometry::{angle_between_points, clamp_to_grid, normalize_angle},
  };

  mod normalize_angle {
    use super::*;

    #[test]
    fn test_normalize_angle_zero() {
      assert_eq!(normalize_angle(0.0), 0.0)
    }

    #[test]
    fn test_normalize_angle_negative() {
      assert_eq!(normalize_angle(-90.0), 270.0)
    }

    #[test]
    fn test_normalize_angle_wraps() {
      assert_eq!(normalize_angle(450.0), 90.0)
    }
  }

  mod angle_between_points {
    use super::*;

    fn assert_compass(a: Vec2) {
      // Zero
      let b = Vec2::new(a.x, a.y);
      assert_eq!(angle_between_points(a, b), UP);

      let b = Vec2::new(a.x, a.y + 1.0);
      assert_eq!(angle_between_points(a, b), UP);

      let b = Vec2::new(a.x, a.y - 1.0);
      assert_eq!(angle_between_points(a, b), DOWN);

      let b = Vec2::new(a.x + 1.0, a.y);
      assert_eq!(angle_between_points(a, b), RIGHT);

      let b = Vec2::new(a.x - 1.0, a.y);
      assert_eq!(angle_between_points(a, b), LEFT);
    }

    #[test]
    fn test_angle_between_points_origin() {
      assert_compass(Vec2::ZERO);
    }

    #[test]
    fn test_angle_between_points_grid_corner() {
      assert_compass(Vec2::new(9.0, 9.0));
    }

    #[test]
    fn test_angle_between_points_diagonal() {
      let angle = angle_between_points(Vec2::ZERO, Vec2::new(5.0, 5.0));
      assert!((angle - 45.0).abs() < 1e-4);
    }
  }

  mod clamp_to_grid {
    use super::*;

    #[test]
    fn test_clamp_inside_is_identity() {
      let pos = Vec2::new(3.5, 7.25);
      assert_eq!(clamp_to_grid(pos, 10, 10), pos);
    }

    #[test]
    fn test_clamp_outside() {
      assert_eq!(
        clamp_to_grid(Vec2::new(-1.0, 12.0), 10, 10),
        Vec2::new(0.0, 9.0)
      );
    }
  }
}
