use glam::Vec2;

pub fn normalize_angle(angle: f32) -> f32 {
  angle.rem_euclid(360.0)
}

/// Compass heading from `a` to `b`: 0 is +y, increasing clockwise.
pub fn angle_between_points(a: Vec2, b: Vec2) -> f32 {
  let dx = b.x - a.x;
  let dy = b.y - a.y;
  normalize_angle(dx.atan2(dy).to_degrees())
}

/// Keeps a position inside the cells of a `width` x `height` grid.
pub fn clamp_to_grid(pos: Vec2, width: u32, height: u32) -> Vec2 {
  let max = Vec2::new(
    width.saturating_sub(1) as f32,
    height.saturating_sub(1) as f32,
  );
  pos.clamp(Vec2::ZERO, max)
}

pub fn grid_contains(pos: Vec2, width: u32, height: u32) -> bool {
  pos.x >= 0.0
    && pos.y >= 0.0
    && pos.x <= width.saturating_sub(1) as f32
    && pos.y <= height.saturating_sub(1) as f32
}
