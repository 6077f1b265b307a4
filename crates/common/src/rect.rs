use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Axis-aligned 2D rectangle in sim-space meters.
///
/// Containment is half-open: `min` is inside, `max` is not.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect2 {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect2 {
    pub fn from_min_max(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    pub fn from_center_half_dim(center: Vec2, half_dim: Vec2) -> Self {
        Self {
            min: center - half_dim,
            max: center + half_dim,
        }
    }

    pub fn from_center_dim(center: Vec2, dim: Vec2) -> Self {
        Self::from_center_half_dim(center, 0.5 * dim)
    }

    /// Grow the rectangle by `radius` on every side.
    pub fn add_radius(&self, radius: Vec2) -> Self {
        Self {
            min: self.min - radius,
            max: self.max + radius,
        }
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.y >= self.min.y && p.x < self.max.x && p.y < self.max.y
    }

    pub fn center(&self) -> Vec2 {
        0.5 * (self.min + self.max)
    }

    pub fn dim(&self) -> Vec2 {
        self.max - self.min
    }
}
