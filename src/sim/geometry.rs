//! Axis-aligned rectangle and Cohen–Sutherland outcodes
//!
//! Y grows downward (screen space): "up" means a smaller y.

use glam::Vec2;
use serde::{Deserialize, Serialize};

pub const OUTCODE_UP: u8 = 1;
pub const OUTCODE_DOWN: u8 = 2;
pub const OUTCODE_LEFT: u8 = 4;
pub const OUTCODE_RIGHT: u8 = 8;

/// Rectangle given by its top-left corner and size
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub position: Vec2,
    pub size: Vec2,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            position: Vec2::new(x, y),
            size: Vec2::new(width, height),
        }
    }

    #[inline]
    pub fn end(&self) -> Vec2 {
        self.position + self.size
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        self.position + self.size / 2.0
    }

    /// Length of the diagonal
    #[inline]
    pub fn diagonal(&self) -> f32 {
        self.size.length()
    }

    /// Point containment, edges included
    pub fn has_point(&self, p: Vec2) -> bool {
        let end = self.end();
        p.x >= self.position.x && p.y >= self.position.y && p.x <= end.x && p.y <= end.y
    }

    /// Expand every side by `amount` (negative shrinks)
    pub fn grow(&self, amount: f32) -> Self {
        Self {
            position: self.position - Vec2::splat(amount),
            size: self.size + Vec2::splat(amount * 2.0),
        }
    }

    /// True if the rect has positive, finite extent
    pub fn is_valid(&self) -> bool {
        self.position.is_finite() && self.size.is_finite() && self.size.x > 0.0 && self.size.y > 0.0
    }

    /// 4-bit region code of `p` relative to this rect (0 = inside)
    pub fn outcode(&self, p: Vec2) -> u8 {
        let end = self.end();
        let mut code = 0;

        if p.y < self.position.y {
            code |= OUTCODE_UP;
        } else if p.y > end.y {
            code |= OUTCODE_DOWN;
        }

        if p.x < self.position.x {
            code |= OUTCODE_LEFT;
        } else if p.x > end.x {
            code |= OUTCODE_RIGHT;
        }

        code
    }
}
