//! Danmaku - pooled projectile simulation for bullet-hell games
//!
//! Core modules:
//! - `sim`: Deterministic simulation (bullet pool, trajectories, play area, tick)
//! - `settings`: Server configuration (JSON)
//! - `error`: Error taxonomy for configuration and path sampling

pub mod error;
pub mod settings;
pub mod sim;

pub use error::{DanmakuError, Result};
pub use settings::{PlayAreaMode, ServerConfig};

use glam::Vec2;

/// Simulation constants
pub mod consts {
    use glam::Vec2;

    /// Default fixed timestep for the headless runner (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;

    /// Default number of preallocated bullet slots
    pub const DEFAULT_POOL_SIZE: usize = 1500;
    /// Default cap on shape-query results per bullet
    pub const DEFAULT_MAX_COLLISIONS: usize = 32;

    /// Lifetimes at or below this (seconds) mean "no limit"
    pub const LIFETIME_EPSILON: f32 = 0.001;
    /// Forward-difference step used to derive direction/velocity from a step
    pub const CMP_EPSILON: f32 = 0.00001;

    /// Viewport assumed until the host reports one (pixels)
    pub const DEFAULT_VIEWPORT_SIZE: Vec2 = Vec2::new(1280.0, 720.0);

    /// Distance between baked curve points (pixels)
    pub const CURVE_BAKE_INTERVAL: f32 = 5.0;
}

/// Unit vector for an angle (radians)
#[inline]
pub fn from_angle(angle: f32) -> Vec2 {
    Vec2::new(angle.cos(), angle.sin())
}

/// Angle of a vector (radians, atan2 convention)
#[inline]
pub fn angle_of(v: Vec2) -> f32 {
    v.y.atan2(v.x)
}

/// Rotate a vector by an angle (radians)
#[inline]
pub fn rotate_vec(v: Vec2, angle: f32) -> Vec2 {
    from_angle(angle).rotate(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_rotate_vec_quarter_turn() {
        let v = rotate_vec(Vec2::new(1.0, 0.0), FRAC_PI_2);
        assert!(v.x.abs() < 1e-6);
        assert!((v.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_angle_of_roundtrip() {
        let angle = 0.75;
        assert!((angle_of(from_angle(angle)) - angle).abs() < 1e-6);
    }
}
