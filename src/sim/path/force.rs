//! Force-integrated trajectory
//!
//! `v(t) = clamp_length(init_velocity + t * force, max_speed)`. Impulses and
//! extra forces never mutate a path: they produce a new one that picks up
//! the current velocity, meant to be reassigned to the bullet.

use glam::{Affine2, Vec2};
use serde::{Deserialize, Serialize};

use super::{BulletPath, Trajectory, forward_direction, trapezoid_step};
use crate::consts::LIFETIME_EPSILON;
use crate::error::Result;
use crate::{angle_of, from_angle, rotate_vec};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForcePath {
    /// Seconds before the bullet expires, 0 = never
    pub lifetime: f32,
    pub max_speed: f32,
    pub init_velocity: Vec2,
    /// Constant acceleration
    pub force: Vec2,
    /// Rotate/transform the force together with the initial velocity.
    /// Off = world-fixed forces (gravity), on = emitter-relative forces.
    pub rotate_forces_on_transform: bool,
}

impl Default for ForcePath {
    fn default() -> Self {
        Self {
            lifetime: 0.0,
            max_speed: 10000.0,
            init_velocity: Vec2::new(100.0, 0.0),
            force: Vec2::ZERO,
            rotate_forces_on_transform: false,
        }
    }
}

impl ForcePath {
    pub fn new(init_velocity: Vec2, force: Vec2) -> Self {
        Self {
            init_velocity,
            force,
            ..Default::default()
        }
    }

    pub fn from_speed_rotation(speed: f32, rotation: f32) -> Self {
        Self {
            init_velocity: from_angle(rotation) * speed,
            ..Default::default()
        }
    }

    pub fn with_force(mut self, force: Vec2) -> Self {
        self.force = force;
        self
    }

    pub fn with_lifetime(mut self, lifetime: f32) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn with_max_speed(mut self, max_speed: f32) -> Self {
        self.max_speed = max_speed;
        self
    }

    pub fn with_rotate_forces(mut self, rotate: bool) -> Self {
        self.rotate_forces_on_transform = rotate;
        self
    }

    pub fn init_speed(&self) -> f32 {
        self.init_velocity.length()
    }

    pub fn init_rotation(&self) -> f32 {
        angle_of(self.init_velocity)
    }

    #[inline]
    fn velocity_at(&self, t: f32) -> Vec2 {
        (self.init_velocity + t * self.force).clamp_length_max(self.max_speed.max(0.0))
    }

    /// Remaining lifetime after `t` seconds, never collapsing to "unbounded"
    fn fenced_lifetime(&self, t: f32) -> f32 {
        if self.lifetime == 0.0 {
            0.0
        } else {
            (self.lifetime - t).max(LIFETIME_EPSILON)
        }
    }

    /// New path continuing from `at_time` with `velocity_delta` added
    pub fn apply_impulse(&self, velocity_delta: Vec2, at_time: f32) -> ForcePath {
        Self {
            init_velocity: self.velocity_at(at_time) + velocity_delta,
            lifetime: self.fenced_lifetime(at_time),
            ..self.clone()
        }
    }

    /// New path continuing from `at_time` with `additional_force` summed in
    pub fn apply_force(&self, additional_force: Vec2, at_time: f32) -> ForcePath {
        Self {
            init_velocity: self.velocity_at(at_time),
            force: self.force + additional_force,
            lifetime: self.fenced_lifetime(at_time),
            ..self.clone()
        }
    }
}

impl Trajectory for ForcePath {
    fn lifetime(&self) -> Result<f32> {
        Ok(self.lifetime)
    }

    fn step(&self, t: f32, dt: f32) -> Result<Vec2> {
        Ok(trapezoid_step(self.velocity_at(t), self.velocity_at(t + dt), dt))
    }

    fn direction(&self, t: f32) -> Result<Vec2> {
        forward_direction(self, t)
    }

    fn velocity(&self, t: f32) -> Result<Vec2> {
        Ok(self.velocity_at(t))
    }

    fn rotation(&self, t: f32) -> Result<f32> {
        Ok(angle_of(self.velocity_at(t)))
    }

    fn speed(&self, t: f32) -> Result<f32> {
        Ok(self.velocity_at(t).length())
    }

    fn rotated(&self, angle: f32) -> Result<BulletPath> {
        let force = if self.rotate_forces_on_transform {
            rotate_vec(self.force, angle)
        } else {
            self.force
        };
        Ok(BulletPath::Force(Self {
            init_velocity: rotate_vec(self.init_velocity, angle),
            force,
            ..self.clone()
        }))
    }

    fn transformed(&self, xform: Affine2) -> Result<BulletPath> {
        let force = if self.rotate_forces_on_transform {
            xform.transform_vector2(self.force)
        } else {
            self.force
        };
        Ok(BulletPath::Force(Self {
            init_velocity: xform.transform_vector2(self.init_velocity),
            force,
            ..self.clone()
        }))
    }
}
