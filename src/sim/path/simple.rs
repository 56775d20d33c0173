//! Closed-form trajectory: speed ramps linearly, heading turns at a constant rate

use glam::{Affine2, Vec2};
use serde::{Deserialize, Serialize};

use super::{BulletPath, Trajectory, trapezoid_step};
use crate::error::Result;
use crate::{angle_of, from_angle};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimplePath {
    /// Seconds before the bullet expires, 0 = never
    pub lifetime: f32,
    pub init_speed: f32,
    /// Initial heading (radians)
    pub init_rotation: f32,
    /// Speed change per second
    pub linear_acceleration: f32,
    pub max_speed: f32,
    pub min_speed: f32,
    /// Heading change per second (radians)
    pub curve_rate: f32,
}

impl Default for SimplePath {
    fn default() -> Self {
        Self {
            lifetime: 0.0,
            init_speed: 100.0,
            init_rotation: 0.0,
            linear_acceleration: 0.0,
            max_speed: 500.0,
            min_speed: -500.0,
            curve_rate: 0.0,
        }
    }
}

impl SimplePath {
    pub fn new(speed: f32, rotation: f32) -> Self {
        Self {
            init_speed: speed,
            init_rotation: rotation,
            ..Default::default()
        }
    }

    pub fn with_lifetime(mut self, lifetime: f32) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn with_acceleration(mut self, acceleration: f32) -> Self {
        self.linear_acceleration = acceleration;
        self
    }

    pub fn with_speed_limits(mut self, min_speed: f32, max_speed: f32) -> Self {
        self.min_speed = min_speed;
        self.max_speed = max_speed;
        self
    }

    pub fn with_curve_rate(mut self, curve_rate: f32) -> Self {
        self.curve_rate = curve_rate;
        self
    }

    #[inline]
    fn heading_at(&self, t: f32) -> f32 {
        self.init_rotation + self.curve_rate * t
    }

    /// Speed at `t`; min bound wins over max if they are inverted
    #[inline]
    fn speed_at(&self, t: f32) -> f32 {
        let speed = self.init_speed + self.linear_acceleration * t;
        if speed < self.min_speed {
            self.min_speed
        } else if speed > self.max_speed {
            self.max_speed
        } else {
            speed
        }
    }

    #[inline]
    fn velocity_at(&self, t: f32) -> Vec2 {
        from_angle(self.heading_at(t)) * self.speed_at(t)
    }
}

impl Trajectory for SimplePath {
    fn lifetime(&self) -> Result<f32> {
        Ok(self.lifetime)
    }

    fn step(&self, t: f32, dt: f32) -> Result<Vec2> {
        Ok(trapezoid_step(self.velocity_at(t), self.velocity_at(t + dt), dt))
    }

    fn direction(&self, t: f32) -> Result<Vec2> {
        Ok(from_angle(self.heading_at(t)))
    }

    fn velocity(&self, t: f32) -> Result<Vec2> {
        Ok(self.velocity_at(t))
    }

    fn rotation(&self, t: f32) -> Result<f32> {
        Ok(self.heading_at(t))
    }

    fn speed(&self, t: f32) -> Result<f32> {
        Ok(self.speed_at(t))
    }

    fn rotated(&self, angle: f32) -> Result<BulletPath> {
        Ok(BulletPath::Simple(Self {
            init_rotation: self.init_rotation + angle,
            ..self.clone()
        }))
    }

    fn transformed(&self, xform: Affine2) -> Result<BulletPath> {
        // Scale every speed term by how much the basis stretches the initial heading
        let new_dir = xform.transform_vector2(from_angle(self.init_rotation));
        let scale = new_dir.length();

        Ok(BulletPath::Simple(Self {
            lifetime: self.lifetime,
            init_speed: self.init_speed * scale,
            init_rotation: angle_of(new_dir),
            linear_acceleration: self.linear_acceleration * scale,
            max_speed: self.max_speed * scale,
            min_speed: self.min_speed * scale,
            curve_rate: self.curve_rate,
        }))
    }
}
