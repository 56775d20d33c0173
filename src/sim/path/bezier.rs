//! Curve-following trajectory
//!
//! Positions come from a shared baked [`Curve2D`]. In constant-speed mode
//! the bullet covers `speed` units of arc length per second; in
//! variable-speed mode `speed` scales the curve parameter, so the bullet
//! slows down and speeds up with the curve's own parameterisation.

use std::sync::Arc;

use glam::{Affine2, Vec2};
use serde::{Deserialize, Serialize};

use super::{BulletPath, Trajectory, forward_direction};
use crate::angle_of;
use crate::consts::CMP_EPSILON;
use crate::error::{DanmakuError, Result};
use crate::sim::curve::Curve2D;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SamplingMode {
    /// Position at `t` is the curve point at arc length `speed * t`
    ConstantSpeed,
    /// Position at `t` is the curve point at parameter `speed * t`
    #[default]
    VariableSpeed,
}

#[derive(Debug, Clone)]
pub struct BezierPath {
    pub curve: Option<Arc<Curve2D>>,
    pub mode: SamplingMode,
    pub speed: f32,
    /// Keep flying along the final tangent once the curve is exhausted
    pub continue_on_complete: bool,
}

impl Default for BezierPath {
    fn default() -> Self {
        Self {
            curve: None,
            mode: SamplingMode::VariableSpeed,
            speed: 1.0,
            continue_on_complete: true,
        }
    }
}

impl BezierPath {
    pub fn new(curve: Arc<Curve2D>, mode: SamplingMode, speed: f32) -> Self {
        Self {
            curve: Some(curve),
            mode,
            speed,
            ..Default::default()
        }
    }

    pub fn with_continue_on_complete(mut self, continue_on_complete: bool) -> Self {
        self.continue_on_complete = continue_on_complete;
        self
    }

    fn curve(&self) -> Result<&Curve2D> {
        self.curve.as_deref().ok_or(DanmakuError::MissingCurve)
    }

    /// Time to traverse the whole curve at the configured speed
    fn traversal_time(&self, curve: &Curve2D) -> f32 {
        match self.mode {
            SamplingMode::ConstantSpeed => curve.baked_length() / self.speed,
            SamplingMode::VariableSpeed => (curve.point_count() - 1) as f32 / self.speed,
        }
    }

    fn with_curve(&self, curve: Curve2D) -> BulletPath {
        BulletPath::Bezier(Self {
            curve: Some(Arc::new(curve)),
            ..self.clone()
        })
    }
}

impl Trajectory for BezierPath {
    fn lifetime(&self) -> Result<f32> {
        if self.continue_on_complete || self.speed == 0.0 {
            return Ok(0.0);
        }
        Ok(self.traversal_time(self.curve()?))
    }

    fn step(&self, t: f32, dt: f32) -> Result<Vec2> {
        let curve = self.curve()?;
        let past_end =
            self.continue_on_complete && self.speed != 0.0 && t + dt > self.traversal_time(curve);

        match self.mode {
            SamplingMode::ConstantSpeed => {
                if past_end {
                    // Frozen heading, configured speed
                    return Ok(dt * self.speed * curve.end_tangent().normalize_or_zero());
                }
                Ok(curve.sample_baked(self.speed * (t + dt)) - curve.sample_baked(self.speed * t))
            }
            SamplingMode::VariableSpeed => {
                if past_end {
                    // Frozen parametric velocity at the last sample
                    return Ok(dt * self.speed * curve.end_tangent());
                }
                Ok(curve.sample(self.speed * (t + dt)) - curve.sample(self.speed * t))
            }
        }
    }

    fn direction(&self, t: f32) -> Result<Vec2> {
        forward_direction(self, t)
    }

    fn velocity(&self, t: f32) -> Result<Vec2> {
        Ok(self.step(t, CMP_EPSILON)? / CMP_EPSILON)
    }

    fn rotation(&self, t: f32) -> Result<f32> {
        Ok(angle_of(self.step(t, CMP_EPSILON)?))
    }

    fn speed(&self, t: f32) -> Result<f32> {
        match self.mode {
            SamplingMode::ConstantSpeed => Ok(self.speed),
            SamplingMode::VariableSpeed => Ok(self.velocity(t)?.length()),
        }
    }

    fn rotated(&self, angle: f32) -> Result<BulletPath> {
        let curve = self.curve()?.reanchored(Affine2::from_angle(angle))?;
        Ok(self.with_curve(curve))
    }

    fn transformed(&self, xform: Affine2) -> Result<BulletPath> {
        let curve = self.curve()?.reanchored(xform)?;
        Ok(self.with_curve(curve))
    }
}
