//! Bullet trajectories
//!
//! A path is an immutable function of time since it was assigned to a
//! bullet. Three models exist:
//! - [`SimplePath`]: closed-form speed/heading with linear acceleration and curvature
//! - [`BezierPath`]: follows a baked curve, by arc length or by curve parameter
//! - [`ForcePath`]: initial velocity plus a constant force, capped speed
//!
//! [`BulletPath`] is the closed set of these, shared between bullets via `Arc`.

pub mod bezier;
pub mod force;
pub mod simple;

pub use bezier::{BezierPath, SamplingMode};
pub use force::ForcePath;
pub use simple::SimplePath;

use glam::{Affine2, Vec2};

use crate::consts::CMP_EPSILON;
use crate::error::Result;

/// Sampling contract shared by every trajectory model.
///
/// `t` is seconds since the path was assigned. Only operations that need a
/// backing resource (a curve) can fail.
pub trait Trajectory {
    /// Self-imposed expiry in seconds, 0 = none
    fn lifetime(&self) -> Result<f32>;

    /// Displacement over `[t, t + dt]`
    fn step(&self, t: f32, dt: f32) -> Result<Vec2>;

    fn direction(&self, t: f32) -> Result<Vec2>;
    fn velocity(&self, t: f32) -> Result<Vec2>;
    fn rotation(&self, t: f32) -> Result<f32>;
    fn speed(&self, t: f32) -> Result<f32>;

    /// Copy with the initial heading rotated rigidly by `angle` radians
    fn rotated(&self, angle: f32) -> Result<BulletPath>;

    /// Copy with the initial motion mapped through `xform`
    fn transformed(&self, xform: Affine2) -> Result<BulletPath>;
}

/// Trapezoidal-rule displacement: mean of the endpoint velocities times `dt`
#[inline]
pub(crate) fn trapezoid_step(v_start: Vec2, v_end: Vec2, dt: f32) -> Vec2 {
    dt * (v_end + v_start) / 2.0
}

/// Direction from a tiny forward step, for models without an analytic tangent
#[inline]
pub(crate) fn forward_direction<T: Trajectory + ?Sized>(path: &T, t: f32) -> Result<Vec2> {
    Ok(path.step(t, CMP_EPSILON)?.normalize_or_zero())
}

/// A trajectory model
#[derive(Debug, Clone)]
pub enum BulletPath {
    Simple(SimplePath),
    Bezier(BezierPath),
    Force(ForcePath),
}

impl BulletPath {
    fn inner(&self) -> &dyn Trajectory {
        match self {
            BulletPath::Simple(p) => p,
            BulletPath::Bezier(p) => p,
            BulletPath::Force(p) => p,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            BulletPath::Simple(_) => "simple",
            BulletPath::Bezier(_) => "bezier",
            BulletPath::Force(_) => "force",
        }
    }
}

impl Trajectory for BulletPath {
    fn lifetime(&self) -> Result<f32> {
        self.inner().lifetime()
    }

    fn step(&self, t: f32, dt: f32) -> Result<Vec2> {
        self.inner().step(t, dt)
    }

    fn direction(&self, t: f32) -> Result<Vec2> {
        self.inner().direction(t)
    }

    fn velocity(&self, t: f32) -> Result<Vec2> {
        self.inner().velocity(t)
    }

    fn rotation(&self, t: f32) -> Result<f32> {
        self.inner().rotation(t)
    }

    fn speed(&self, t: f32) -> Result<f32> {
        self.inner().speed(t)
    }

    fn rotated(&self, angle: f32) -> Result<BulletPath> {
        self.inner().rotated(angle)
    }

    fn transformed(&self, xform: Affine2) -> Result<BulletPath> {
        self.inner().transformed(xform)
    }
}

impl From<SimplePath> for BulletPath {
    fn from(path: SimplePath) -> Self {
        BulletPath::Simple(path)
    }
}

impl From<BezierPath> for BulletPath {
    fn from(path: BezierPath) -> Self {
        BulletPath::Bezier(path)
    }
}

impl From<ForcePath> for BulletPath {
    fn from(path: ForcePath) -> Self {
        BulletPath::Force(path)
    }
}
