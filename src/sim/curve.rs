//! Baked cubic Bézier curve
//!
//! A curve is a chain of control points, each with an incoming and an
//! outgoing handle (relative to the point). It supports two kinds of
//! sampling:
//! - parametric: `sample(t)` with `t` in `[0, point_count - 1]`, where each
//!   unit of `t` spans one segment regardless of its length
//! - arc length: `sample_baked(offset)` with `offset` in `[0, baked_length]`
//!
//! The arc-length table is built once at construction; curves are immutable.

use glam::{Affine2, Vec2};

use crate::consts::CURVE_BAKE_INTERVAL;
use crate::error::{DanmakuError, Result};

/// Subdivision limits per segment when baking
const MIN_SEGMENT_SUBDIVISIONS: usize = 8;
const MAX_SEGMENT_SUBDIVISIONS: usize = 1024;

/// A curve control point
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CurvePoint {
    pub position: Vec2,
    /// Incoming handle, relative to `position`
    pub handle_in: Vec2,
    /// Outgoing handle, relative to `position`
    pub handle_out: Vec2,
}

impl CurvePoint {
    pub fn new(position: Vec2, handle_in: Vec2, handle_out: Vec2) -> Self {
        Self {
            position,
            handle_in,
            handle_out,
        }
    }

    /// Control point without handles (straight segments)
    pub fn corner(position: Vec2) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Curve2D {
    points: Vec<CurvePoint>,
    /// Polyline approximation of the whole curve
    baked: Vec<Vec2>,
    /// Cumulative arc length at each baked point (same length as `baked`)
    baked_distances: Vec<f32>,
}

impl Curve2D {
    /// Build and bake a curve. Needs at least two points.
    pub fn new(points: Vec<CurvePoint>) -> Result<Self> {
        if points.len() < 2 {
            return Err(DanmakuError::EmptyCurve(points.len()));
        }
        if points
            .iter()
            .any(|p| !(p.position.is_finite() && p.handle_in.is_finite() && p.handle_out.is_finite()))
        {
            return Err(DanmakuError::InvalidConfiguration(
                "curve control points must be finite".into(),
            ));
        }

        let mut curve = Self {
            points,
            baked: Vec::new(),
            baked_distances: Vec::new(),
        };
        curve.bake();
        Ok(curve)
    }

    /// Curve through the given points with straight segments
    pub fn polyline(points: &[Vec2]) -> Result<Self> {
        Self::new(points.iter().copied().map(CurvePoint::corner).collect())
    }

    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Total arc length of the baked curve
    pub fn baked_length(&self) -> f32 {
        self.baked_distances.last().copied().unwrap_or(0.0)
    }

    /// Parametric sample; `t` is clamped to `[0, point_count - 1]`
    pub fn sample(&self, t: f32) -> Vec2 {
        let last = (self.points.len() - 1) as f32;
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, last) };

        let mut index = t.floor() as usize;
        let mut frac = t - index as f32;
        if index >= self.points.len() - 1 {
            index = self.points.len() - 2;
            frac = 1.0;
        }

        self.sample_segment(index, frac)
    }

    /// Sample by distance travelled along the curve, clamped to its length
    pub fn sample_baked(&self, offset: f32) -> Vec2 {
        let length = self.baked_length();
        if length <= 0.0 || offset.is_nan() || offset <= 0.0 {
            return self.baked[0];
        }
        if offset >= length {
            return self.baked[self.baked.len() - 1];
        }

        // First baked point at or beyond the offset
        let upper = self.baked_distances.partition_point(|&d| d < offset);
        let lower = upper - 1;
        let span = self.baked_distances[upper] - self.baked_distances[lower];
        if span <= f32::EPSILON {
            return self.baked[upper];
        }
        let frac = (offset - self.baked_distances[lower]) / span;
        self.baked[lower].lerp(self.baked[upper], frac)
    }

    /// Parametric derivative at the end of the curve (per unit of `t`).
    ///
    /// Handle-less endpoints have a zero derivative; the tangent direction
    /// then falls back to the nearest distinct control point, scaled by the
    /// last segment's chord length.
    pub fn end_tangent(&self) -> Vec2 {
        let a = &self.points[self.points.len() - 2];
        let b = &self.points[self.points.len() - 1];
        let p0 = a.position;
        let p1 = a.position + a.handle_out;
        let p2 = b.position + b.handle_in;
        let p3 = b.position;

        let derivative = 3.0 * (p3 - p2);
        if derivative.length_squared() > 1e-12 {
            return derivative;
        }

        let chord = (p3 - p0).length();
        let dir = if (p3 - p1).length_squared() > 1e-12 {
            (p3 - p1).normalize()
        } else {
            (p3 - p0).normalize_or_zero()
        };
        dir * chord
    }

    /// Copy of the curve shifted so the first point sits on the origin,
    /// with `xform` applied to positions and its linear part to the handles
    pub fn reanchored(&self, xform: Affine2) -> Result<Self> {
        let origin = self.points[0].position;
        let points = self
            .points
            .iter()
            .map(|p| CurvePoint {
                position: xform.transform_point2(p.position - origin),
                handle_in: xform.transform_vector2(p.handle_in),
                handle_out: xform.transform_vector2(p.handle_out),
            })
            .collect();
        Self::new(points)
    }

    fn sample_segment(&self, index: usize, frac: f32) -> Vec2 {
        let a = &self.points[index];
        let b = &self.points[index + 1];
        cubic_bezier(
            a.position,
            a.position + a.handle_out,
            b.position + b.handle_in,
            b.position,
            frac,
        )
    }

    fn bake(&mut self) {
        self.baked.clear();
        self.baked_distances.clear();

        let first = self.points[0].position;
        self.baked.push(first);
        self.baked_distances.push(0.0);

        let mut distance = 0.0;
        let mut prev = first;
        for index in 0..self.points.len() - 1 {
            let a = &self.points[index];
            let b = &self.points[index + 1];
            // Control polygon length bounds the segment's arc length
            let hull = a.handle_out.length()
                + (b.position + b.handle_in - a.position - a.handle_out).length()
                + b.handle_in.length();
            let subdivisions = ((hull / CURVE_BAKE_INTERVAL).ceil() as usize)
                .clamp(MIN_SEGMENT_SUBDIVISIONS, MAX_SEGMENT_SUBDIVISIONS);

            for step in 1..=subdivisions {
                let p = self.sample_segment(index, step as f32 / subdivisions as f32);
                distance += (p - prev).length();
                self.baked.push(p);
                self.baked_distances.push(distance);
                prev = p;
            }
        }
    }
}

#[inline]
fn cubic_bezier(p0: Vec2, p1: Vec2, p2: Vec2, p3: Vec2, t: f32) -> Vec2 {
    let omt = 1.0 - t;
    let omt2 = omt * omt;
    let t2 = t * t;
    p0 * (omt2 * omt) + p1 * (3.0 * omt2 * t) + p2 * (3.0 * omt * t2) + p3 * (t2 * t)
}
