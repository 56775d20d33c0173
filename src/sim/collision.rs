//! Collision detection against an external spatial service
//!
//! The simulation never tests overlaps itself. For each colliding bullet it
//! issues one bounded shape query through [`ShapeQuery`] and records the
//! hits. [`StaticColliders`] is a brute-force in-memory service for headless
//! runs and tests.

use std::collections::HashMap;

use glam::{Affine2, Vec2};
use serde::{Deserialize, Serialize};

use super::bullet::{Bullet, BulletHandle, BulletState, CollisionShape};

/// One shape-overlap query
#[derive(Debug, Clone, Copy)]
pub struct ShapeQueryParams<'a> {
    pub shape: &'a CollisionShape,
    pub transform: Affine2,
    pub collision_mask: u32,
    pub collide_with_bodies: bool,
    pub collide_with_areas: bool,
    /// Upper bound on reported hits
    pub max_results: usize,
}

/// One overlap reported by the spatial service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShapeHit {
    pub collider_id: u64,
    /// Shape index within the collider
    pub shape: u32,
}

/// Spatial query service.
///
/// Implementations append at most `params.max_results` hits to `out`.
pub trait ShapeQuery {
    fn intersect_shape(&mut self, params: &ShapeQueryParams<'_>, out: &mut Vec<ShapeHit>);
}

/// Per-tick collision bookkeeping
#[derive(Debug, Default)]
pub struct CollisionStage {
    pub max_results: usize,
    pub pop_on_collide: bool,
    scratch: Vec<ShapeHit>,
    results: HashMap<BulletHandle, Vec<ShapeHit>>,
}

impl CollisionStage {
    pub fn new(max_results: usize, pop_on_collide: bool) -> Self {
        Self {
            max_results,
            pop_on_collide,
            scratch: Vec::with_capacity(max_results),
            results: HashMap::new(),
        }
    }

    /// Query for one bullet. Returns whether anything was hit.
    pub fn check(&mut self, bullet: &mut Bullet, query: &mut dyn ShapeQuery) -> bool {
        if !bullet.can_collide() {
            return false;
        }
        let Some(style) = bullet.style() else {
            return false;
        };
        let Some(shape) = style.collision_shape.as_ref() else {
            return false;
        };

        let params = ShapeQueryParams {
            shape,
            transform: bullet.transform(),
            collision_mask: style.collision_mask,
            collide_with_bodies: style.detect_bodies,
            collide_with_areas: style.detect_areas,
            max_results: self.max_results,
        };

        self.scratch.clear();
        query.intersect_shape(&params, &mut self.scratch);
        self.scratch.truncate(self.max_results);
        if self.scratch.is_empty() {
            return false;
        }

        self.results.insert(bullet.handle(), self.scratch.clone());
        if self.pop_on_collide {
            bullet.state = BulletState::PoppedCollide;
        }
        true
    }

    /// Hits recorded since the last take
    pub fn take_results(&mut self) -> HashMap<BulletHandle, Vec<ShapeHit>> {
        std::mem::take(&mut self.results)
    }
}

/// Whether a collider is a solid body or a trigger area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColliderKind {
    Body,
    Area,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticCollider {
    pub id: u64,
    pub shape_index: u32,
    pub kind: ColliderKind,
    /// Layers this collider sits on, matched against the query mask
    pub layer: u32,
    pub shape: CollisionShape,
    /// Rigid placement (rotation + translation)
    pub transform: Affine2,
}

/// Brute-force collider set
#[derive(Debug, Clone, Default)]
pub struct StaticColliders {
    colliders: Vec<StaticCollider>,
}

impl StaticColliders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, collider: StaticCollider) {
        self.colliders.push(collider);
    }

    pub fn add_circle(&mut self, id: u64, kind: ColliderKind, layer: u32, center: Vec2, radius: f32) {
        self.add(StaticCollider {
            id,
            shape_index: 0,
            kind,
            layer,
            shape: CollisionShape::Circle { radius },
            transform: Affine2::from_translation(center),
        });
    }

    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }

    pub fn clear(&mut self) {
        self.colliders.clear();
    }
}

impl ShapeQuery for StaticColliders {
    fn intersect_shape(&mut self, params: &ShapeQueryParams<'_>, out: &mut Vec<ShapeHit>) {
        let mut found = 0;
        for collider in &self.colliders {
            if found >= params.max_results {
                break;
            }
            if collider.layer & params.collision_mask == 0 {
                continue;
            }
            let kind_ok = match collider.kind {
                ColliderKind::Body => params.collide_with_bodies,
                ColliderKind::Area => params.collide_with_areas,
            };
            if !kind_ok {
                continue;
            }
            if shapes_overlap(params.shape, params.transform, &collider.shape, collider.transform) {
                out.push(ShapeHit {
                    collider_id: collider.id,
                    shape: collider.shape_index,
                });
                found += 1;
            }
        }
    }
}

/// Overlap test for two placed shapes (edges touching counts)
pub fn shapes_overlap(a: &CollisionShape, a_xf: Affine2, b: &CollisionShape, b_xf: Affine2) -> bool {
    match (a, b) {
        (CollisionShape::Circle { radius: ra }, CollisionShape::Circle { radius: rb }) => {
            let reach = ra + rb;
            a_xf.translation.distance_squared(b_xf.translation) <= reach * reach
        }
        (CollisionShape::Circle { radius }, CollisionShape::Rect { half_extents }) => {
            circle_rect(a_xf.translation, *radius, *half_extents, b_xf)
        }
        (CollisionShape::Rect { half_extents }, CollisionShape::Circle { radius }) => {
            circle_rect(b_xf.translation, *radius, *half_extents, a_xf)
        }
        (CollisionShape::Rect { half_extents: ha }, CollisionShape::Rect { half_extents: hb }) => {
            rect_rect(*ha, a_xf, *hb, b_xf)
        }
    }
}

fn circle_rect(center: Vec2, radius: f32, half_extents: Vec2, rect_xf: Affine2) -> bool {
    let local = rect_xf.inverse().transform_point2(center);
    let closest = local.clamp(-half_extents, half_extents);
    (local - closest).length_squared() <= radius * radius
}

/// Separating-axis test for two oriented rects
fn rect_rect(ha: Vec2, a_xf: Affine2, hb: Vec2, b_xf: Affine2) -> bool {
    let axes_a = [a_xf.matrix2.x_axis.normalize_or_zero(), a_xf.matrix2.y_axis.normalize_or_zero()];
    let axes_b = [b_xf.matrix2.x_axis.normalize_or_zero(), b_xf.matrix2.y_axis.normalize_or_zero()];
    let offset = b_xf.translation - a_xf.translation;

    axes_a.iter().chain(axes_b.iter()).all(|&axis| {
        let ra = ha.x * axes_a[0].dot(axis).abs() + ha.y * axes_a[1].dot(axis).abs();
        let rb = hb.x * axes_b[0].dot(axis).abs() + hb.y * axes_b[1].dot(axis).abs();
        offset.dot(axis).abs() <= ra + rb
    })
}
