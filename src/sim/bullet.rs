//! Bullet slot records and their shared descriptors

use std::sync::Arc;

use glam::{Affine2, Vec2};
use serde::{Deserialize, Serialize};

use super::path::{BulletPath, Trajectory};
use crate::error::{DanmakuError, Result};

/// Caller-supplied payload copied into a bullet at spawn and handed back on pop
pub type CustomData = serde_json::Map<String, serde_json::Value>;

/// Lifecycle state. Anything other than `Live` means "remove this tick".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BulletState {
    #[default]
    Uninitialized,
    Live,
    PoppedOutOfBounds,
    PoppedLifetimeServer,
    PoppedLifetimeBullet,
    PoppedCollide,
    PoppedRequested,
}

impl BulletState {
    pub fn is_popped(&self) -> bool {
        *self != BulletState::Live
    }
}

/// Generation-checked reference to a pooled bullet.
///
/// `key` names the slot record (stable across heap swaps); `generation`
/// changes every time that record is reused, so stale handles resolve to
/// nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BulletHandle {
    pub key: u32,
    pub generation: u32,
}

/// Collision shape in the bullet's local space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CollisionShape {
    Circle { radius: f32 },
    Rect { half_extents: Vec2 },
}

/// Shared appearance + collision descriptor.
///
/// Render fields are carried for the visual proxy only; the simulation reads
/// the collision fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulletStyle {
    pub sprite: Option<String>,
    /// RGBA
    pub modulate: [f32; 4],
    pub light_mask: u32,
    pub material: Option<String>,
    pub collision_shape: Option<CollisionShape>,
    pub collision_mask: u32,
    pub detect_bodies: bool,
    pub detect_areas: bool,
    /// Rotate the bullet to face its heading
    pub face_direction: bool,
    /// Local rotation (radians)
    pub rotation: f32,
    pub scale: Vec2,
}

impl Default for BulletStyle {
    fn default() -> Self {
        Self {
            sprite: None,
            modulate: [1.0, 1.0, 1.0, 1.0],
            light_mask: 1,
            material: None,
            collision_shape: None,
            collision_mask: 1,
            detect_bodies: true,
            detect_areas: true,
            face_direction: false,
            rotation: 0.0,
            scale: Vec2::ONE,
        }
    }
}

impl BulletStyle {
    pub fn with_collision(shape: CollisionShape, mask: u32) -> Self {
        Self {
            collision_shape: Some(shape),
            collision_mask: mask,
            ..Default::default()
        }
    }

    /// Sprite-local transform (scale then rotation)
    pub fn local_transform(&self) -> Affine2 {
        Affine2::from_scale_angle_translation(self.scale, self.rotation, Vec2::ZERO)
    }
}

/// One pool slot
#[derive(Debug, Clone, Default)]
pub struct Bullet {
    pub(crate) key: u32,
    pub(crate) generation: u32,
    pub(crate) state: BulletState,
    pub(crate) spawn_time_ms: u64,
    pub(crate) path_time_ms: u64,
    pub(crate) position: Vec2,
    /// Transform heading: set at spawn, refreshed per tick with `face_direction`
    pub(crate) facing: f32,
    pub(crate) path: Option<Arc<BulletPath>>,
    pub(crate) style: Option<Arc<BulletStyle>>,
    pub(crate) custom_data: CustomData,
}

impl Bullet {
    pub(crate) fn vacant(key: u32) -> Self {
        Self {
            key,
            ..Default::default()
        }
    }

    pub fn handle(&self) -> BulletHandle {
        BulletHandle {
            key: self.key,
            generation: self.generation,
        }
    }

    pub fn state(&self) -> BulletState {
        self.state
    }

    pub fn is_popped(&self) -> bool {
        self.state.is_popped()
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn path(&self) -> Option<&Arc<BulletPath>> {
        self.path.as_ref()
    }

    pub fn style(&self) -> Option<&Arc<BulletStyle>> {
        self.style.as_ref()
    }

    pub fn custom_data(&self) -> &CustomData {
        &self.custom_data
    }

    pub fn spawn_time_ms(&self) -> u64 {
        self.spawn_time_ms
    }

    /// Seconds since spawn
    pub fn age(&self, now_ms: u64) -> f32 {
        now_ms.saturating_sub(self.spawn_time_ms) as f32 / 1000.0
    }

    /// Seconds since the current path was assigned
    pub fn path_time(&self, now_ms: u64) -> f32 {
        now_ms.saturating_sub(self.path_time_ms) as f32 / 1000.0
    }

    /// World transform: position and facing angle. Facing is `rotation(0)`
    /// from spawn, refreshed each tick only when the style faces direction.
    pub fn transform(&self) -> Affine2 {
        Affine2::from_angle_translation(self.facing, self.position)
    }

    /// Live, with a collision shape and a non-zero mask
    pub fn can_collide(&self) -> bool {
        !self.is_popped()
            && self
                .style
                .as_ref()
                .is_some_and(|s| s.collision_shape.is_some() && s.collision_mask != 0)
    }

    fn trajectory(&self) -> Result<&BulletPath> {
        self.path.as_deref().ok_or_else(|| {
            DanmakuError::InvalidConfiguration(format!("bullet {} has no path", self.key))
        })
    }

    pub fn direction(&self, now_ms: u64) -> Result<Vec2> {
        self.trajectory()?.direction(self.path_time(now_ms))
    }

    pub fn velocity(&self, now_ms: u64) -> Result<Vec2> {
        self.trajectory()?.velocity(self.path_time(now_ms))
    }

    pub fn rotation(&self, now_ms: u64) -> Result<f32> {
        self.trajectory()?.rotation(self.path_time(now_ms))
    }

    pub fn speed(&self, now_ms: u64) -> Result<f32> {
        self.trajectory()?.speed(self.path_time(now_ms))
    }
}
