//! Deterministic simulation module
//!
//! All projectile logic lives here. This module must be pure and deterministic:
//! - Time comes only from tick deltas (no wall clock)
//! - Stable iteration order (pool heap order)
//! - No rendering or physics-engine dependencies; both sit behind traits

pub mod bullet;
pub mod collision;
pub mod curve;
pub mod geometry;
pub mod path;
pub mod play_area;
pub mod pool;
pub mod relay;
pub mod server;

pub use bullet::{Bullet, BulletHandle, BulletState, BulletStyle, CollisionShape, CustomData};
pub use collision::{
    ColliderKind, CollisionStage, ShapeHit, ShapeQuery, ShapeQueryParams, StaticCollider,
    StaticColliders, shapes_overlap,
};
pub use curve::{Curve2D, CurvePoint};
pub use geometry::Rect;
pub use path::{BezierPath, BulletPath, ForcePath, SamplingMode, SimplePath, Trajectory};
pub use play_area::PlayArea;
pub use pool::{Admission, BulletInit, BulletPool};
pub use relay::{SpawnRelay, SpawnRequest};
pub use server::{
    BulletServer, PoppedBullet, ServerEvent, TickOutput, TickStats, VisualProxy, VolleyShot,
};
