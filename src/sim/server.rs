//! Bullet server: spawn API, per-tick simulation, outbound events
//!
//! A tick runs in two passes over the live prefix of the pool. The decision
//! pass advances bullets and flags the ones that must go, without moving
//! anything; the compaction pass then finalizes and retires every flagged
//! bullet. Time is the server's own clock, advanced by each tick's `dt`, so
//! runs are reproducible.

use std::collections::HashMap;
use std::sync::Arc;

use glam::{Affine2, Vec2};

use super::bullet::{Bullet, BulletHandle, BulletState, BulletStyle, CustomData};
use super::collision::{CollisionStage, ShapeHit, ShapeQuery};
use super::geometry::Rect;
use super::path::{BulletPath, Trajectory};
use super::play_area::PlayArea;
use super::pool::{BulletInit, BulletPool};
use super::relay::{SpawnInbox, SpawnRelay, SpawnRequest};
use crate::consts::{DEFAULT_VIEWPORT_SIZE, LIFETIME_EPSILON};
use crate::error::{DanmakuError, Result};
use crate::settings::ServerConfig;

/// One shot of a volley: spawned at `origin + offset`
#[derive(Debug, Clone)]
pub struct VolleyShot {
    pub offset: Vec2,
    pub path: Arc<BulletPath>,
}

/// Snapshot of a bullet taken when it was removed
#[derive(Debug, Clone)]
pub struct PoppedBullet {
    pub handle: BulletHandle,
    /// Seconds since spawn
    pub age: f32,
    /// Why it was removed
    pub state: BulletState,
    pub position: Vec2,
    pub path: Option<Arc<BulletPath>>,
    pub style: Option<Arc<BulletStyle>>,
    pub custom_data: CustomData,
}

#[derive(Debug, Clone)]
pub enum ServerEvent {
    CollisionsDetected(HashMap<BulletHandle, Vec<ShapeHit>>),
    BulletsPopped(Vec<PoppedBullet>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    pub advanced: usize,
    pub popped: usize,
    pub collided: usize,
    /// Bullets overwritten by admissions since the previous tick
    pub evicted: usize,
}

/// Result of one tick. Events are only present when non-empty, collisions first.
#[derive(Debug, Clone, Default)]
pub struct TickOutput {
    pub events: Vec<ServerEvent>,
    pub stats: TickStats,
}

/// Write-only mirror of bullets into a renderer
pub trait VisualProxy {
    fn show(&mut self, handle: BulletHandle, style: Option<&BulletStyle>);
    fn hide(&mut self, handle: BulletHandle);
    fn set_transform(&mut self, handle: BulletHandle, transform: Affine2);
}

pub struct BulletServer {
    config: ServerConfig,
    pool: BulletPool,
    play_area: PlayArea,
    viewport: Rect,
    collisions: CollisionStage,
    inbox: SpawnInbox,
    visuals: Option<Box<dyn VisualProxy>>,
    /// Simulated clock (seconds)
    clock: f64,
    running: bool,
    evicted: usize,
    /// Flagged bullets overwritten by admissions, reported with the next tick
    evicted_pops: Vec<PoppedBullet>,
}

impl BulletServer {
    pub fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        log::info!(
            "Bullet server: pool {} slots, play area {}",
            config.pool_size,
            config.play_area_mode.as_str()
        );

        let viewport = Rect {
            position: Vec2::ZERO,
            size: DEFAULT_VIEWPORT_SIZE,
        };
        let mut play_area = PlayArea::from_config(&config);
        play_area.update_viewport(viewport);

        Ok(Self {
            pool: BulletPool::new(config.pool_size),
            collisions: CollisionStage::new(config.max_collisions_per_bullet, config.pop_on_collide),
            play_area,
            viewport,
            config,
            inbox: SpawnInbox::new(),
            visuals: None,
            clock: 0.0,
            running: false,
            evicted: 0,
            evicted_pops: Vec::new(),
        })
    }

    /// Validate and apply a new configuration. On error nothing changes.
    pub fn apply_config(&mut self, config: ServerConfig) -> Result<()> {
        config.validate()?;
        let resize = config.pool_size != self.pool.capacity();
        if resize && self.running {
            return Err(DanmakuError::PoolLocked);
        }

        if resize {
            self.rebuild_pool(config.pool_size);
        }
        self.play_area = PlayArea::from_config(&config);
        self.play_area.update_viewport(self.viewport);
        self.collisions.max_results = config.max_collisions_per_bullet;
        self.collisions.pop_on_collide = config.pop_on_collide;
        self.config = config;
        log::info!("Bullet server reconfigured");
        Ok(())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Begin ticking. The pool cannot be resized until [`Self::stop`].
    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Rebuild the pool with a new capacity, dropping every live bullet
    pub fn set_pool_size(&mut self, size: usize) -> Result<()> {
        if self.running {
            return Err(DanmakuError::PoolLocked);
        }
        let config = ServerConfig {
            pool_size: size,
            ..self.config.clone()
        };
        config.validate()?;
        self.rebuild_pool(size);
        self.config = config;
        Ok(())
    }

    fn rebuild_pool(&mut self, size: usize) {
        if let Some(visuals) = self.visuals.as_mut() {
            for bullet in self.pool.live() {
                visuals.hide(bullet.handle());
            }
        }
        self.pool = BulletPool::new(size);
        self.evicted_pops.clear();
        log::info!("Bullet pool rebuilt with {size} slots");
    }

    /// Visible rect used in viewport mode
    pub fn set_viewport(&mut self, viewport: Rect) {
        self.viewport = viewport;
        self.play_area.update_viewport(viewport);
    }

    pub fn play_area(&self) -> &PlayArea {
        &self.play_area
    }

    pub fn set_visual_proxy(&mut self, visuals: Box<dyn VisualProxy>) {
        self.visuals = Some(visuals);
    }

    /// Current simulated time in milliseconds
    pub fn now_ms(&self) -> u64 {
        (self.clock * 1000.0).round() as u64
    }

    /// New producer handle for queued spawns
    pub fn relay(&self) -> SpawnRelay {
        self.inbox.relay()
    }

    pub fn pool(&self) -> &BulletPool {
        &self.pool
    }

    // === Spawning ===

    /// Spawn one bullet at `origin`.
    ///
    /// `Ok(None)` when the play area rejects the origin and initial heading.
    /// A full pool evicts its oldest bullet.
    pub fn spawn(
        &mut self,
        origin: Vec2,
        path: Arc<BulletPath>,
        style: Option<Arc<BulletStyle>>,
        custom_data: CustomData,
    ) -> Result<Option<BulletHandle>> {
        let direction = path.direction(0.0)?;
        if !self.play_area.trajectory_entering(origin, direction) {
            log::trace!("Spawn at {origin} declined by play area");
            return Ok(None);
        }
        let facing = path.rotation(0.0)?;

        let now_ms = self.now_ms();
        // A flagged root still owes its pop record
        if self.pool.is_full() {
            if let Some(root) = self.pool.live_mut().first_mut().filter(|b| b.is_popped()) {
                self.evicted_pops.push(pop_record(root, now_ms));
            }
        }

        let init = BulletInit {
            position: origin,
            facing,
            path,
            style,
            custom_data,
        };
        let Some(admission) = self.pool.admit(now_ms, init) else {
            return Ok(None);
        };

        if let Some(evicted) = admission.evicted {
            log::trace!("Pool full; evicted bullet {}", evicted.key);
            self.evicted += 1;
            if let Some(visuals) = self.visuals.as_mut() {
                visuals.hide(evicted);
            }
        }
        if let Some(visuals) = self.visuals.as_mut() {
            let style = self.pool.get(admission.handle).and_then(|b| b.style().cloned());
            visuals.show(admission.handle, style.as_deref());
        }

        Ok(Some(admission.handle))
    }

    /// Spawn one bullet per shot. Shots whose path cannot be sampled are
    /// skipped with a warning; declined shots are skipped silently.
    pub fn spawn_volley(
        &mut self,
        origin: Vec2,
        shots: &[VolleyShot],
        style: Option<Arc<BulletStyle>>,
        custom_data: &CustomData,
    ) -> Vec<BulletHandle> {
        let mut handles = Vec::with_capacity(shots.len());
        for shot in shots {
            match self.spawn(
                origin + shot.offset,
                shot.path.clone(),
                style.clone(),
                custom_data.clone(),
            ) {
                Ok(Some(handle)) => handles.push(handle),
                Ok(None) => {}
                Err(e) => log::warn!("Volley shot skipped: {e}"),
            }
        }
        handles
    }

    fn drain_relay(&mut self) {
        while let Some(request) = self.inbox.try_next() {
            match request {
                SpawnRequest::Bullet {
                    origin,
                    path,
                    style,
                    custom_data,
                } => {
                    if let Err(e) = self.spawn(origin, path, style, custom_data) {
                        log::warn!("Relayed spawn failed: {e}");
                    }
                }
                SpawnRequest::Volley {
                    origin,
                    shots,
                    style,
                    custom_data,
                } => {
                    self.spawn_volley(origin, &shots, style, &custom_data);
                }
            }
        }
    }

    // === Requests on live bullets ===

    /// Flag every live bullet for removal on the next tick
    pub fn clear(&mut self) {
        for bullet in self.pool.live_mut() {
            if bullet.state == BulletState::Live {
                bullet.state = BulletState::PoppedRequested;
            }
        }
    }

    /// Request removal. Returns false if the handle is stale or the bullet
    /// is already flagged.
    pub fn pop(&mut self, handle: BulletHandle) -> bool {
        match self.pool.get_mut(handle) {
            Some(bullet) if bullet.state == BulletState::Live => {
                bullet.state = BulletState::PoppedRequested;
                true
            }
            _ => false,
        }
    }

    /// Give a live bullet a new path. Its path time restarts; its age does not.
    pub fn set_bullet_path(&mut self, handle: BulletHandle, path: Arc<BulletPath>) -> bool {
        let now_ms = self.now_ms();
        match self.pool.get_mut(handle) {
            Some(bullet) => {
                bullet.path = Some(path);
                bullet.path_time_ms = now_ms;
                true
            }
            None => false,
        }
    }

    // === Queries ===

    pub fn live_bullet_count(&self) -> usize {
        self.pool.live_count()
    }

    pub fn live_bullet_positions(&self) -> Vec<Vec2> {
        self.pool.live().iter().map(|b| b.position()).collect()
    }

    pub fn live_bullets(&self) -> Vec<BulletHandle> {
        self.pool.live().iter().map(|b| b.handle()).collect()
    }

    pub fn bullet(&self, handle: BulletHandle) -> Option<&Bullet> {
        self.pool.get(handle)
    }

    // === Tick ===

    /// Advance the simulation by `dt` seconds. Does nothing until started.
    pub fn tick(&mut self, dt: f32, space: &mut dyn ShapeQuery) -> TickOutput {
        if !self.running {
            log::trace!("Tick skipped: server not running");
            return TickOutput::default();
        }
        if !dt.is_finite() || dt < 0.0 {
            log::warn!("Tick skipped: invalid dt {dt}");
            return TickOutput::default();
        }

        self.drain_relay();
        self.play_area.update_viewport(self.viewport);

        let now_ms = self.now_ms();
        let mut stats = TickStats {
            evicted: std::mem::take(&mut self.evicted),
            ..Default::default()
        };

        // Decision pass
        let max_lifetime = self.config.max_lifetime;
        for bullet in self.pool.live_mut() {
            match decide(bullet, now_ms, dt, max_lifetime, &self.play_area) {
                Decision::Finalize => {}
                Decision::Advanced { in_bounds } => {
                    stats.advanced += 1;
                    if in_bounds && self.collisions.check(bullet, space) {
                        stats.collided += 1;
                    }
                }
            }
        }

        // Compaction pass
        let mut popped = std::mem::take(&mut self.evicted_pops);
        let visuals = &mut self.visuals;
        self.pool.compact(|bullet| {
            if let Some(visuals) = visuals.as_mut() {
                visuals.hide(bullet.handle());
            }
            popped.push(pop_record(bullet, now_ms));
        });
        stats.popped = popped.len();

        self.clock += f64::from(dt);

        let mut events = Vec::new();
        let collisions = self.collisions.take_results();
        if !collisions.is_empty() {
            events.push(ServerEvent::CollisionsDetected(collisions));
        }
        if !popped.is_empty() {
            events.push(ServerEvent::BulletsPopped(popped));
        }

        if stats != TickStats::default() {
            log::debug!(
                "Tick at {}ms: {} live, {} advanced, {} popped, {} collided, {} evicted",
                now_ms,
                self.pool.live_count(),
                stats.advanced,
                stats.popped,
                stats.collided,
                stats.evicted
            );
        }

        TickOutput { events, stats }
    }

    /// Push every live bullet's world transform to the visual proxy
    pub fn sync_visuals(&mut self) {
        let Some(visuals) = self.visuals.as_mut() else {
            return;
        };
        for bullet in self.pool.live() {
            let local = bullet
                .style()
                .map(|s| s.local_transform())
                .unwrap_or(Affine2::IDENTITY);
            visuals.set_transform(bullet.handle(), bullet.transform() * local);
        }
    }
}

/// Move a flagged bullet's payload into its pop record
fn pop_record(bullet: &mut Bullet, now_ms: u64) -> PoppedBullet {
    PoppedBullet {
        handle: bullet.handle(),
        age: bullet.age(now_ms),
        state: bullet.state,
        position: bullet.position,
        path: bullet.path.take(),
        style: bullet.style.take(),
        custom_data: std::mem::take(&mut bullet.custom_data),
    }
}

enum Decision {
    /// Flagged (now or earlier); compaction will finalize it
    Finalize,
    Advanced { in_bounds: bool },
}

/// Apply the removal rules in precedence order, advancing the bullet if it
/// survives them
fn decide(bullet: &mut Bullet, now_ms: u64, dt: f32, max_lifetime: f32, area: &PlayArea) -> Decision {
    if bullet.is_popped() {
        return Decision::Finalize;
    }
    if max_lifetime >= LIFETIME_EPSILON && bullet.age(now_ms) > max_lifetime {
        bullet.state = BulletState::PoppedLifetimeServer;
        return Decision::Finalize;
    }

    match evaluate(bullet, now_ms, dt, area) {
        Ok(decision) => decision,
        Err(e) => {
            log::warn!("Bullet {} path cannot be sampled, popping: {e}", bullet.key);
            bullet.state = BulletState::PoppedOutOfBounds;
            Decision::Finalize
        }
    }
}

fn evaluate(bullet: &mut Bullet, now_ms: u64, dt: f32, area: &PlayArea) -> Result<Decision> {
    let Some(path) = bullet.path.clone() else {
        return Err(DanmakuError::InvalidConfiguration(
            "live bullet without a path".into(),
        ));
    };
    let t = bullet.path_time(now_ms);

    let lifetime = path.lifetime()?;
    if lifetime >= LIFETIME_EPSILON && t > lifetime {
        bullet.state = BulletState::PoppedLifetimeBullet;
        return Ok(Decision::Finalize);
    }

    let in_bounds = area.contains(bullet.position);
    if !in_bounds && !area.trajectory_entering(bullet.position, path.direction(t)?) {
        bullet.state = BulletState::PoppedOutOfBounds;
        return Ok(Decision::Finalize);
    }

    bullet.position += path.step(t, dt)?;
    if bullet.style.as_ref().is_some_and(|s| s.face_direction) {
        bullet.facing = path.rotation(t + dt)?;
    }
    Ok(Decision::Advanced { in_bounds })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;
    use crate::settings::PlayAreaMode;
    use crate::sim::bullet::CollisionShape;
    use crate::sim::collision::{ColliderKind, StaticColliders};
    use crate::sim::curve::Curve2D;
    use crate::sim::path::{BezierPath, SamplingMode, SimplePath};
    use std::sync::Mutex;

    fn infinite_server(pool_size: usize) -> BulletServer {
        let mut server = BulletServer::new(ServerConfig {
            pool_size,
            play_area_mode: PlayAreaMode::Infinite,
            ..Default::default()
        })
        .unwrap();
        server.start();
        server
    }

    fn manual_server(allow_incoming: bool) -> BulletServer {
        let mut server = BulletServer::new(ServerConfig {
            play_area_mode: PlayAreaMode::Manual,
            play_area_rect: Rect::new(0.0, 0.0, 100.0, 100.0),
            play_area_allow_incoming: allow_incoming,
            ..Default::default()
        })
        .unwrap();
        server.start();
        server
    }

    fn heading(speed: f32, rotation: f32) -> Arc<BulletPath> {
        Arc::new(SimplePath::new(speed, rotation).into())
    }

    fn spawn_at(server: &mut BulletServer, origin: Vec2) -> BulletHandle {
        server
            .spawn(origin, heading(10.0, 0.0), None, CustomData::new())
            .unwrap()
            .unwrap()
    }

    fn popped(output: &TickOutput) -> Vec<PoppedBullet> {
        output
            .events
            .iter()
            .find_map(|e| match e {
                ServerEvent::BulletsPopped(list) => Some(list.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    fn tick(server: &mut BulletServer, dt: f32) -> TickOutput {
        server.tick(dt, &mut StaticColliders::new())
    }

    #[test]
    fn test_full_pool_evicts_oldest() {
        let mut server = infinite_server(2);
        let a = spawn_at(&mut server, Vec2::ZERO);
        tick(&mut server, 0.010);
        let b = spawn_at(&mut server, Vec2::ZERO);
        tick(&mut server, 0.010);
        assert_eq!(server.now_ms(), 20);
        let c = spawn_at(&mut server, Vec2::ZERO);

        assert!(server.bullet(a).is_none());
        let mut live = server.live_bullets();
        live.sort();
        let mut expected = vec![b, c];
        expected.sort();
        assert_eq!(live, expected);

        // Eviction is silent but counted
        let output = tick(&mut server, 0.010);
        assert!(popped(&output).is_empty());
        assert_eq!(output.stats.evicted, 1);
        assert!(server.pool().check_heap());
    }

    #[test]
    fn test_evicting_flagged_bullets_keeps_their_pop_records() {
        let mut server = infinite_server(2);
        let a = spawn_at(&mut server, Vec2::ZERO);
        tick(&mut server, 0.010);
        let b = spawn_at(&mut server, Vec2::ZERO);
        tick(&mut server, 0.010);
        server.clear();

        // Queued spawns land before compaction and overwrite both flagged bullets
        let relay = server.relay();
        assert!(relay.spawn_bullet(Vec2::ZERO, heading(10.0, 0.0), None, CustomData::new()));
        assert!(relay.spawn_bullet(Vec2::ZERO, heading(10.0, 0.0), None, CustomData::new()));
        let output = tick(&mut server, SIM_DT);

        let mut handles: Vec<_> = popped(&output).iter().map(|p| p.handle).collect();
        handles.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(handles, expected);
        assert!(popped(&output).iter().all(|p| p.state == BulletState::PoppedRequested));
        assert_eq!(output.stats.popped, 2);
        assert_eq!(output.stats.evicted, 2);
        assert_eq!(server.live_bullet_count(), 2);
        assert!(server.pool().check_heap());

        // Reported once only
        assert!(popped(&tick(&mut server, SIM_DT)).is_empty());
    }

    #[test]
    fn test_invalid_dt_leaves_clock_alone() {
        let mut server = infinite_server(4);
        let handle = spawn_at(&mut server, Vec2::ZERO);
        for dt in [f32::NAN, f32::INFINITY, -0.5] {
            let output = tick(&mut server, dt);
            assert_eq!(output.stats, TickStats::default());
            assert_eq!(server.now_ms(), 0);
        }
        assert_eq!(server.bullet(handle).unwrap().position(), Vec2::ZERO);

        tick(&mut server, 0.5);
        assert_eq!(server.now_ms(), 500);
    }

    #[test]
    fn test_facing_refreshed_only_with_face_direction() {
        let mut server = infinite_server(4);
        let turning: Arc<BulletPath> = Arc::new(SimplePath::new(10.0, 0.5).with_curve_rate(1.0).into());
        let fixed = server
            .spawn(Vec2::ZERO, turning.clone(), None, CustomData::new())
            .unwrap()
            .unwrap();
        let style = Arc::new(BulletStyle {
            face_direction: true,
            ..Default::default()
        });
        let facing = server
            .spawn(Vec2::ZERO, turning, Some(style), CustomData::new())
            .unwrap()
            .unwrap();
        for _ in 0..10 {
            tick(&mut server, 0.1);
        }

        let expected = Affine2::from_angle(0.5).matrix2;
        let fixed = server.bullet(fixed).unwrap().transform();
        assert!(fixed.matrix2.abs_diff_eq(expected, 1e-5));
        let facing = server.bullet(facing).unwrap().transform();
        assert!(!facing.matrix2.abs_diff_eq(expected, 1e-2));
        assert!(facing.matrix2.abs_diff_eq(Affine2::from_angle(1.5).matrix2, 1e-3));
    }

    #[test]
    fn test_spawn_declined_outside_without_incoming() {
        let mut server = manual_server(false);
        let result = server
            .spawn(Vec2::new(150.0, 50.0), heading(10.0, std::f32::consts::PI), None, CustomData::new())
            .unwrap();
        assert!(result.is_none());
        assert_eq!(server.live_bullet_count(), 0);
    }

    #[test]
    fn test_incoming_spawn_survives_first_tick() {
        let mut server = manual_server(true);
        let handle = server
            .spawn(Vec2::new(150.0, 50.0), heading(60.0, std::f32::consts::PI), None, CustomData::new())
            .unwrap()
            .expect("incoming bullet accepted");

        let output = tick(&mut server, SIM_DT);
        assert!(popped(&output).is_empty());
        let bullet = server.bullet(handle).unwrap();
        assert!(bullet.position().x < 150.0);
        assert_eq!(output.stats.advanced, 1);
    }

    #[test]
    fn test_outgoing_bullet_popped_out_of_bounds() {
        let mut server = manual_server(true);
        let handle = spawn_at(&mut server, Vec2::new(99.0, 50.0));
        // Heads +x at 10 px/s; leaves the rect within a few ticks
        let mut record = None;
        for _ in 0..60 {
            let list = popped(&tick(&mut server, 0.1));
            if let Some(p) = list.into_iter().find(|p| p.handle == handle) {
                record = Some(p);
                break;
            }
        }
        let record = record.expect("bullet left the area");
        assert_eq!(record.state, BulletState::PoppedOutOfBounds);
        assert!(record.position.x > 100.0);
    }

    #[test]
    fn test_pop_is_idempotent() {
        let mut server = infinite_server(8);
        let handle = spawn_at(&mut server, Vec2::ZERO);
        assert!(server.pop(handle));
        assert!(!server.pop(handle));

        let list = popped(&tick(&mut server, SIM_DT));
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].state, BulletState::PoppedRequested);
        assert!(server.bullet(handle).is_none());
        assert!(!server.pop(handle));
    }

    #[test]
    fn test_clear_pops_everything_next_tick() {
        let mut server = infinite_server(8);
        for i in 0..5 {
            spawn_at(&mut server, Vec2::new(i as f32, 0.0));
        }
        server.clear();
        assert_eq!(server.live_bullet_count(), 5);

        let list = popped(&tick(&mut server, SIM_DT));
        assert_eq!(list.len(), 5);
        assert!(list.iter().all(|p| p.state == BulletState::PoppedRequested));
        assert_eq!(server.live_bullet_count(), 0);
    }

    #[test]
    fn test_pop_record_carries_payload() {
        let mut server = infinite_server(8);
        let mut data = CustomData::new();
        data.insert("damage".into(), serde_json::json!(3));
        let style = Arc::new(BulletStyle::default());
        let handle = server
            .spawn(Vec2::new(5.0, 5.0), heading(0.0, 0.0), Some(style.clone()), data)
            .unwrap()
            .unwrap();
        server.pop(handle);

        let list = popped(&tick(&mut server, SIM_DT));
        assert_eq!(list[0].custom_data["damage"], serde_json::json!(3));
        assert!(Arc::ptr_eq(list[0].style.as_ref().unwrap(), &style));
        assert_eq!(list[0].position, Vec2::new(5.0, 5.0));
    }

    #[test]
    fn test_collision_pops_same_tick() {
        let mut server = infinite_server(8);
        let mut world = StaticColliders::new();
        world.add_circle(42, ColliderKind::Area, 1, Vec2::new(0.0, 0.0), 5.0);
        let style = Arc::new(BulletStyle::with_collision(CollisionShape::Circle { radius: 1.0 }, 1));

        let hit = server
            .spawn(Vec2::ZERO, heading(10.0, 0.0), Some(style.clone()), CustomData::new())
            .unwrap()
            .unwrap();
        let miss = server
            .spawn(Vec2::new(500.0, 0.0), heading(10.0, 0.0), Some(style), CustomData::new())
            .unwrap()
            .unwrap();

        let output = server.tick(SIM_DT, &mut world);
        assert_eq!(output.events.len(), 2);
        let ServerEvent::CollisionsDetected(map) = &output.events[0] else {
            panic!("collisions come first");
        };
        assert_eq!(map[&hit], vec![ShapeHit { collider_id: 42, shape: 0 }]);
        assert!(!map.contains_key(&miss));

        let list = popped(&output);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].handle, hit);
        assert_eq!(list[0].state, BulletState::PoppedCollide);
        assert!(server.bullet(miss).is_some());
        assert_eq!(output.stats.collided, 1);
    }

    #[test]
    fn test_collision_without_pop_keeps_bullet() {
        let mut server = BulletServer::new(ServerConfig {
            play_area_mode: PlayAreaMode::Infinite,
            pop_on_collide: false,
            ..Default::default()
        })
        .unwrap();
        server.start();
        let mut world = StaticColliders::new();
        world.add_circle(1, ColliderKind::Body, 1, Vec2::ZERO, 5.0);
        let style = Arc::new(BulletStyle::with_collision(CollisionShape::Circle { radius: 1.0 }, 1));
        let handle = server
            .spawn(Vec2::ZERO, heading(1.0, 0.0), Some(style), CustomData::new())
            .unwrap()
            .unwrap();

        let output = server.tick(SIM_DT, &mut world);
        assert_eq!(output.events.len(), 1);
        assert!(matches!(output.events[0], ServerEvent::CollisionsDetected(_)));
        assert!(server.bullet(handle).is_some());
    }

    #[test]
    fn test_incoming_bullets_skip_collision() {
        let mut server = manual_server(true);
        let mut world = StaticColliders::new();
        world.add_circle(1, ColliderKind::Body, 1, Vec2::new(150.0, 50.0), 50.0);
        let style = Arc::new(BulletStyle::with_collision(CollisionShape::Circle { radius: 1.0 }, 1));
        server
            .spawn(Vec2::new(150.0, 50.0), heading(10.0, std::f32::consts::PI), Some(style), CustomData::new())
            .unwrap()
            .unwrap();

        let output = server.tick(SIM_DT, &mut world);
        assert!(output.events.is_empty());
        assert_eq!(server.live_bullet_count(), 1);
    }

    #[test]
    fn test_server_lifetime() {
        let mut server = BulletServer::new(ServerConfig {
            play_area_mode: PlayAreaMode::Infinite,
            max_lifetime: 0.05,
            ..Default::default()
        })
        .unwrap();
        server.start();
        spawn_at(&mut server, Vec2::ZERO);

        let mut record = None;
        for _ in 0..20 {
            if let Some(p) = popped(&tick(&mut server, SIM_DT)).pop() {
                record = Some(p);
                break;
            }
        }
        let record = record.expect("expired");
        assert_eq!(record.state, BulletState::PoppedLifetimeServer);
        assert!(record.age > 0.05 && record.age < 0.1);
    }

    #[test]
    fn test_path_lifetime() {
        let mut server = infinite_server(4);
        server
            .spawn(
                Vec2::ZERO,
                Arc::new(SimplePath::new(10.0, 0.0).with_lifetime(0.05).into()),
                None,
                CustomData::new(),
            )
            .unwrap()
            .unwrap();

        let mut record = None;
        for _ in 0..20 {
            if let Some(p) = popped(&tick(&mut server, SIM_DT)).pop() {
                record = Some(p);
                break;
            }
        }
        assert_eq!(record.expect("expired").state, BulletState::PoppedLifetimeBullet);
    }

    #[test]
    fn test_spawn_with_missing_curve_fails() {
        let mut server = infinite_server(4);
        let broken: Arc<BulletPath> = Arc::new(BezierPath::default().into());
        let err = server
            .spawn(Vec2::ZERO, broken, None, CustomData::new())
            .unwrap_err();
        assert!(err.is_invalid_configuration());
        assert_eq!(server.live_bullet_count(), 0);
    }

    #[test]
    fn test_unsampleable_path_pops_without_aborting_tick() {
        let mut server = infinite_server(4);
        let bad = spawn_at(&mut server, Vec2::ZERO);
        let good = spawn_at(&mut server, Vec2::new(10.0, 0.0));
        assert!(server.set_bullet_path(bad, Arc::new(BezierPath::default().into())));

        let output = tick(&mut server, SIM_DT);
        let list = popped(&output);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].handle, bad);
        assert_eq!(list[0].state, BulletState::PoppedOutOfBounds);
        assert!(server.bullet(good).is_some());
        assert_eq!(output.stats.advanced, 1);
    }

    #[test]
    fn test_set_bullet_path_restarts_path_time_only() {
        let mut server = infinite_server(4);
        let handle = spawn_at(&mut server, Vec2::ZERO);
        for _ in 0..30 {
            tick(&mut server, SIM_DT);
        }
        let curve = Arc::new(Curve2D::polyline(&[Vec2::ZERO, Vec2::new(0.0, 100.0)]).unwrap());
        let path = Arc::new(BezierPath::new(curve, SamplingMode::ConstantSpeed, 50.0).into());
        assert!(server.set_bullet_path(handle, path));

        let now = server.now_ms();
        let bullet = server.bullet(handle).unwrap();
        assert_eq!(bullet.path_time(now), 0.0);
        assert!(bullet.age(now) > 0.4);
        assert!((bullet.direction(now).unwrap() - Vec2::Y).length() < 1e-3);
    }

    #[test]
    fn test_volley_spawns_each_shot() {
        let mut server = infinite_server(16);
        let base = SimplePath::new(100.0, 0.0);
        let shots: Vec<VolleyShot> = (0..4)
            .map(|i| {
                let angle = i as f32 * std::f32::consts::FRAC_PI_2;
                VolleyShot {
                    offset: crate::from_angle(angle) * 10.0,
                    path: Arc::new(base.rotated(angle).unwrap()),
                }
            })
            .collect();
        let handles = server.spawn_volley(Vec2::new(50.0, 50.0), &shots, None, &CustomData::new());
        assert_eq!(handles.len(), 4);

        let positions = server.live_bullet_positions();
        assert!(positions.iter().any(|p| (*p - Vec2::new(60.0, 50.0)).length() < 1e-4));
        assert!(positions.iter().any(|p| (*p - Vec2::new(50.0, 40.0)).length() < 1e-4));
    }

    #[test]
    fn test_relay_drained_at_tick_start() {
        let mut server = infinite_server(4);
        let relay = server.relay();
        assert!(relay.spawn_bullet(Vec2::ZERO, heading(10.0, 0.0), None, CustomData::new()));
        assert_eq!(server.live_bullet_count(), 0);

        let output = tick(&mut server, SIM_DT);
        assert_eq!(server.live_bullet_count(), 1);
        assert_eq!(output.stats.advanced, 1);

        drop(server);
        assert!(!relay.spawn_bullet(Vec2::ZERO, heading(10.0, 0.0), None, CustomData::new()));
    }

    #[test]
    fn test_tick_requires_start() {
        let mut server = BulletServer::new(ServerConfig::default()).unwrap();
        spawn_at(&mut server, Vec2::new(10.0, 10.0));
        let output = tick(&mut server, SIM_DT);
        assert_eq!(output.stats, TickStats::default());
        assert_eq!(server.now_ms(), 0);
    }

    #[test]
    fn test_pool_resize_locked_while_running() {
        let mut server = infinite_server(4);
        spawn_at(&mut server, Vec2::ZERO);
        assert!(matches!(server.set_pool_size(8), Err(DanmakuError::PoolLocked)));
        assert_eq!(server.pool().capacity(), 4);

        server.stop();
        assert!(server.set_pool_size(0).is_err());
        server.set_pool_size(8).unwrap();
        assert_eq!(server.pool().capacity(), 8);
        assert_eq!(server.config().pool_size, 8);
        assert_eq!(server.live_bullet_count(), 0);
    }

    #[test]
    fn test_invalid_config_leaves_server_untouched() {
        let mut server = infinite_server(4);
        let bad = ServerConfig {
            max_collisions_per_bullet: 0,
            ..server.config().clone()
        };
        assert!(server.apply_config(bad).is_err());
        assert_eq!(server.config().max_collisions_per_bullet, 32);

        let resize = ServerConfig {
            pool_size: 16,
            ..server.config().clone()
        };
        assert!(matches!(server.apply_config(resize), Err(DanmakuError::PoolLocked)));
        assert_eq!(server.pool().capacity(), 4);
    }

    #[test]
    fn test_viewport_mode_tracks_viewport() {
        let mut server = BulletServer::new(ServerConfig {
            play_area_margin: 10.0,
            play_area_allow_incoming: false,
            ..Default::default()
        })
        .unwrap();
        server.start();
        server.set_viewport(Rect::new(0.0, 0.0, 200.0, 200.0));
        assert!(server.play_area().contains(Vec2::new(205.0, 205.0)));

        let inside = spawn_at(&mut server, Vec2::new(100.0, 100.0));
        let near_edge = spawn_at(&mut server, Vec2::new(150.0, 100.0));
        // Shrink the view: the second bullet is now outside
        server.set_viewport(Rect::new(0.0, 0.0, 120.0, 120.0));

        let list = popped(&tick(&mut server, SIM_DT));
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].handle, near_edge);
        assert!(server.bullet(inside).is_some());
    }

    #[derive(Debug, Default)]
    struct Recorded {
        shown: Vec<BulletHandle>,
        hidden: Vec<BulletHandle>,
        transforms: Vec<(BulletHandle, Affine2)>,
    }

    struct RecordingProxy(Arc<Mutex<Recorded>>);

    impl VisualProxy for RecordingProxy {
        fn show(&mut self, handle: BulletHandle, _style: Option<&BulletStyle>) {
            self.0.lock().unwrap().shown.push(handle);
        }

        fn hide(&mut self, handle: BulletHandle) {
            self.0.lock().unwrap().hidden.push(handle);
        }

        fn set_transform(&mut self, handle: BulletHandle, transform: Affine2) {
            self.0.lock().unwrap().transforms.push((handle, transform));
        }
    }

    #[test]
    fn test_visual_proxy_mirrors_lifecycle() {
        let record = Arc::new(Mutex::new(Recorded::default()));
        let mut server = infinite_server(1);
        server.set_visual_proxy(Box::new(RecordingProxy(record.clone())));

        let first = spawn_at(&mut server, Vec2::new(1.0, 2.0));
        let second = spawn_at(&mut server, Vec2::new(3.0, 4.0));
        server.sync_visuals();
        server.pop(second);
        tick(&mut server, SIM_DT);

        let record = record.lock().unwrap();
        assert_eq!(record.shown, vec![first, second]);
        // Evicted, then popped
        assert_eq!(record.hidden, vec![first, second]);
        assert_eq!(record.transforms.len(), 1);
        assert_eq!(record.transforms[0].0, second);
        assert_eq!(record.transforms[0].1.translation, Vec2::new(3.0, 4.0));
    }

    #[test]
    fn test_heap_survives_mixed_churn() {
        let mut server = infinite_server(32);
        for round in 0..40 {
            for i in 0..3 {
                spawn_at(&mut server, Vec2::new(i as f32, round as f32));
            }
            if round % 3 == 0 {
                let live = server.live_bullets();
                for handle in live.iter().step_by(4) {
                    server.pop(*handle);
                }
            }
            tick(&mut server, SIM_DT);
            assert!(server.pool().check_heap());
            assert!(server.live_bullet_count() <= 32);
        }
    }
}
