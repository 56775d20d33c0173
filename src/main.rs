//! Danmaku headless runner
//!
//! Drives a bullet server with a seeded spiral emitter and logs per-second
//! statistics. Usage: `danmaku [config.json] [ticks] [seed]`.

use std::sync::Arc;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use danmaku::consts::{DEFAULT_VIEWPORT_SIZE, SIM_DT};
use danmaku::sim::{
    BezierPath, BulletPath, BulletServer, BulletStyle, ColliderKind, CollisionShape, Curve2D,
    CurvePoint, CustomData, ForcePath, SamplingMode, ServerEvent, SimplePath, StaticColliders,
    Trajectory, VolleyShot,
};
use danmaku::{Result, ServerConfig};

const DEFAULT_TICKS: u64 = 1200;
const DEFAULT_SEED: u64 = 0xDA_4A_4A;
/// Ticks between volleys
const VOLLEY_INTERVAL: u64 = 6;
const SHOTS_PER_VOLLEY: usize = 12;

fn main() {
    env_logger::init();
    log::info!("Danmaku (headless) starting...");

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(e) = run(&args) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run(args: &[String]) -> Result<()> {
    let config = match args.first() {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    let ticks = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_TICKS);
    let seed = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_SEED);
    log::info!("Running {ticks} ticks with seed {seed}");

    let mut server = BulletServer::new(config)?;
    server.start();
    let relay = server.relay();

    let center = DEFAULT_VIEWPORT_SIZE / 2.0;
    let mut world = StaticColliders::new();
    // A "player" hitbox below the emitter
    world.add_circle(1, ColliderKind::Area, 1, center + Vec2::new(0.0, 200.0), 12.0);

    let style = Arc::new(BulletStyle::with_collision(CollisionShape::Circle { radius: 4.0 }, 1));
    let wave = Arc::new(wave_curve()?);
    let mut rng = Pcg32::seed_from_u64(seed);
    let mut spin = 0.0f32;

    let mut totals = (0usize, 0usize, 0usize);
    for tick in 0..ticks {
        if tick % VOLLEY_INTERVAL == 0 {
            let base = pick_path(&mut rng, &wave, tick);
            let shots = ring(&base, spin)?;
            let mut data = CustomData::new();
            data.insert("volley".into(), serde_json::json!(tick / VOLLEY_INTERVAL));
            relay.spawn_volley(center, shots, Some(style.clone()), data);
            spin += 0.17;
        }

        let output = server.tick(SIM_DT, &mut world);
        server.sync_visuals();
        totals.0 += output.stats.popped;
        totals.1 += output.stats.collided;
        totals.2 += output.stats.evicted;

        for event in &output.events {
            if let ServerEvent::CollisionsDetected(hits) = event {
                log::trace!("{} bullets hit the player", hits.len());
            }
        }

        if (tick + 1) % 60 == 0 {
            log::info!(
                "t={:.1}s live={} popped={} collided={} evicted={}",
                server.now_ms() as f32 / 1000.0,
                server.live_bullet_count(),
                totals.0,
                totals.1,
                totals.2
            );
        }
    }

    log::info!("Done: {} bullets still live", server.live_bullet_count());
    Ok(())
}

/// Cycle through the three trajectory models, with a little seeded jitter
fn pick_path(rng: &mut Pcg32, wave: &Arc<Curve2D>, tick: u64) -> BulletPath {
    let speed = rng.random_range(90.0..160.0);
    match (tick / VOLLEY_INTERVAL) % 3 {
        0 => SimplePath::new(speed, 0.0)
            .with_acceleration(rng.random_range(-20.0..40.0))
            .with_curve_rate(rng.random_range(-0.6..0.6))
            .into(),
        1 => ForcePath::from_speed_rotation(speed, 0.0)
            .with_force(Vec2::new(0.0, 60.0))
            .with_max_speed(400.0)
            .into(),
        _ => BezierPath::new(wave.clone(), SamplingMode::ConstantSpeed, speed).into(),
    }
}

/// Evenly spaced shots around the origin, each rotated from `base`
fn ring(base: &BulletPath, spin: f32) -> Result<Vec<VolleyShot>> {
    (0..SHOTS_PER_VOLLEY)
        .map(|i| {
            let angle = spin + i as f32 * std::f32::consts::TAU / SHOTS_PER_VOLLEY as f32;
            Ok(VolleyShot {
                offset: danmaku::from_angle(angle) * 8.0,
                path: Arc::new(base.rotated(angle)?),
            })
        })
        .collect()
}

/// S-shaped wave heading +x
fn wave_curve() -> Result<Curve2D> {
    Curve2D::new(vec![
        CurvePoint::new(Vec2::ZERO, Vec2::ZERO, Vec2::new(40.0, -40.0)),
        CurvePoint::new(Vec2::new(120.0, 0.0), Vec2::new(-40.0, -40.0), Vec2::new(40.0, 40.0)),
        CurvePoint::new(Vec2::new(240.0, 0.0), Vec2::new(-40.0, 40.0), Vec2::ZERO),
    ])
}
