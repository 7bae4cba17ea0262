//! 无窗口烟花演示
//!
//! 发射带延迟爆发的火箭，每个爆发事件生成一圈二级粒子，渲染到离屏目标。

use particle_fx::prelude::*;
use rand::Rng;
use std::f32::consts::TAU;

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;
const FRAMES: u64 = 600;
const FRAME_DT: f32 = 1.0 / 60.0;
const SECONDARIES_PER_BURST: usize = 48;

fn main() {
    if let Err(e) = run() {
        eprintln!("Particle demo failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> FxResult<()> {
    let mut config = FxConfig::load_or_default();
    config.apply_env_overrides();
    config.simulation.canvas_size = [WIDTH as f32, HEIGHT as f32];
    particle_fx::core::init_logging(&config.logging);

    let ctx = pollster::block_on(GpuContext::new_headless())?;
    let target = OffscreenTarget::new(&ctx.device, WIDTH, HEIGHT, OffscreenTarget::DEFAULT_FORMAT);
    let mut system = ParticleSystem::new(&ctx, &config, target.format)?;
    let view = ViewState::new(target.resolution())
        .with_clear(wgpu::Color::TRANSPARENT)
        .with_glow(config.render.glow_strength);

    let mut rng = rand::thread_rng();
    for frame in 0..FRAMES {
        if frame % 30 == 0 {
            launch_rocket(&mut system, &mut rng);
        }

        system.render_frame(&ctx, &target.view, &view, FRAME_DT)?;

        let events = system.burst_events().to_vec();
        for event in &events {
            explode(&mut system, &mut rng, event);
        }

        if frame % 120 == 0 {
            let stats = system.stats();
            tracing::info!(
                target: "particles",
                "frame={} live={} spawned={} dropped={} bursts={} sim={}us stalls={}",
                stats.frame,
                stats.live,
                stats.spawned,
                stats.dropped,
                stats.bursts,
                stats.last_simulation_us,
                stats.feedback_stalls
            );
        }
    }

    system.flush_feedback(&ctx);
    let pixels = target.read_pixels(&ctx)?;
    let covered = pixels.chunks_exact(4).filter(|px| px[3] > 0).count();
    let stats = system.stats();
    tracing::info!(
        target: "particles",
        "Show finished on {} backend after {:.1}s: {} live, {} bursts, {} covered pixels in last frame",
        system.backend(),
        system.elapsed(),
        stats.live,
        stats.bursts,
        covered
    );
    Ok(())
}

fn launch_rocket(system: &mut ParticleSystem, rng: &mut impl Rng) {
    let x = rng.gen_range(WIDTH as f32 * 0.2..WIDTH as f32 * 0.8);
    let rocket = SpawnRequest::at(Vec2::new(x, HEIGHT as f32))
        .with_velocity(Vec2::new(rng.gen_range(-60.0..60.0), rng.gen_range(-720.0..-560.0)))
        .with_color(rng.gen_range(0.0..360.0), 60.0, 100.0)
        .with_size(5.0)
        .with_lifespan(1.0)
        .with_decay(0.5)
        .with_burst(rng.gen_range(0.9..1.3));

    if let Err(e) = system.spawn(rocket) {
        tracing::debug!(target: "particles", "Rocket dropped: {}", e);
    }
}

fn explode(system: &mut ParticleSystem, rng: &mut impl Rng, event: &BurstEvent) {
    let shape = ShapeType::ALL[rng.gen_range(0..ShapeType::ALL.len())];
    let speed: f32 = rng.gen_range(180.0..320.0);
    let spiral = rng.gen_bool(0.25);

    let ring = (0..SECONDARIES_PER_BURST).map(|i| {
        let angle = i as f32 / SECONDARIES_PER_BURST as f32 * TAU;
        let mut request = SpawnRequest::at(event.position)
            .with_velocity(Vec2::from_angle(angle) * speed)
            .with_color(
                (event.hue + rng.gen_range(-20.0..20.0)).rem_euclid(360.0),
                event.saturation,
                event.brightness,
            )
            .with_size(event.size * 1.5)
            .with_decay(rng.gen_range(0.6..0.9))
            .with_rotation(angle, rng.gen_range(-3.0..3.0))
            .with_shape(shape);
        if spiral {
            request = request.with_spiral(0.2);
        }
        request
    });
    let requests: Vec<SpawnRequest> = ring.collect();
    system.spawn_batch(requests);
}
