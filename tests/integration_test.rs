//! GPU 集成测试
//!
//! 没有可用适配器时跳过。

use particle_fx::prelude::*;
use particle_fx::render::wgpu_modules::{GpuParticle, PipelineBuilder};
use std::collections::HashMap;
use std::f32::consts::TAU;

const SIZE: u32 = 128;

fn gpu() -> Option<GpuContext> {
    match pollster::block_on(GpuContext::new_headless()) {
        Ok(ctx) => Some(ctx),
        Err(e) => {
            eprintln!("Skipping GPU test: {}", e);
            None
        }
    }
}

fn config(backend: BackendKind, capacity: u32) -> FxConfig {
    let mut config = FxConfig::default();
    config.render.backend = backend;
    config.simulation.capacity = capacity;
    config.simulation.canvas_size = [SIZE as f32, SIZE as f32];
    config
}

fn setup(
    ctx: &GpuContext,
    backend: BackendKind,
    capacity: u32,
) -> (ParticleSystem, OffscreenTarget, ViewState) {
    let target = OffscreenTarget::new(&ctx.device, SIZE, SIZE, OffscreenTarget::DEFAULT_FORMAT);
    let system = ParticleSystem::new(ctx, &config(backend, capacity), target.format)
        .expect("particle system should initialize");
    let view = ViewState::new(target.resolution()).with_clear(wgpu::Color::TRANSPARENT);
    (system, target, view)
}

fn alpha_at(pixels: &[u8], x: u32, y: u32) -> u8 {
    pixels[((y * SIZE + x) * 4 + 3) as usize]
}

#[test]
fn test_particle_renders_to_offscreen_target() {
    let Some(ctx) = gpu() else { return };

    for backend in [BackendKind::Raster, BackendKind::Compute] {
        let (mut system, target, view) = setup(&ctx, backend, 16);
        system
            .spawn(
                SpawnRequest::at(Vec2::new(64.0, 64.0))
                    .with_size(12.0)
                    .with_color(0.0, 0.0, 100.0)
                    .with_decay(0.1),
            )
            .unwrap();

        system.render_frame(&ctx, &target.view, &view, 1.0 / 60.0).unwrap();
        let pixels = target.read_pixels(&ctx).unwrap();

        assert_eq!(pixels.len(), (SIZE * SIZE * 4) as usize);
        assert!(
            alpha_at(&pixels, 64, 64) > 128,
            "{backend}: centre should be covered"
        );
        assert_eq!(alpha_at(&pixels, 0, 0), 0, "{backend}: corner should stay transparent");
        assert_eq!(alpha_at(&pixels, 127, 127), 0);
    }
}

#[test]
fn test_raster_and_compute_agree() {
    let Some(ctx) = gpu() else { return };

    let requests: Vec<SpawnRequest> = (0..48)
        .map(|i| {
            let t = i as f32;
            let mut request = SpawnRequest::at(Vec2::new(20.0 + t * 2.0, 100.0))
                .with_velocity(Vec2::new(t * 3.0 - 60.0, -200.0 - t * 4.0))
                .with_decay(0.2 + t * 0.01)
                .with_rotation(t * 0.37, 2.0 - t * 0.1)
                .with_shape_raw(i % 7);
            if i % 3 == 0 {
                request = request.with_spiral(0.1);
            }
            request
        })
        .collect();

    let mut snapshots = Vec::new();
    for backend in [BackendKind::Raster, BackendKind::Compute] {
        let (mut system, target, view) = setup(&ctx, backend, 64);
        assert_eq!(system.spawn_batch(requests.clone()), requests.len());
        for _ in 0..30 {
            system.render_frame(&ctx, &target.view, &view, 1.0 / 60.0).unwrap();
        }
        let particles: HashMap<u32, GpuParticle> = system
            .read_back(&ctx)
            .unwrap()
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        snapshots.push(particles);
    }

    let (host, device) = (&snapshots[0], &snapshots[1]);
    assert_eq!(host.len(), requests.len());
    assert_eq!(device.len(), requests.len());

    let close = |a: f32, b: f32| (a - b).abs() <= 1e-3 * a.abs().max(1.0);
    for (id, h) in host {
        let d = &device[id];
        assert!(close(h.position[0], d.position[0]), "x of {id}: {} vs {}", h.position[0], d.position[0]);
        assert!(close(h.position[1], d.position[1]), "y of {id}: {} vs {}", h.position[1], d.position[1]);
        assert!(close(h.alpha, d.alpha), "alpha of {id}");

        let diff = (h.rotation - d.rotation).abs();
        assert!(diff.min(TAU - diff) <= 1e-3, "rotation of {id}");
    }
}

#[test]
fn test_compute_drops_newest_at_capacity() {
    let Some(ctx) = gpu() else { return };
    let (mut system, target, view) = setup(&ctx, BackendKind::Compute, 8);

    let request = SpawnRequest::at(Vec2::new(64.0, 64.0)).with_decay(0.1);
    assert_eq!(system.spawn_batch(vec![request; 8]), 8);
    system.render_frame(&ctx, &target.view, &view, 1.0 / 60.0).unwrap();

    // 主机暂存区已交给设备，新请求在设备端因容量不足被丢弃
    assert_eq!(system.spawn_batch(vec![request; 4]), 4);
    system.render_frame(&ctx, &target.view, &view, 1.0 / 60.0).unwrap();
    system.flush_feedback(&ctx);

    let stats = system.stats();
    assert_eq!(stats.live, 8);
    assert_eq!(stats.dropped, 4);

    let survivors = system.read_back(&ctx).unwrap();
    assert_eq!(survivors.len(), 8);
    assert!(survivors.iter().all(|p| p.id < 8), "survivors must be the oldest particles");
}

#[test]
fn test_burst_reported_once() {
    let Some(ctx) = gpu() else { return };

    for backend in [BackendKind::Raster, BackendKind::Compute] {
        let (mut system, target, view) = setup(&ctx, backend, 16);
        let id = system
            .spawn(
                SpawnRequest::at(Vec2::new(64.0, 64.0))
                    .with_decay(0.1)
                    .with_burst(0.05),
            )
            .unwrap();

        let mut events = Vec::new();
        for _ in 0..10 {
            system.render_frame(&ctx, &target.view, &view, 1.0 / 60.0).unwrap();
            events.extend_from_slice(system.burst_events());
        }
        let already = system.burst_events().len();
        let flushed = system.flush_feedback(&ctx);
        events.extend_from_slice(&flushed[already..]);

        assert_eq!(events.len(), 1, "{backend}: burst must be reported exactly once");
        assert_eq!(events[0].particle, id);
        assert_eq!(system.stats().bursts, 1);
    }
}

#[test]
fn test_clear_empties_both_backends() {
    let Some(ctx) = gpu() else { return };

    for backend in [BackendKind::Raster, BackendKind::Compute] {
        let (mut system, target, view) = setup(&ctx, backend, 32);
        let request = SpawnRequest::at(Vec2::new(64.0, 64.0)).with_decay(0.1);
        system.spawn_batch(vec![request; 10]);
        system.render_frame(&ctx, &target.view, &view, 1.0 / 60.0).unwrap();

        system.clear(&ctx);
        assert_eq!(system.stats().live, 0);

        system.render_frame(&ctx, &target.view, &view, 1.0 / 60.0).unwrap();
        system.flush_feedback(&ctx);
        assert_eq!(system.stats().live, 0, "{backend}: cleared particles came back");
        assert!(system.read_back(&ctx).unwrap().is_empty());

        let pixels = target.read_pixels(&ctx).unwrap();
        assert_eq!(alpha_at(&pixels, 64, 64), 0);
    }
}

#[test]
fn test_frame_delta_is_clamped() {
    let Some(ctx) = gpu() else { return };
    let (mut system, target, view) = setup(&ctx, BackendKind::Raster, 4);

    let stats = system.render_frame(&ctx, &target.view, &view, 5.0).unwrap();
    assert_eq!(stats.delta_time, 0.1);
    assert_eq!(stats.frame, 1);
}

#[test]
fn test_device_loss_resets_state() {
    let Some(ctx) = gpu() else { return };
    let (mut system, target, view) = setup(&ctx, BackendKind::Raster, 4);
    system.spawn(SpawnRequest::at(Vec2::new(10.0, 10.0))).unwrap();

    ctx.mark_lost("host invalidated context");
    let result = system.render_frame(&ctx, &target.view, &view, 1.0 / 60.0);

    assert!(matches!(result, Err(RenderError::DeviceLost(_))));
    assert!(system.store().is_empty());
}

#[test]
fn test_dying_particles_report_bursts_on_both_backends() {
    let Some(ctx) = gpu() else { return };

    let mut counts = Vec::new();
    for backend in [BackendKind::Raster, BackendKind::Compute] {
        let target = OffscreenTarget::new(&ctx.device, SIZE, SIZE, OffscreenTarget::DEFAULT_FORMAT);
        let mut config = config(backend, 16);
        config.render.max_burst_events = 1;
        let mut system = ParticleSystem::new(&ctx, &config, target.format).unwrap();
        let view = ViewState::new(target.resolution()).with_clear(wgpu::Color::TRANSPARENT);

        // 在触发爆发的同一步死亡
        let request = SpawnRequest::at(Vec2::new(64.0, 64.0))
            .with_decay(10.0)
            .with_burst(0.05);
        assert_eq!(system.spawn_batch(vec![request; 2]), 2);

        system.render_frame(&ctx, &target.view, &view, 0.1).unwrap();
        let mut events = system.burst_events().to_vec();
        let already = events.len();
        let flushed = system.flush_feedback(&ctx);
        events.extend_from_slice(&flushed[already..]);

        assert_eq!(events.len(), 2, "{backend}: every burst must be reported");
        assert_eq!(system.stats().bursts, 2);
        assert_eq!(system.stats().live, 0);
        counts.push(events.len());
    }
    assert_eq!(counts[0], counts[1]);
}

#[test]
fn test_non_finite_rotation_resets_on_both_backends() {
    let Some(ctx) = gpu() else { return };

    for backend in [BackendKind::Raster, BackendKind::Compute] {
        let (mut system, target, view) = setup(&ctx, backend, 4);
        system
            .spawn(
                SpawnRequest::at(Vec2::new(32.0, 32.0))
                    .with_decay(0.1)
                    .with_rotation(0.0, f32::INFINITY),
            )
            .unwrap();
        system.render_frame(&ctx, &target.view, &view, 1.0 / 60.0).unwrap();

        let particles = system.read_back(&ctx).unwrap();
        assert_eq!(particles.len(), 1);
        assert_eq!(particles[0].rotation, 0.0, "{backend}: rotation must wrap to zero");
    }
}

#[test]
fn test_invalid_shader_is_reported_as_compilation_error() {
    let Some(ctx) = gpu() else { return };

    let result = PipelineBuilder::build_checked(&ctx.device, "Broken shader", || {
        ctx.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Broken Shader"),
            source: wgpu::ShaderSource::Wgsl("fn main( -> {".into()),
        })
    });
    assert!(matches!(result, Err(RenderError::ShaderCompilation(_))));

    // 合法着色器但入口不存在：管线创建失败
    let result = PipelineBuilder::build_checked(&ctx.device, "Missing entry point", || {
        let module = ctx.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Empty Compute Shader"),
            source: wgpu::ShaderSource::Wgsl("@compute @workgroup_size(1) fn main() {}".into()),
        });
        ctx.device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("Missing Entry Pipeline"),
                layout: None,
                module: &module,
                entry_point: "does_not_exist",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            })
    });
    assert!(matches!(result, Err(RenderError::ShaderCompilation(_))));
}

#[test]
fn test_offscreen_target_resize() {
    let Some(ctx) = gpu() else { return };
    let (mut system, mut target, _) = setup(&ctx, BackendKind::Raster, 4);

    target.resize(&ctx.device, 64, 48);
    assert_eq!(target.resolution(), [64.0, 48.0]);

    let view = ViewState::new(target.resolution()).with_clear(wgpu::Color::TRANSPARENT);
    system
        .spawn(SpawnRequest::at(Vec2::new(32.0, 24.0)).with_size(8.0).with_decay(0.1))
        .unwrap();
    system.render_frame(&ctx, &target.view, &view, 1.0 / 60.0).unwrap();

    let pixels = target.read_pixels(&ctx).unwrap();
    assert_eq!(pixels.len(), 64 * 48 * 4);
    assert!(pixels[((24 * 64 + 32) * 4 + 3) as usize] > 0);
}
