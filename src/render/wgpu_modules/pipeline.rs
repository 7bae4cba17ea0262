//! WGPU 管线创建
//!
//! 光栅化绘制管线、计算路径的模拟管线以及计算路径的绘制管线。
//! 所有创建都在验证错误作用域内进行，着色器或管线错误会以
//! `RenderError::ShaderCompilation` 返回，而不是留下半初始化的对象。

use super::types::{QuadVertex, RasterInstance};
use crate::core::error::{RenderError, RenderResult};
use crate::render::color::COLOR_MODEL_WGSL;
use crate::render::shapes::SHAPE_LIBRARY_WGSL;

/// 计算路径的三个入口
pub struct SimulationPipelines {
    /// 推进上一帧的存活粒子
    pub simulate: wgpu::ComputePipeline,
    /// 追加并推进本帧新生成的粒子
    pub emit: wgpu::ComputePipeline,
    /// 截断实例数并写回传头部
    pub finalize: wgpu::ComputePipeline,
}

/// 管线构建器
pub struct PipelineBuilder;

impl PipelineBuilder {
    /// 在验证错误作用域内执行创建
    ///
    /// # 返回
    ///
    /// 作用域捕获到错误时返回 `RenderError::ShaderCompilation`
    pub fn build_checked<T>(
        device: &wgpu::Device,
        label: &str,
        build: impl FnOnce() -> T,
    ) -> RenderResult<T> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let built = build();
        match pollster::block_on(device.pop_error_scope()) {
            Some(err) => {
                tracing::error!(target: "particle_render", "{} failed: {}", label, err);
                Err(RenderError::ShaderCompilation(format!("{label}: {err}")))
            }
            None => Ok(built),
        }
    }

    /// 视图绑定组布局
    ///
    /// `with_particles` 为真时额外包含只读粒子存储缓冲区（计算路径绘制用）。
    pub fn create_view_bind_group_layout(
        device: &wgpu::Device,
        with_particles: bool,
    ) -> wgpu::BindGroupLayout {
        let uniform = wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: std::num::NonZeroU64::new(16),
            },
            count: None,
        };
        let particles = wgpu::BindGroupLayoutEntry {
            binding: 1,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        if with_particles {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Particle Draw BGL"),
                entries: &[uniform, particles],
            })
        } else {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Particle View BGL"),
                entries: &[uniform],
            })
        }
    }

    /// 创建光栅化路径的实例化绘制管线
    pub fn create_raster_pipeline(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        view_bgl: &wgpu::BindGroupLayout,
    ) -> RenderResult<wgpu::RenderPipeline> {
        Self::build_checked(device, "Raster particle pipeline", || {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Particle Render Shader"),
                source: wgpu::ShaderSource::Wgsl(render_shader_source().into()),
            });
            Self::create_draw_pipeline(
                device,
                format,
                view_bgl,
                &shader,
                "vs_raster",
                &[
                    QuadVertex::vertex_buffer_layout(),
                    RasterInstance::vertex_buffer_layout(),
                    RasterInstance::shape_buffer_layout(),
                ],
                "Raster Particle Pipeline",
            )
        })
    }

    /// 创建计算路径的绘制管线，直接读取粒子存储缓冲区
    pub fn create_compute_draw_pipeline(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        draw_bgl: &wgpu::BindGroupLayout,
    ) -> RenderResult<wgpu::RenderPipeline> {
        Self::build_checked(device, "Compute particle draw pipeline", || {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Particle Render Shader"),
                source: wgpu::ShaderSource::Wgsl(render_shader_source().into()),
            });
            Self::create_draw_pipeline(
                device,
                format,
                draw_bgl,
                &shader,
                "vs_storage",
                &[QuadVertex::vertex_buffer_layout()],
                "Storage Particle Pipeline",
            )
        })
    }

    fn create_draw_pipeline(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        bgl: &wgpu::BindGroupLayout,
        shader: &wgpu::ShaderModule,
        vertex_entry: &str,
        buffers: &[wgpu::VertexBufferLayout<'_>],
        label: &str,
    ) -> wgpu::RenderPipeline {
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[bgl],
            push_constant_ranges: &[],
        });

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: vertex_entry,
                buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: "fs_particle",
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    // 标准（非预乘）alpha 混合，供外部采集软件正确合成
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        })
    }

    /// 计算路径的绑定组布局
    ///
    /// 0: 模拟 Uniform，1: 源粒子，2: 目标粒子，3: 源绘制参数，
    /// 4: 目标绘制参数（原子计数），5: 新生成粒子，6: 回传块
    pub fn create_simulation_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
        let storage = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Simulation BGL"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: std::num::NonZeroU64::new(48),
                    },
                    count: None,
                },
                storage(1, true),
                storage(2, false),
                storage(3, true),
                storage(4, false),
                storage(5, true),
                storage(6, false),
            ],
        })
    }

    /// 创建计算路径的模拟管线
    pub fn create_simulation_pipelines(
        device: &wgpu::Device,
        bgl: &wgpu::BindGroupLayout,
        workgroup_size: u32,
    ) -> RenderResult<SimulationPipelines> {
        Self::build_checked(device, "Particle simulation pipelines", || {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Particle Simulation Shader"),
                source: wgpu::ShaderSource::Wgsl(simulation_shader_source(workgroup_size).into()),
            });

            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Particle Simulation Pipeline Layout"),
                bind_group_layouts: &[bgl],
                push_constant_ranges: &[],
            });

            let compute = |entry_point: &str, label: &str| {
                device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(label),
                    layout: Some(&pipeline_layout),
                    module: &shader,
                    entry_point,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                })
            };

            SimulationPipelines {
                simulate: compute("simulate_particles", "Particle Simulate Pipeline"),
                emit: compute("emit_spawns", "Particle Emit Pipeline"),
                finalize: compute("finalize_frame", "Particle Finalize Pipeline"),
            }
        })
    }
}

/// 绘制着色器完整源码
pub fn render_shader_source() -> String {
    [PARTICLE_STRUCT_WGSL, COLOR_MODEL_WGSL, SHAPE_LIBRARY_WGSL, RENDER_SHADER].concat()
}

/// 模拟着色器完整源码
pub fn simulation_shader_source(workgroup_size: u32) -> String {
    [PARTICLE_STRUCT_WGSL, SIMULATION_SHADER]
        .concat()
        .replace("{workgroup_size}", &workgroup_size.to_string())
}

/// 设备端粒子结构，与 `GpuParticle` 对应
const PARTICLE_STRUCT_WGSL: &str = r#"
struct Particle {
    position: vec2<f32>,
    velocity: vec2<f32>,
    size: f32,
    hue: f32,
    saturation: f32,
    brightness: f32,
    alpha: f32,
    lifespan: f32,
    decay: f32,
    rotation: f32,
    rotation_speed: f32,
    mass: f32,
    burst_state: u32,
    burst_delay: f32,
    spawn_time: f32,
    spiral_state: u32,
    spiral_delay: f32,
    shape: u32,
    id: u32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
}
"#;

const RENDER_SHADER: &str = r#"
struct ViewUniforms {
    resolution: vec2<f32>,
    time: f32,
    glow_strength: f32,
}

@group(0) @binding(0) var<uniform> u_view: ViewUniforms;
@group(0) @binding(1) var<storage, read> particles: array<Particle>;

struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) color: vec3<f32>,
    @location(2) alpha: f32,
    @location(3) @interpolate(flat) shape: u32,
}

// 像素坐标（左上原点）到 NDC，y 轴翻转
fn particle_vertex(
    corner: vec2<f32>,
    position: vec2<f32>,
    size: f32,
    rotation: f32,
    alpha: f32,
    hue: f32,
    saturation: f32,
    brightness: f32,
    shape: u32,
) -> VsOut {
    let c = cos(rotation);
    let s = sin(rotation);
    let local = vec2<f32>(corner.x * c - corner.y * s, corner.x * s + corner.y * c) * size * 2.0;
    let pixel = position + local;
    let ndc = vec2<f32>(
        pixel.x / u_view.resolution.x * 2.0 - 1.0,
        1.0 - pixel.y / u_view.resolution.y * 2.0,
    );

    var out: VsOut;
    out.clip = vec4<f32>(ndc, 0.0, 1.0);
    out.uv = corner * 2.0;
    out.color = hsb_to_rgb(hue, saturation, brightness);
    out.alpha = alpha;
    out.shape = shape;
    return out;
}

@vertex
fn vs_raster(
    @location(0) corner: vec2<f32>,
    @location(1) position: vec2<f32>,
    @location(2) size: f32,
    @location(3) alpha: f32,
    @location(4) hue: f32,
    @location(5) saturation: f32,
    @location(6) brightness: f32,
    @location(7) rotation: f32,
    @location(8) shape: u32,
) -> VsOut {
    return particle_vertex(corner, position, size, rotation, alpha, hue, saturation, brightness, shape);
}

@vertex
fn vs_storage(
    @location(0) corner: vec2<f32>,
    @builtin(instance_index) instance: u32,
) -> VsOut {
    let p = particles[instance];
    return particle_vertex(corner, p.position, p.size, p.rotation, p.alpha, p.hue, p.saturation, p.brightness, p.shape);
}

@fragment
fn fs_particle(in: VsOut) -> @location(0) vec4<f32> {
    let a = in.alpha * shape_coverage(in.shape, in.uv);
    if (a < ALPHA_EPSILON) {
        discard;
    }
    let glow = shape_glow(in.shape, in.uv, u_view.glow_strength);
    return vec4<f32>(min(in.color * (1.0 + glow), vec3<f32>(1.0)), a);
}
"#;

const SIMULATION_SHADER: &str = r#"
const TAU: f32 = 6.283185307179586;
const BURST_PENDING: u32 = 1u;
const BURST_TRIGGERED: u32 = 2u;
const BURST_CONSUMED: u32 = 3u;

struct SimUniforms {
    gravity: f32,
    drag_factor: f32,
    delta_time: f32,
    time: f32,
    spiral_force: f32,
    spawn_count: u32,
    capacity: u32,
    boundary_mode: u32,
    canvas_size: vec2<f32>,
    time_shift: f32,
    _pad: u32,
}

struct DrawArgs {
    index_count: u32,
    instance_count: u32,
    first_index: u32,
    base_vertex: i32,
    first_instance: u32,
}

struct DrawArgsCounter {
    index_count: u32,
    instance_count: atomic<u32>,
    first_index: u32,
    base_vertex: i32,
    first_instance: u32,
}

struct BurstEventRaw {
    id: u32,
    _pad: u32,
    position: vec2<f32>,
    hue: f32,
    saturation: f32,
    brightness: f32,
    size: f32,
}

struct Feedback {
    live_count: u32,
    dropped: atomic<u32>,
    burst_count: atomic<u32>,
    _pad: u32,
    events: array<BurstEventRaw>,
}

@group(0) @binding(0) var<uniform> sim: SimUniforms;
@group(0) @binding(1) var<storage, read> src: array<Particle>;
@group(0) @binding(2) var<storage, read_write> dst: array<Particle>;
@group(0) @binding(3) var<storage, read> src_args: DrawArgs;
@group(0) @binding(4) var<storage, read_write> dst_args: DrawArgsCounter;
@group(0) @binding(5) var<storage, read> spawns: array<Particle>;
@group(0) @binding(6) var<storage, read_write> feedback: Feedback;

// 指数位全为 1 时是 NaN 或无穷
fn is_finite_f32(x: f32) -> bool {
    return (bitcast<u32>(x) & 0x7f800000u) != 0x7f800000u;
}

fn wrap_angle(angle: f32) -> f32 {
    var wrapped = angle - TAU * floor(angle / TAU);
    if (wrapped < 0.0) {
        wrapped = wrapped + TAU;
    }
    if (wrapped >= TAU || !is_finite_f32(wrapped)) {
        wrapped = 0.0;
    }
    return wrapped;
}

// 与主机积分器相同的顺序
fn integrate(p_in: Particle) -> Particle {
    var p = p_in;
    let dt = sim.delta_time;

    var velocity = p.velocity;
    velocity.y = velocity.y + sim.gravity * dt;
    velocity = velocity * sim.drag_factor;
    var position = p.position + velocity * dt;

    p.rotation = wrap_angle(p.rotation + p.rotation_speed * dt);
    p.lifespan = p.lifespan - p.decay * dt;
    p.alpha = clamp(p.lifespan, 0.0, 1.0);

    let age = sim.time - p.spawn_time;
    if (p.burst_state == BURST_PENDING && age >= p.burst_delay) {
        p.burst_state = BURST_TRIGGERED;
    }
    if (p.spiral_state != 0u && age >= p.spiral_delay) {
        velocity = velocity + vec2<f32>(cos(p.rotation), sin(p.rotation)) * sim.spiral_force * dt;
    }
    if (sim.boundary_mode == 1u) {
        position = position - sim.canvas_size * floor(position / sim.canvas_size);
    }

    p.velocity = velocity;
    p.position = position;
    return p;
}

// 事件环按一帧可能推进的粒子总数分配；越界时保持 Triggered
fn report_burst(p_in: Particle) -> Particle {
    var p = p_in;
    if (p.burst_state != BURST_TRIGGERED) {
        return p;
    }
    let slot = atomicAdd(&feedback.burst_count, 1u);
    if (slot < arrayLength(&feedback.events)) {
        feedback.events[slot] = BurstEventRaw(
            p.id, 0u, p.position, p.hue, p.saturation, p.brightness, p.size,
        );
        p.burst_state = BURST_CONSUMED;
    }
    return p;
}

// 死亡粒子不写入目标缓冲区；超出容量的粒子被丢弃
fn advance(p_in: Particle, count_dropped: bool) {
    var p = integrate(p_in);
    if (p.lifespan <= 0.0) {
        _ = report_burst(p);
        return;
    }
    let slot = atomicAdd(&dst_args.instance_count, 1u);
    if (slot >= sim.capacity) {
        if (count_dropped) {
            let _dropped = atomicAdd(&feedback.dropped, 1u);
        }
        return;
    }
    dst[slot] = report_burst(p);
}

@compute @workgroup_size({workgroup_size})
fn simulate_particles(@builtin(global_invocation_id) gid: vec3<u32>) {
    let idx = gid.x;
    if (idx >= src_args.instance_count || idx >= sim.capacity) {
        return;
    }
    var current = src[idx];
    if (current.lifespan <= 0.0) {
        return;
    }
    current.spawn_time = current.spawn_time - sim.time_shift;
    advance(current, false);
}

@compute @workgroup_size({workgroup_size})
fn emit_spawns(@builtin(global_invocation_id) gid: vec3<u32>) {
    let idx = gid.x;
    if (idx >= sim.spawn_count) {
        return;
    }
    let spawned = spawns[idx];
    if (spawned.lifespan <= 0.0) {
        return;
    }
    advance(spawned, true);
}

@compute @workgroup_size(1)
fn finalize_frame() {
    let count = min(atomicLoad(&dst_args.instance_count), sim.capacity);
    atomicStore(&dst_args.instance_count, count);
    feedback.live_count = count;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(source: &str) -> naga::Module {
        let module = naga::front::wgsl::parse_str(source)
            .unwrap_or_else(|e| panic!("{}", e.emit_to_string(source)));
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .unwrap_or_else(|e| panic!("validation failed: {e:?}"));
        module
    }

    fn entry_points(module: &naga::Module) -> Vec<&str> {
        module
            .entry_points
            .iter()
            .map(|ep| ep.name.as_str())
            .collect()
    }

    #[test]
    fn test_render_shader_validates() {
        let module = validate(&render_shader_source());
        let entries = entry_points(&module);
        for name in ["vs_raster", "vs_storage", "fs_particle"] {
            assert!(entries.contains(&name), "missing entry point {name}");
        }
    }

    #[test]
    fn test_simulation_shader_validates() {
        for size in [1, 64, 256] {
            let module = validate(&simulation_shader_source(size));
            let entries = entry_points(&module);
            for name in ["simulate_particles", "emit_spawns", "finalize_frame"] {
                assert!(entries.contains(&name), "missing entry point {name}");
            }
            let simulate = module
                .entry_points
                .iter()
                .find(|ep| ep.name == "simulate_particles")
                .unwrap();
            assert_eq!(simulate.workgroup_size, [size, 1, 1]);
        }
    }

    #[test]
    fn test_simulation_wraps_non_finite_rotation() {
        let module = validate(&simulation_shader_source(64));
        let names: Vec<&str> = module
            .functions
            .iter()
            .filter_map(|(_, f)| f.name.as_deref())
            .collect();
        assert!(names.contains(&"is_finite_f32"));
        assert!(names.contains(&"wrap_angle"));
    }

    #[test]
    fn test_particle_struct_matches_host_layout() {
        let module = validate(&simulation_shader_source(64));
        let (_, ty) = module
            .types
            .iter()
            .find(|(_, ty)| ty.name.as_deref() == Some("Particle"))
            .unwrap();
        match &ty.inner {
            naga::TypeInner::Struct { span, members } => {
                assert_eq!(*span as usize, std::mem::size_of::<super::super::types::GpuParticle>());
                let id = members.iter().find(|m| m.name.as_deref() == Some("id")).unwrap();
                assert_eq!(id.offset, 80);
            }
            other => panic!("unexpected type {other:?}"),
        }
    }

    #[test]
    fn test_sim_uniforms_match_host_layout() {
        let module = validate(&simulation_shader_source(64));
        let (_, ty) = module
            .types
            .iter()
            .find(|(_, ty)| ty.name.as_deref() == Some("SimUniforms"))
            .unwrap();
        match &ty.inner {
            naga::TypeInner::Struct { span, .. } => {
                assert_eq!(*span as usize, std::mem::size_of::<super::super::types::SimUniforms>());
            }
            other => panic!("unexpected type {other:?}"),
        }
    }
}
