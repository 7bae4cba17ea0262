//! 计算后端
//!
//! 粒子状态常驻设备存储缓冲区，每帧一次计算通道完成积分、压缩与新粒子追加，
//! 绘制阶段通过间接参数直接读取该缓冲区。

use super::{begin_particle_pass, InstancedRenderer, PrepareReport, ViewState};
use crate::config::BackendKind;
use crate::core::error::{RenderError, RenderResult};
use crate::render::context::GpuContext;
use crate::render::offscreen::map_blocking;
use crate::render::packer::BufferPacker;
use crate::render::wgpu_modules::{
    DrawArgs, FeedbackReadback, FeedbackSummary, GpuParticle, ParticleBuffers, PipelineBuilder,
    QuadBuffers, SimUniforms, SimulationPipelines, ViewUniforms,
};
use crate::simulation::{BurstEvent, FrameUniforms, ParticleStore};
use bytemuck::Zeroable;

/// 设备端模拟的渲染器
pub struct ComputeRenderer {
    simulation: SimulationPipelines,
    /// 索引 i：读取粒子缓冲区 i，写入 1 - i
    simulation_bind_groups: [wgpu::BindGroup; 2],
    draw_pipeline: wgpu::RenderPipeline,
    /// 索引 i：绘制粒子缓冲区 i
    draw_bind_groups: [wgpu::BindGroup; 2],
    sim_buffer: wgpu::Buffer,
    view_buffer: wgpu::Buffer,
    quad: QuadBuffers,
    particles: ParticleBuffers,
    feedback: FeedbackReadback,
    /// 新粒子打包暂存区
    staging: Vec<GpuParticle>,
    workgroup_size: u32,
    /// 最近一次回读到的设备端活跃粒子数
    device_live: u32,
    /// 上次回读之后仍在设备上处理的新粒子数
    in_flight_spawns: u32,
    /// 已回读但尚未交给调用方的爆发事件
    pending_bursts: Vec<BurstEvent>,
    /// 因回读缓冲区全部在途而阻塞等待的次数
    stalls: u64,
}

impl ComputeRenderer {
    /// 创建计算后端
    ///
    /// # 参数
    ///
    /// * `capacity` - 设备端粒子容量
    /// * `format` - 目标纹理格式
    /// * `workgroup_size` - 计算着色器工作组大小
    /// * `max_burst_events` - 主机端事件队列的初始预留
    ///
    /// # 返回
    ///
    /// 任一着色器或管线创建失败时返回 `RenderError::ShaderCompilation`
    pub fn new(
        ctx: &GpuContext,
        capacity: u32,
        format: wgpu::TextureFormat,
        workgroup_size: u32,
        max_burst_events: u32,
    ) -> RenderResult<Self> {
        let device = &ctx.device;

        let max_groups = device.limits().max_compute_workgroups_per_dimension;
        if capacity.div_ceil(workgroup_size.max(1)) > max_groups {
            return Err(RenderError::InvalidState(format!(
                "capacity {capacity} needs more than {max_groups} workgroups of {workgroup_size}"
            )));
        }

        let sim_bgl = PipelineBuilder::create_simulation_bind_group_layout(device);
        let simulation = PipelineBuilder::create_simulation_pipelines(device, &sim_bgl, workgroup_size)?;
        let draw_bgl = PipelineBuilder::create_view_bind_group_layout(device, true);
        let draw_pipeline = PipelineBuilder::create_compute_draw_pipeline(device, format, &draw_bgl)?;

        let sim_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Simulation Uniforms"),
            size: std::mem::size_of::<SimUniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let view_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Compute View Uniforms"),
            size: std::mem::size_of::<ViewUniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let particles = ParticleBuffers::new(device, capacity);
        let event_ring = FeedbackReadback::event_ring_size(capacity);
        let feedback = FeedbackReadback::new(device, event_ring);

        let simulation_bind_group = |src: usize| {
            let dst = 1 - src;
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Particle Simulation Bind Group"),
                layout: &sim_bgl,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: sim_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: particles.particles(src).as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: particles.particles(dst).as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: particles.args(src).as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: particles.args(dst).as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: particles.spawns.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 6,
                        resource: feedback.device_buffer.as_entire_binding(),
                    },
                ],
            })
        };
        let draw_bind_group = |index: usize| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Compute Draw Bind Group"),
                layout: &draw_bgl,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: view_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: particles.particles(index).as_entire_binding(),
                    },
                ],
            })
        };
        let simulation_bind_groups = [simulation_bind_group(0), simulation_bind_group(1)];
        let draw_bind_groups = [draw_bind_group(0), draw_bind_group(1)];

        tracing::info!(
            target: "particle_render",
            "Compute particle renderer ready: capacity={}, workgroup_size={}, event_ring={}",
            capacity,
            workgroup_size,
            event_ring
        );

        Ok(Self {
            simulation,
            simulation_bind_groups,
            draw_pipeline,
            draw_bind_groups,
            sim_buffer,
            view_buffer,
            quad: QuadBuffers::new(device),
            particles,
            feedback,
            staging: vec![GpuParticle::zeroed(); capacity as usize],
            workgroup_size,
            device_live: 0,
            in_flight_spawns: 0,
            pending_bursts: Vec::with_capacity(max_burst_events as usize),
            stalls: 0,
        })
    }

    fn workgroups(&self, invocations: u32) -> u32 {
        invocations.div_ceil(self.workgroup_size)
    }

    /// 取出已完成的回传，事件暂存到 `pending_bursts`
    fn drain_feedback(&mut self, ctx: &GpuContext, store: &mut ParticleStore, wait: bool) {
        let mut summary = FeedbackSummary::default();
        self.feedback
            .collect(&ctx.device, wait, &mut summary, &mut self.pending_bursts);
        if summary.frames == 0 {
            return;
        }

        if summary.dropped > 0 {
            tracing::debug!(
                target: "particles",
                "Device dropped {} spawns at capacity",
                summary.dropped
            );
            store.record_dropped(summary.dropped);
        }
        if summary.overflowed > 0 {
            tracing::warn!(
                target: "particle_render",
                "Burst event ring overflowed, {} events lost",
                summary.overflowed
            );
        }

        self.device_live = summary.live_count;
        self.in_flight_spawns = 0;
    }
}

impl InstancedRenderer for ComputeRenderer {
    fn backend(&self) -> BackendKind {
        BackendKind::Compute
    }

    fn capacity(&self) -> u32 {
        self.particles.capacity()
    }

    fn prepare(
        &mut self,
        ctx: &GpuContext,
        store: &mut ParticleStore,
        frame: &FrameUniforms,
        view: &ViewState,
        encoder: &mut wgpu::CommandEncoder,
    ) -> RenderResult<PrepareReport> {
        let capacity = self.particles.capacity();

        // 回传块每帧都要复制，否则本帧的爆发事件与丢弃计数会丢失
        if !self.feedback.has_idle_slot() {
            self.stalls += 1;
            tracing::debug!(
                target: "particle_render",
                "Both feedback readbacks in flight, waiting ({} stalls)",
                self.stalls
            );
            self.drain_feedback(ctx, store, true);
        }

        // 主机存储只暂存两帧之间的新粒子，交给设备后清空
        let spawn_count = BufferPacker::pack_device(store, &mut self.staging) as u32;
        store.discard_staged();
        if spawn_count > 0 {
            ctx.queue.write_buffer(
                &self.particles.spawns,
                0,
                bytemuck::cast_slice(&self.staging[..spawn_count as usize]),
            );
        }

        let (_, dst_args) = self.particles.next();
        ctx.queue
            .write_buffer(dst_args, 0, bytemuck::bytes_of(&DrawArgs::EMPTY));
        self.feedback.reset_header(&ctx.queue);

        let sim = SimUniforms {
            gravity: frame.gravity,
            drag_factor: frame.drag_factor,
            delta_time: frame.delta_time,
            time: frame.time,
            spiral_force: frame.spiral_force,
            spawn_count,
            capacity,
            boundary_mode: frame.boundary.as_raw(),
            canvas_size: frame.canvas_size.to_array(),
            time_shift: frame.time_shift,
            _pad: 0,
        };
        ctx.queue
            .write_buffer(&self.sim_buffer, 0, bytemuck::bytes_of(&sim));

        let uniforms = ViewUniforms {
            resolution: view.resolution,
            time: frame.time,
            glow_strength: view.glow_strength,
        };
        ctx.queue
            .write_buffer(&self.view_buffer, 0, bytemuck::bytes_of(&uniforms));

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Particle Simulation Pass"),
                timestamp_writes: None,
            });
            pass.set_bind_group(0, &self.simulation_bind_groups[self.particles.current_index()], &[]);

            // 存活粒子先于新粒子写入，容量不足时丢弃最新生成的粒子
            pass.set_pipeline(&self.simulation.simulate);
            pass.dispatch_workgroups(self.workgroups(capacity).max(1), 1, 1);

            if spawn_count > 0 {
                pass.set_pipeline(&self.simulation.emit);
                pass.dispatch_workgroups(self.workgroups(spawn_count), 1, 1);
            }

            pass.set_pipeline(&self.simulation.finalize);
            pass.dispatch_workgroups(1, 1, 1);
        }

        self.feedback.encode_copy(encoder);
        self.particles.swap();
        self.in_flight_spawns = self.in_flight_spawns.saturating_add(spawn_count);

        tracing::trace!(
            target: "particle_render",
            "Compute frame: spawns={}, last_live={}",
            spawn_count,
            self.device_live
        );

        Ok(PrepareReport {
            instances: (self.device_live + self.in_flight_spawns).min(capacity),
            uploaded_spawns: spawn_count,
            died: 0,
        })
    }

    fn draw(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        view: &ViewState,
    ) {
        let current = self.particles.current_index();
        let mut pass = begin_particle_pass(encoder, target, view);
        pass.set_pipeline(&self.draw_pipeline);
        pass.set_bind_group(0, &self.draw_bind_groups[current], &[]);
        pass.set_vertex_buffer(0, self.quad.vertices.slice(..));
        pass.set_index_buffer(self.quad.indices.slice(..), wgpu::IndexFormat::Uint16);
        pass.draw_indexed_indirect(self.particles.args(current), 0);
    }

    fn after_submit(&mut self) {
        self.feedback.request_maps();
    }

    fn collect_feedback(
        &mut self,
        ctx: &GpuContext,
        store: &mut ParticleStore,
        out: &mut Vec<BurstEvent>,
        wait: bool,
    ) {
        self.drain_feedback(ctx, store, wait);
        out.append(&mut self.pending_bursts);
    }

    fn live_count(&self, _store: &ParticleStore) -> usize {
        self.device_live as usize
    }

    fn feedback_stalls(&self) -> u64 {
        self.stalls
    }

    fn clear(&mut self, ctx: &GpuContext, store: &mut ParticleStore) {
        // 先取回在途的回传，避免旧的计数覆盖清空后的状态
        self.drain_feedback(ctx, store, true);
        let discarded = self.pending_bursts.len();
        self.pending_bursts.clear();

        store.clear();
        self.particles.reset(&ctx.queue);
        self.device_live = 0;
        self.in_flight_spawns = 0;
        tracing::debug!(
            target: "particle_render",
            "Device particles cleared ({} pending burst events discarded)",
            discarded
        );
    }

    fn read_back(&self, ctx: &GpuContext, _store: &ParticleStore) -> RenderResult<Vec<GpuParticle>> {
        let current = self.particles.current_index();
        let particle_bytes = (self.particles.capacity().max(1) as usize
            * std::mem::size_of::<GpuParticle>()) as wgpu::BufferAddress;
        let args_bytes = std::mem::size_of::<DrawArgs>() as wgpu::BufferAddress;

        let staging = |label: &str, size| {
            ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        let args_staging = staging("Particle Args Readback", args_bytes);
        let particle_staging = staging("Particle State Readback", particle_bytes);

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Particle Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(self.particles.args(current), 0, &args_staging, 0, args_bytes);
        encoder.copy_buffer_to_buffer(
            self.particles.particles(current),
            0,
            &particle_staging,
            0,
            particle_bytes,
        );
        ctx.queue.submit(Some(encoder.finish()));

        let args_data = map_blocking(ctx, &args_staging)?;
        let args: DrawArgs = bytemuck::pod_read_unaligned(&args_data);
        if args.instance_count > self.particles.capacity() {
            return Err(RenderError::InvalidState(format!(
                "device instance count {} exceeds capacity {}",
                args.instance_count,
                self.particles.capacity()
            )));
        }
        let count = args.instance_count as usize;

        let particle_data = map_blocking(ctx, &particle_staging)?;
        let size = std::mem::size_of::<GpuParticle>();
        Ok((0..count)
            .map(|i| bytemuck::pod_read_unaligned(&particle_data[i * size..(i + 1) * size]))
            .collect())
    }
}
