//! 光栅化后端
//!
//! 主机端积分，每帧打包活跃粒子并以实例流上传，GPU 只负责变换、颜色转换与形状选择。

use super::{begin_particle_pass, InstancedRenderer, PrepareReport, ViewState};
use crate::config::BackendKind;
use crate::core::error::RenderResult;
use crate::render::context::GpuContext;
use crate::render::packer::BufferPacker;
use crate::render::wgpu_modules::{
    DoubleBufferedInstances, GpuParticle, PipelineBuilder, QuadBuffers, RasterInstance,
    ViewUniforms,
};
use crate::simulation::{BurstEvent, FrameUniforms, ParticleStore, PhysicsIntegrator};
use bytemuck::Zeroable;

/// 主机模拟、GPU 绘制的渲染器
pub struct RasterRenderer {
    pipeline: wgpu::RenderPipeline,
    view_buffer: wgpu::Buffer,
    view_bind_group: wgpu::BindGroup,
    quad: QuadBuffers,
    instances: DoubleBufferedInstances,
    /// 主机端打包暂存区，初始化时按容量分配
    staging_instances: Vec<RasterInstance>,
    staging_shapes: Vec<u32>,
    /// 本帧积分时触发的爆发
    pending_bursts: Vec<BurstEvent>,
}

impl RasterRenderer {
    /// 创建光栅化后端
    ///
    /// # 参数
    ///
    /// * `capacity` - 最大实例数，与粒子存储容量一致
    /// * `format` - 目标纹理格式
    ///
    /// # 返回
    ///
    /// 着色器或管线创建失败时返回 `RenderError::ShaderCompilation`
    pub fn new(ctx: &GpuContext, capacity: u32, format: wgpu::TextureFormat) -> RenderResult<Self> {
        let device = &ctx.device;
        let view_bgl = PipelineBuilder::create_view_bind_group_layout(device, false);
        let pipeline = PipelineBuilder::create_raster_pipeline(device, format, &view_bgl)?;

        let view_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Raster View Uniforms"),
            size: std::mem::size_of::<ViewUniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let view_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Raster View Bind Group"),
            layout: &view_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: view_buffer.as_entire_binding(),
            }],
        });

        tracing::info!(
            target: "particle_render",
            "Raster particle renderer ready: capacity={}, format={:?}",
            capacity,
            format
        );

        Ok(Self {
            pipeline,
            view_buffer,
            view_bind_group,
            quad: QuadBuffers::new(device),
            instances: DoubleBufferedInstances::new(device, capacity),
            staging_instances: vec![RasterInstance::zeroed(); capacity as usize],
            staging_shapes: vec![0; capacity as usize],
            pending_bursts: Vec::new(),
        })
    }
}

impl InstancedRenderer for RasterRenderer {
    fn backend(&self) -> BackendKind {
        BackendKind::Raster
    }

    fn capacity(&self) -> u32 {
        self.instances.capacity()
    }

    fn prepare(
        &mut self,
        ctx: &GpuContext,
        store: &mut ParticleStore,
        frame: &FrameUniforms,
        view: &ViewState,
        _encoder: &mut wgpu::CommandEncoder,
    ) -> RenderResult<PrepareReport> {
        let step = PhysicsIntegrator::step(store, frame);

        // 在压缩之前读取爆发，同一步死亡的粒子也能上报
        store.drain_triggered_bursts(&mut self.pending_bursts);
        store.release_dead();

        let count = BufferPacker::pack_raster(
            store,
            &mut self.staging_instances,
            &mut self.staging_shapes,
        );
        self.instances.upload(
            &ctx.queue,
            &self.staging_instances[..count],
            &self.staging_shapes[..count],
        );

        let uniforms = ViewUniforms {
            resolution: view.resolution,
            time: frame.time,
            glow_strength: view.glow_strength,
        };
        ctx.queue
            .write_buffer(&self.view_buffer, 0, bytemuck::bytes_of(&uniforms));

        Ok(PrepareReport {
            instances: count as u32,
            uploaded_spawns: 0,
            died: step.died as u32,
        })
    }

    fn draw(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        view: &ViewState,
    ) {
        let mut pass = begin_particle_pass(encoder, target, view);
        let count = self.instances.count();
        if count == 0 {
            return;
        }

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.view_bind_group, &[]);
        pass.set_vertex_buffer(0, self.quad.vertices.slice(..));
        pass.set_vertex_buffer(1, self.instances.active_instances().slice(..));
        pass.set_vertex_buffer(2, self.instances.active_shapes().slice(..));
        pass.set_index_buffer(self.quad.indices.slice(..), wgpu::IndexFormat::Uint16);
        pass.draw_indexed(0..self.quad.index_count(), 0, 0..count);
    }

    fn collect_feedback(
        &mut self,
        _ctx: &GpuContext,
        _store: &mut ParticleStore,
        out: &mut Vec<BurstEvent>,
        _wait: bool,
    ) {
        out.append(&mut self.pending_bursts);
    }

    fn live_count(&self, store: &ParticleStore) -> usize {
        store.live_count()
    }

    fn clear(&mut self, _ctx: &GpuContext, store: &mut ParticleStore) {
        store.clear();
        self.instances.reset();
        self.pending_bursts.clear();
    }

    fn read_back(&self, _ctx: &GpuContext, store: &ParticleStore) -> RenderResult<Vec<GpuParticle>> {
        let mut out = vec![GpuParticle::zeroed(); store.live_count()];
        let written = BufferPacker::pack_device(store, &mut out);
        out.truncate(written);
        Ok(out)
    }
}
