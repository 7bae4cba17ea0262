//! 粒子系统门面
//!
//! 持有粒子存储、模拟时钟与所选后端，对外提供生成、逐帧渲染、清空与统计接口。

use super::{ComputeRenderer, InstancedRenderer, RasterRenderer, ViewState};
use crate::config::{BackendKind, FxConfig, SimulationConfig};
use crate::core::error::{FxResult, RenderResult};
use crate::render::context::GpuContext;
use crate::render::wgpu_modules::GpuParticle;
use crate::simulation::{
    BurstEvent, FrameUniforms, ParticleId, ParticleStore, SimulationClock, SpawnError, SpawnRequest,
};
use std::time::Instant;

/// 单帧渲染结果
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    /// 帧序号（从 1 开始）
    pub frame: u64,
    /// 截断后的时间步长
    pub delta_time: f32,
    /// 本帧绘制的实例数
    pub instances: u32,
    /// 本帧收集到的爆发事件数
    pub bursts: usize,
    /// 模拟与上传耗时（微秒）
    pub simulation_us: u64,
}

/// 粒子系统统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParticleSystemStats {
    pub live: usize,
    pub capacity: usize,
    pub spawned: u64,
    pub dropped: u64,
    pub evicted: u64,
    pub bursts: u64,
    pub frame: u64,
    pub last_simulation_us: u64,
    /// 计算后端等待回读缓冲区的次数
    pub feedback_stalls: u64,
}

/// 粒子系统
///
/// 外部触发层决定何时生成粒子；本系统只负责存储、模拟与绘制。
pub struct ParticleSystem {
    renderer: Box<dyn InstancedRenderer>,
    store: ParticleStore,
    config: SimulationConfig,
    clock: SimulationClock,
    frame: u64,
    bursts: Vec<BurstEvent>,
    total_bursts: u64,
    last_simulation_us: u64,
}

impl ParticleSystem {
    /// 创建粒子系统
    ///
    /// # 参数
    ///
    /// * `ctx` - GPU 上下文
    /// * `config` - 完整配置，创建前会先验证
    /// * `format` - 目标纹理格式
    ///
    /// # 返回
    ///
    /// 配置无效或着色器创建失败时返回错误，不会得到部分初始化的系统
    pub fn new(ctx: &GpuContext, config: &FxConfig, format: wgpu::TextureFormat) -> FxResult<Self> {
        config.validate()?;
        ctx.check_lost()?;

        let capacity = config.simulation.capacity;
        let renderer: Box<dyn InstancedRenderer> = match config.render.backend {
            BackendKind::Raster => Box::new(RasterRenderer::new(ctx, capacity, format)?),
            BackendKind::Compute => Box::new(ComputeRenderer::new(
                ctx,
                capacity,
                format,
                config.render.workgroup_size,
                config.render.max_burst_events,
            )?),
        };

        tracing::info!(
            target: "particle_render",
            "Particle system created: backend={}, capacity={}",
            config.render.backend,
            capacity
        );

        Ok(Self {
            renderer,
            store: ParticleStore::with_capacity(capacity as usize, config.simulation.overflow),
            config: config.simulation.clone(),
            clock: SimulationClock::new(),
            frame: 0,
            bursts: Vec::with_capacity(config.render.max_burst_events as usize),
            total_bursts: 0,
            last_simulation_us: 0,
        })
    }

    /// 生成一个粒子，以当前模拟时钟作为生成时间
    pub fn spawn(&mut self, request: SpawnRequest) -> Result<ParticleId, SpawnError> {
        self.store.allocate(&request, self.clock.now())
    }

    /// 批量生成
    ///
    /// # 返回
    ///
    /// 成功生成的数量；容量不足的请求按溢出策略处理并计入统计
    pub fn spawn_batch<I>(&mut self, requests: I) -> usize
    where
        I: IntoIterator<Item = SpawnRequest>,
    {
        let mut spawned = 0;
        let mut rejected = 0;
        for request in requests {
            match self.store.allocate(&request, self.clock.now()) {
                Ok(_) => spawned += 1,
                Err(SpawnError::Full { .. }) => rejected += 1,
            }
        }
        if rejected > 0 {
            tracing::debug!(
                target: "particles",
                "Spawn batch: {} accepted, {} dropped at capacity",
                spawned,
                rejected
            );
        }
        spawned
    }

    /// 推进一帧并绘制到目标
    ///
    /// # 参数
    ///
    /// * `target` - 输出纹理视图
    /// * `view` - 分辨率与清屏方式
    /// * `delta_time` - 距上一帧的时间（秒），超过上限时截断
    ///
    /// # 返回
    ///
    /// 设备丢失时返回 `RenderError::DeviceLost`，此时粒子状态已被重置
    pub fn render_frame(
        &mut self,
        ctx: &GpuContext,
        target: &wgpu::TextureView,
        view: &ViewState,
        delta_time: f32,
    ) -> RenderResult<FrameStats> {
        if let Err(err) = ctx.check_lost() {
            self.reset_after_loss();
            return Err(err);
        }

        let dt = if delta_time.is_finite() {
            delta_time.clamp(0.0, self.config.max_delta_time)
        } else {
            0.0
        };
        let tick = self.clock.advance(dt);
        if tick.shift > 0.0 {
            self.store.rebase_spawn_times(tick.shift);
        }
        self.frame += 1;
        let uniforms = FrameUniforms::new(&self.config, tick.time, dt).with_time_shift(tick.shift);

        let started = Instant::now();
        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Particle Frame Encoder"),
            });
        let report = self
            .renderer
            .prepare(ctx, &mut self.store, &uniforms, view, &mut encoder)?;
        self.last_simulation_us = started.elapsed().as_micros() as u64;

        self.renderer.draw(&mut encoder, target, view);
        ctx.queue.submit(Some(encoder.finish()));
        self.renderer.after_submit();

        self.bursts.clear();
        self.renderer
            .collect_feedback(ctx, &mut self.store, &mut self.bursts, false);
        self.total_bursts += self.bursts.len() as u64;

        if let Err(err) = ctx.check_lost() {
            self.reset_after_loss();
            return Err(err);
        }

        tracing::trace!(
            target: "particles",
            "Frame {}: dt={:.4}, instances={}, bursts={}",
            self.frame,
            dt,
            report.instances,
            self.bursts.len()
        );

        Ok(FrameStats {
            frame: self.frame,
            delta_time: dt,
            instances: report.instances,
            bursts: self.bursts.len(),
            simulation_us: self.last_simulation_us,
        })
    }

    /// 上一帧收集到的爆发事件，由宿主据此生成二级粒子
    pub fn burst_events(&self) -> &[BurstEvent] {
        &self.bursts
    }

    /// 等待所有在途回传并追加其中的爆发事件
    pub fn flush_feedback(&mut self, ctx: &GpuContext) -> &[BurstEvent] {
        let before = self.bursts.len();
        self.renderer
            .collect_feedback(ctx, &mut self.store, &mut self.bursts, true);
        self.total_bursts += (self.bursts.len() - before) as u64;
        &self.bursts
    }

    /// 立即清空所有粒子（不同于自然衰减）
    pub fn clear(&mut self, ctx: &GpuContext) {
        self.renderer.clear(ctx, &mut self.store);
        self.bursts.clear();
        tracing::info!(target: "particles", "Particle system cleared");
    }

    /// 统计信息
    pub fn stats(&self) -> ParticleSystemStats {
        ParticleSystemStats {
            live: self.renderer.live_count(&self.store),
            capacity: self.store.capacity(),
            spawned: self.store.total_spawned(),
            dropped: self.store.dropped_spawns(),
            evicted: self.store.evicted(),
            bursts: self.total_bursts,
            frame: self.frame,
            last_simulation_us: self.last_simulation_us,
            feedback_stalls: self.renderer.feedback_stalls(),
        }
    }

    /// 以设备结构回读粒子状态（诊断用，会阻塞）
    pub fn read_back(&self, ctx: &GpuContext) -> RenderResult<Vec<GpuParticle>> {
        self.renderer.read_back(ctx, &self.store)
    }

    pub fn store(&self) -> &ParticleStore {
        &self.store
    }

    pub fn backend(&self) -> BackendKind {
        self.renderer.backend()
    }

    /// 启动以来的模拟时长（秒）
    pub fn elapsed(&self) -> f64 {
        self.clock.elapsed()
    }

    fn reset_after_loss(&mut self) {
        tracing::warn!(
            target: "particle_render",
            "Device lost, discarding {} host particles",
            self.store.live_count()
        );
        self.store.clear();
        self.bursts.clear();
    }
}
