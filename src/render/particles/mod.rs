//! 实例化粒子渲染
//!
//! 两个后端共享同一套生成/绘制接口，调用方只依赖 `InstancedRenderer`。
//!
//! ## 架构设计
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                   ParticleSystem                         │
//! ├─────────────────────────────────────────────────────────┤
//! │  Raster 后端                                             │
//! │     - 主机端 PhysicsIntegrator 积分                       │
//! │     - 收集爆发事件，压缩死亡粒子                          │
//! │     - BufferPacker 打包为 8 浮点实例流并上传              │
//! │     - 单次 draw_indexed 绘制全部实例                      │
//! │                                                          │
//! │  Compute 后端                                            │
//! │     - 新生成粒子打包为设备结构上传                        │
//! │     - 计算着色器积分、压缩、追加新粒子                    │
//! │     - 爆发事件与丢弃计数异步回读                          │
//! │     - draw_indexed_indirect 直接读取存储缓冲区            │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 使用示例
//!
//! ```ignore
//! let mut system = ParticleSystem::new(&ctx, &config, OffscreenTarget::DEFAULT_FORMAT)?;
//! system.spawn(SpawnRequest::at(Vec2::new(640.0, 720.0)).with_burst(1.2))?;
//!
//! let view = ViewState::new([1280.0, 720.0]);
//! system.render_frame(&ctx, &target.view, &view, 1.0 / 60.0)?;
//! for event in system.burst_events() {
//!     // 生成二级粒子
//! }
//! ```

pub mod compute;
pub mod raster;
pub mod system;

pub use compute::ComputeRenderer;
pub use raster::RasterRenderer;
pub use system::{FrameStats, ParticleSystem, ParticleSystemStats};

use crate::config::BackendKind;
use crate::core::error::RenderResult;
use crate::render::context::GpuContext;
use crate::render::wgpu_modules::GpuParticle;
use crate::simulation::{BurstEvent, FrameUniforms, ParticleStore};

/// 绘制时的视图状态
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    /// 视口分辨率（像素）
    pub resolution: [f32; 2],
    /// 清屏颜色；`None` 时保留目标上已有的内容
    pub clear: Option<wgpu::Color>,
    /// 圆形粒子的发光强度
    pub glow_strength: f32,
}

impl ViewState {
    pub fn new(resolution: [f32; 2]) -> Self {
        Self {
            resolution,
            clear: None,
            glow_strength: 0.35,
        }
    }

    /// 每帧先清为透明
    pub fn with_clear(mut self, color: wgpu::Color) -> Self {
        self.clear = Some(color);
        self
    }

    pub fn with_glow(mut self, glow_strength: f32) -> Self {
        self.glow_strength = glow_strength;
        self
    }

    pub(crate) fn load_op(&self) -> wgpu::LoadOp<wgpu::Color> {
        match self.clear {
            Some(color) => wgpu::LoadOp::Clear(color),
            None => wgpu::LoadOp::Load,
        }
    }
}

/// 单帧准备阶段的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrepareReport {
    /// 本帧绘制的实例数（计算后端为上传前的估计值）
    pub instances: u32,
    /// 本帧交给设备的新粒子数
    pub uploaded_spawns: u32,
    /// 主机端积分中死亡的粒子数
    pub died: u32,
}

/// 实例化粒子渲染器
///
/// 每帧调用顺序：`prepare` → `draw` → 提交 → `after_submit` → `collect_feedback`。
pub trait InstancedRenderer {
    /// 后端类型
    fn backend(&self) -> BackendKind;

    /// 初始化时确定的最大实例数
    fn capacity(&self) -> u32;

    /// 模拟并上传本帧数据
    ///
    /// # 参数
    ///
    /// * `store` - 主机端粒子存储（计算后端只作为新粒子的暂存区）
    /// * `frame` - 本帧的模拟参数
    /// * `encoder` - 本帧的命令编码器
    fn prepare(
        &mut self,
        ctx: &GpuContext,
        store: &mut ParticleStore,
        frame: &FrameUniforms,
        view: &ViewState,
        encoder: &mut wgpu::CommandEncoder,
    ) -> RenderResult<PrepareReport>;

    /// 录制单次实例化绘制
    fn draw(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        view: &ViewState,
    );

    /// 提交之后调用，用于发起异步回读
    fn after_submit(&mut self) {}

    /// 收集爆发事件
    ///
    /// `wait` 为真时阻塞直到所有在途回读完成。
    fn collect_feedback(
        &mut self,
        ctx: &GpuContext,
        store: &mut ParticleStore,
        out: &mut Vec<BurstEvent>,
        wait: bool,
    );

    /// 当前活跃粒子数
    fn live_count(&self, store: &ParticleStore) -> usize;

    /// 因回读缓冲区全部在途而阻塞等待的次数
    fn feedback_stalls(&self) -> u64 {
        0
    }

    /// 立即清空所有粒子
    fn clear(&mut self, ctx: &GpuContext, store: &mut ParticleStore);

    /// 以设备结构回读当前粒子状态（诊断用，会阻塞）
    fn read_back(&self, ctx: &GpuContext, store: &ParticleStore) -> RenderResult<Vec<GpuParticle>>;
}

/// 录制一次粒子绘制通道
pub(crate) fn begin_particle_pass<'a>(
    encoder: &'a mut wgpu::CommandEncoder,
    target: &'a wgpu::TextureView,
    view: &ViewState,
) -> wgpu::RenderPass<'a> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("Particle Pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            ops: wgpu::Operations {
                load: view.load_op(),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_state_preserves_buffer_by_default() {
        let view = ViewState::new([1280.0, 720.0]);
        assert_eq!(view.load_op(), wgpu::LoadOp::Load);

        let cleared = view.with_clear(wgpu::Color::TRANSPARENT);
        assert_eq!(cleared.load_op(), wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT));
    }
}
