//! WGPU 渲染模块
//!
//! ## 模块结构
//!
//! - `types`: 主机与着色器共享的固定布局类型（RasterInstance, GpuParticle, Uniforms 等）
//! - `buffer`: 缓冲区管理（实例流、ping-pong 粒子状态、回传回读）
//! - `pipeline`: 渲染与计算管线创建，WGSL 源码
//!
//! ## 使用方式
//!
//! ```ignore
//! use crate::render::wgpu_modules::{PipelineBuilder, RasterInstance, DoubleBufferedInstances};
//! ```

pub mod buffer;
pub mod pipeline;
pub mod types;

// 重导出主要类型
pub use buffer::{
    DoubleBufferedInstances, FeedbackReadback, FeedbackSummary, ParticleBuffers, QuadBuffers,
};
pub use pipeline::{PipelineBuilder, SimulationPipelines};
pub use types::{
    DrawArgs, FeedbackHeader, GpuBurstEvent, GpuParticle, QuadVertex, RasterInstance,
    SimUniforms, ViewUniforms,
};
