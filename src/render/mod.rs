//! 渲染模块
//!
//! - `color`: HSB 到 RGB 的转换，主机与着色器共用
//! - `shapes`: 逐片元的形状距离函数与发光项
//! - `packer`: 活跃粒子到 GPU 布局的打包
//! - `particles`: 实例化渲染后端与 `ParticleSystem` 门面
//! - `wgpu_modules`: 缓冲区、管线与 WGSL 源码
//! - `context` / `offscreen`: 设备、输出合成模式与离屏目标

pub mod color;
pub mod context;
pub mod offscreen;
pub mod packer;
pub mod particles;
pub mod shapes;
pub mod wgpu_modules;

pub use color::ColorModel;
pub use context::{capture_alpha_mode, capture_surface_config, GpuContext};
pub use offscreen::OffscreenTarget;
pub use packer::BufferPacker;
pub use particles::{
    ComputeRenderer, FrameStats, InstancedRenderer, ParticleSystem, ParticleSystemStats,
    RasterRenderer, ViewState,
};
pub use shapes::{ShapeLibrary, ShapeType};
