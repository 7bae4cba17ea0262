//! WGPU 公共类型定义
//!
//! 主机与着色器共享的固定布局结构。所有结构均为 `#[repr(C)]` 的 Pod 类型，
//! 字段顺序与 WGSL 中的声明一一对应。

use crate::impl_default;
use crate::simulation::{BurstEvent, ParticleId};
use glam::Vec2;

/// 光栅化路径的每实例数据
///
/// 8 个 f32，步长 32 字节：`x, y, size, alpha, hue, saturation, brightness, rotation`。
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct RasterInstance {
    pub position: [f32; 2],
    pub size: f32,
    pub alpha: f32,
    pub hue: f32,
    pub saturation: f32,
    pub brightness: f32,
    pub rotation: f32,
}

impl RasterInstance {
    /// 每实例浮点数量
    pub const FLOATS: usize = 8;

    /// 获取实例的顶点缓冲区布局
    pub fn vertex_buffer_layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<RasterInstance>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: 8,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32,
                },
                wgpu::VertexAttribute {
                    offset: 12,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32,
                },
                wgpu::VertexAttribute {
                    offset: 16,
                    shader_location: 4,
                    format: wgpu::VertexFormat::Float32,
                },
                wgpu::VertexAttribute {
                    offset: 20,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32,
                },
                wgpu::VertexAttribute {
                    offset: 24,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32,
                },
                wgpu::VertexAttribute {
                    offset: 28,
                    shader_location: 7,
                    format: wgpu::VertexFormat::Float32,
                },
            ],
        }
    }

    /// 形状编号使用独立的每实例流，保持 32 字节布局不变
    pub fn shape_buffer_layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<u32>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[wgpu::VertexAttribute {
                offset: 0,
                shader_location: 8,
                format: wgpu::VertexFormat::Uint32,
            }],
        }
    }
}

impl_default!(RasterInstance {
    position: [0.0, 0.0],
    size: 0.0,
    alpha: 0.0,
    hue: 0.0,
    saturation: 0.0,
    brightness: 0.0,
    rotation: 0.0,
});

/// 计算路径的设备端粒子结构
///
/// 96 字节，满足 16 字节存储缓冲区对齐。
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuParticle {
    pub position: [f32; 2],
    pub velocity: [f32; 2],
    pub size: f32,
    pub hue: f32,
    pub saturation: f32,
    pub brightness: f32,
    pub alpha: f32,
    pub lifespan: f32,
    pub decay: f32,
    pub rotation: f32,
    pub rotation_speed: f32,
    pub mass: f32,
    /// `BurstState` 编码
    pub burst_state: u32,
    pub burst_delay: f32,
    pub spawn_time: f32,
    /// 0 = 无螺旋，1 = 有螺旋
    pub spiral_state: u32,
    pub spiral_delay: f32,
    pub shape: u32,
    pub id: u32,
    pub _padding: [f32; 3],
}

impl GpuParticle {
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.lifespan > 0.0
    }
}

/// 四边形顶点
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadVertex {
    /// 角点，范围 [-0.5, 0.5]
    pub corner: [f32; 2],
}

impl QuadVertex {
    /// 四个角点
    pub const CORNERS: [QuadVertex; 4] = [
        QuadVertex { corner: [-0.5, -0.5] },
        QuadVertex { corner: [0.5, -0.5] },
        QuadVertex { corner: [-0.5, 0.5] },
        QuadVertex { corner: [0.5, 0.5] },
    ];

    /// 两个三角形
    pub const INDICES: [u16; 6] = [0, 1, 2, 2, 1, 3];

    /// 获取顶点缓冲区布局
    pub fn vertex_buffer_layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x2,
            }],
        }
    }
}

/// 视图 Uniform 数据
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ViewUniforms {
    /// 视口尺寸（像素）
    pub resolution: [f32; 2],
    /// 模拟时钟
    pub time: f32,
    /// 圆形核心发光强度
    pub glow_strength: f32,
}

/// 计算路径的模拟 Uniform 数据
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SimUniforms {
    pub gravity: f32,
    pub drag_factor: f32,
    pub delta_time: f32,
    pub time: f32,
    pub spiral_force: f32,
    /// 本帧新生成粒子数量
    pub spawn_count: u32,
    pub capacity: u32,
    pub boundary_mode: u32,
    pub canvas_size: [f32; 2],
    /// 时钟纪元前移量，设备端粒子的生成时间需减去该值
    pub time_shift: f32,
    pub _pad: u32,
}

/// `draw_indexed_indirect` 参数
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawArgs {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub first_instance: u32,
}

impl DrawArgs {
    /// 一个四边形、零实例
    pub const EMPTY: DrawArgs = DrawArgs {
        index_count: QuadVertex::INDICES.len() as u32,
        instance_count: 0,
        first_index: 0,
        base_vertex: 0,
        first_instance: 0,
    };
}

/// 设备回传头部
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FeedbackHeader {
    /// 本帧结束时的活跃粒子数
    pub live_count: u32,
    /// 因容量不足在设备端丢弃的生成数
    pub dropped: u32,
    /// 本帧触发的爆发事件数
    pub burst_count: u32,
    pub _pad: u32,
}

/// 设备端爆发事件
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuBurstEvent {
    pub id: u32,
    pub _pad: u32,
    pub position: [f32; 2],
    pub hue: f32,
    pub saturation: f32,
    pub brightness: f32,
    pub size: f32,
}

impl GpuBurstEvent {
    pub fn to_event(&self) -> BurstEvent {
        BurstEvent {
            particle: ParticleId(self.id),
            position: Vec2::from(self.position),
            hue: self.hue,
            saturation: self.saturation,
            brightness: self.brightness,
            size: self.size,
        }
    }
}

const _: () = assert!(std::mem::size_of::<RasterInstance>() == 32);
const _: () = assert!(std::mem::size_of::<GpuParticle>() == 96);
const _: () = assert!(std::mem::size_of::<GpuParticle>() % 16 == 0);
const _: () = assert!(std::mem::size_of::<SimUniforms>() == 48);
const _: () = assert!(std::mem::size_of::<ViewUniforms>() == 16);
const _: () = assert!(std::mem::size_of::<DrawArgs>() == 20);
const _: () = assert!(std::mem::size_of::<FeedbackHeader>() == 16);
const _: () = assert!(std::mem::size_of::<GpuBurstEvent>() == 32);

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::offset_of;

    #[test]
    fn test_raster_instance_field_order() {
        assert_eq!(offset_of!(RasterInstance, position), 0);
        assert_eq!(offset_of!(RasterInstance, size), 8);
        assert_eq!(offset_of!(RasterInstance, alpha), 12);
        assert_eq!(offset_of!(RasterInstance, hue), 16);
        assert_eq!(offset_of!(RasterInstance, saturation), 20);
        assert_eq!(offset_of!(RasterInstance, brightness), 24);
        assert_eq!(offset_of!(RasterInstance, rotation), 28);

        let layout = RasterInstance::vertex_buffer_layout();
        assert_eq!(layout.array_stride, 32);
        assert_eq!(layout.step_mode, wgpu::VertexStepMode::Instance);
        assert_eq!(layout.attributes.len(), 7);
    }

    #[test]
    fn test_gpu_particle_offsets() {
        assert_eq!(offset_of!(GpuParticle, velocity), 8);
        assert_eq!(offset_of!(GpuParticle, size), 16);
        assert_eq!(offset_of!(GpuParticle, alpha), 32);
        assert_eq!(offset_of!(GpuParticle, burst_state), 56);
        assert_eq!(offset_of!(GpuParticle, spiral_state), 68);
        assert_eq!(offset_of!(GpuParticle, shape), 76);
        assert_eq!(offset_of!(GpuParticle, id), 80);
        assert_eq!(offset_of!(GpuParticle, _padding), 84);
    }

    #[test]
    fn test_quad_indices_cover_two_triangles() {
        assert_eq!(QuadVertex::INDICES.len(), 6);
        assert!(QuadVertex::INDICES.iter().all(|&i| (i as usize) < QuadVertex::CORNERS.len()));
        assert_eq!(DrawArgs::EMPTY.index_count, 6);
    }

    #[test]
    fn test_sim_uniforms_time_shift_offset() {
        assert_eq!(offset_of!(SimUniforms, canvas_size), 32);
        assert_eq!(offset_of!(SimUniforms, time_shift), 40);
    }
}
