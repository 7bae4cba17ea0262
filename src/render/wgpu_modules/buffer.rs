//! WGPU 缓冲区管理
//!
//! 所有缓冲区在初始化时按容量创建，每帧复用。
//!
//! - `QuadBuffers`: 共享的四边形顶点与索引
//! - `DoubleBufferedInstances`: 光栅化路径的实例流与形状流（ping-pong）
//! - `ParticleBuffers`: 计算路径的粒子状态与间接绘制参数（ping-pong）
//! - `FeedbackReadback`: 设备回传块的双缓冲异步回读

use super::types::{DrawArgs, FeedbackHeader, GpuBurstEvent, GpuParticle, QuadVertex, RasterInstance};
use crate::simulation::BurstEvent;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use wgpu::util::DeviceExt;

/// 四边形顶点与索引缓冲区
pub struct QuadBuffers {
    pub vertices: wgpu::Buffer,
    pub indices: wgpu::Buffer,
}

impl QuadBuffers {
    pub fn new(device: &wgpu::Device) -> Self {
        let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Quad Vertices"),
            contents: bytemuck::cast_slice(&QuadVertex::CORNERS),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Quad Indices"),
            contents: bytemuck::cast_slice(&QuadVertex::INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self { vertices, indices }
    }

    /// 索引数量
    pub fn index_count(&self) -> u32 {
        QuadVertex::INDICES.len() as u32
    }
}

/// 双缓冲实例管理器
///
/// 写入后台缓冲区再交换，上一帧仍在使用的缓冲区不会被覆盖。
pub struct DoubleBufferedInstances {
    /// 两个实例缓冲区 (ping-pong)
    instances: [wgpu::Buffer; 2],
    /// 与实例一一对应的形状编号缓冲区
    shapes: [wgpu::Buffer; 2],
    /// 当前活动缓冲区索引
    active_idx: usize,
    /// 缓冲区容量 (实例数)
    capacity: u32,
    /// 当前实例数
    count: u32,
}

impl DoubleBufferedInstances {
    /// 创建双缓冲实例管理器
    pub fn new(device: &wgpu::Device, capacity: u32) -> Self {
        let instance_size =
            (capacity.max(1) as usize * std::mem::size_of::<RasterInstance>()) as wgpu::BufferAddress;
        let shape_size = (capacity.max(1) as usize * std::mem::size_of::<u32>()) as wgpu::BufferAddress;

        let vertex_buffer = |label: &str, size| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };

        Self {
            instances: [
                vertex_buffer("Particle Instance Buffer 0", instance_size),
                vertex_buffer("Particle Instance Buffer 1", instance_size),
            ],
            shapes: [
                vertex_buffer("Particle Shape Buffer 0", shape_size),
                vertex_buffer("Particle Shape Buffer 1", shape_size),
            ],
            active_idx: 0,
            capacity,
            count: 0,
        }
    }

    /// 当前活动实例缓冲区 (用于渲染)
    pub fn active_instances(&self) -> &wgpu::Buffer {
        &self.instances[self.active_idx]
    }

    /// 当前活动形状缓冲区 (用于渲染)
    pub fn active_shapes(&self) -> &wgpu::Buffer {
        &self.shapes[self.active_idx]
    }

    /// 上传到后台缓冲区并交换
    ///
    /// # Panics
    ///
    /// 数据长度超过容量或两个流长度不一致时触发断言。
    pub fn upload(&mut self, queue: &wgpu::Queue, instances: &[RasterInstance], shapes: &[u32]) {
        assert_eq!(instances.len(), shapes.len(), "instance and shape streams differ");
        assert!(
            instances.len() <= self.capacity as usize,
            "upload of {} instances exceeds capacity {}",
            instances.len(),
            self.capacity
        );

        let back = 1 - self.active_idx;
        self.count = instances.len() as u32;
        if !instances.is_empty() {
            queue.write_buffer(&self.instances[back], 0, bytemuck::cast_slice(instances));
            queue.write_buffer(&self.shapes[back], 0, bytemuck::cast_slice(shapes));
        }
        self.active_idx = back;
    }

    /// 获取当前实例数
    pub fn count(&self) -> u32 {
        self.count
    }

    /// 丢弃当前实例
    pub fn reset(&mut self) {
        self.count = 0;
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

/// 计算路径的 ping-pong 粒子状态
///
/// 每帧从 `current` 读取、写入 `next`，绘制使用 `next`，随后交换。
pub struct ParticleBuffers {
    particles: [wgpu::Buffer; 2],
    args: [wgpu::Buffer; 2],
    /// 本帧新生成粒子的暂存区
    pub spawns: wgpu::Buffer,
    current: usize,
    capacity: u32,
}

impl ParticleBuffers {
    pub fn new(device: &wgpu::Device, capacity: u32) -> Self {
        let particle_size =
            (capacity.max(1) as usize * std::mem::size_of::<GpuParticle>()) as wgpu::BufferAddress;

        let particle_buffer = |label: &str| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: particle_size,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        let args_buffer = |label: &str| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::bytes_of(&DrawArgs::EMPTY),
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::INDIRECT
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
            })
        };

        Self {
            particles: [
                particle_buffer("Particle State 0"),
                particle_buffer("Particle State 1"),
            ],
            args: [
                args_buffer("Particle Draw Args 0"),
                args_buffer("Particle Draw Args 1"),
            ],
            spawns: particle_buffer("Particle Spawn Staging"),
            current: 0,
            capacity,
        }
    }

    /// 当前状态索引
    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn particles(&self, index: usize) -> &wgpu::Buffer {
        &self.particles[index]
    }

    pub fn args(&self, index: usize) -> &wgpu::Buffer {
        &self.args[index]
    }

    /// 当前帧的目标缓冲区
    pub fn next(&self) -> (&wgpu::Buffer, &wgpu::Buffer) {
        let next = 1 - self.current;
        (&self.particles[next], &self.args[next])
    }

    /// 交换前后缓冲区
    pub fn swap(&mut self) {
        self.current = 1 - self.current;
    }

    /// 重置两侧的绘制参数，粒子数立即归零
    pub fn reset(&self, queue: &wgpu::Queue) {
        for args in &self.args {
            queue.write_buffer(args, 0, bytemuck::bytes_of(&DrawArgs::EMPTY));
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

const SLOT_IDLE: u8 = 0;
const SLOT_COPIED: u8 = 1;
const SLOT_MAPPING: u8 = 2;
const SLOT_READY: u8 = 3;
const SLOT_FAILED: u8 = 4;

/// 一次回收的回传汇总
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedbackSummary {
    /// 取出的回传帧数
    pub frames: u32,
    /// 最近一帧结束时的设备活跃粒子数
    pub live_count: u32,
    /// 设备端因容量不足丢弃的生成数
    pub dropped: u64,
    /// 超出事件环而未能回传的事件数
    pub overflowed: u64,
}

/// 设备回传块与双缓冲异步回读
///
/// 每帧将回传块复制到空闲的回读缓冲区，提交后异步映射；
/// 后续帧在映射完成时取出数据。调用方需保证复制前有空闲的回读缓冲区。
pub struct FeedbackReadback {
    /// 着色器写入的回传块
    pub device_buffer: wgpu::Buffer,
    readback: [wgpu::Buffer; 2],
    states: [Arc<AtomicU8>; 2],
    sequence: [u64; 2],
    next_sequence: u64,
    size: wgpu::BufferAddress,
    max_events: u32,
}

impl FeedbackReadback {
    pub fn new(device: &wgpu::Device, max_events: u32) -> Self {
        let size = Self::buffer_size(max_events);
        let device_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Feedback"),
            size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let readback_buffer = |label: &str| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };

        Self {
            device_buffer,
            readback: [
                readback_buffer("Particle Feedback Readback 0"),
                readback_buffer("Particle Feedback Readback 1"),
            ],
            states: [
                Arc::new(AtomicU8::new(SLOT_IDLE)),
                Arc::new(AtomicU8::new(SLOT_IDLE)),
            ],
            sequence: [0; 2],
            next_sequence: 0,
            size,
            max_events,
        }
    }

    /// 计算路径每帧所需的事件环长度
    ///
    /// 一帧最多推进 `capacity` 个存活粒子与 `capacity` 个新粒子，
    /// 每个粒子每帧至多触发一次爆发，按此分配的事件环不会溢出。
    pub fn event_ring_size(capacity: u32) -> u32 {
        capacity.saturating_mul(2).max(1)
    }

    /// 回传块字节数
    pub fn buffer_size(max_events: u32) -> wgpu::BufferAddress {
        (std::mem::size_of::<FeedbackHeader>()
            + max_events.max(1) as usize * std::mem::size_of::<GpuBurstEvent>())
            as wgpu::BufferAddress
    }

    /// 清零头部，在每帧模拟前调用
    pub fn reset_header(&self, queue: &wgpu::Queue) {
        queue.write_buffer(
            &self.device_buffer,
            0,
            bytemuck::bytes_of(&FeedbackHeader::default()),
        );
    }

    /// 是否有可用于本帧复制的回读缓冲区
    pub fn has_idle_slot(&self) -> bool {
        self.states
            .iter()
            .any(|state| state.load(Ordering::Acquire) == SLOT_IDLE)
    }

    /// 将回传块复制到空闲回读缓冲区
    ///
    /// # 返回
    ///
    /// 没有空闲回读缓冲区时返回 `false`
    pub fn encode_copy(&mut self, encoder: &mut wgpu::CommandEncoder) -> bool {
        let Some(slot) = (0..2).find(|&i| self.states[i].load(Ordering::Acquire) == SLOT_IDLE)
        else {
            tracing::warn!(target: "particle_render", "Feedback readback busy, frame not copied");
            return false;
        };

        encoder.copy_buffer_to_buffer(&self.device_buffer, 0, &self.readback[slot], 0, self.size);
        self.states[slot].store(SLOT_COPIED, Ordering::Release);
        self.sequence[slot] = self.next_sequence;
        self.next_sequence += 1;
        true
    }

    /// 提交之后为已复制的缓冲区发起映射
    pub fn request_maps(&self) {
        for slot in 0..2 {
            if self.states[slot].load(Ordering::Acquire) != SLOT_COPIED {
                continue;
            }
            self.states[slot].store(SLOT_MAPPING, Ordering::Release);
            let state = Arc::clone(&self.states[slot]);
            self.readback[slot]
                .slice(..)
                .map_async(wgpu::MapMode::Read, move |result| {
                    let next = if result.is_ok() { SLOT_READY } else { SLOT_FAILED };
                    state.store(next, Ordering::Release);
                });
        }
    }

    /// 取出已完成映射的回传数据，按提交顺序处理
    ///
    /// 头部计数汇总到 `summary`，事件追加到 `events`，不分配新的缓冲区。
    /// `wait` 为真时阻塞直到所有映射完成。
    pub fn collect(
        &mut self,
        device: &wgpu::Device,
        wait: bool,
        summary: &mut FeedbackSummary,
        events: &mut Vec<BurstEvent>,
    ) {
        *summary = FeedbackSummary::default();
        let maintain = if wait {
            wgpu::Maintain::Wait
        } else {
            wgpu::Maintain::Poll
        };
        device.poll(maintain);

        let order = if self.sequence[0] <= self.sequence[1] {
            [0, 1]
        } else {
            [1, 0]
        };
        for slot in order {
            match self.states[slot].load(Ordering::Acquire) {
                SLOT_READY => {
                    self.read_slot(slot, summary, events);
                    self.readback[slot].unmap();
                    self.states[slot].store(SLOT_IDLE, Ordering::Release);
                }
                SLOT_FAILED => {
                    tracing::warn!(target: "particle_render", "Feedback readback map failed");
                    self.states[slot].store(SLOT_IDLE, Ordering::Release);
                }
                _ => {}
            }
        }
    }

    fn read_slot(&self, slot: usize, summary: &mut FeedbackSummary, events: &mut Vec<BurstEvent>) {
        let data = self.readback[slot].slice(..).get_mapped_range();
        let header_size = std::mem::size_of::<FeedbackHeader>();
        let header: FeedbackHeader = bytemuck::pod_read_unaligned(&data[..header_size]);

        summary.frames += 1;
        summary.live_count = header.live_count;
        summary.dropped += header.dropped as u64;

        let event_count = header.burst_count.min(self.max_events);
        summary.overflowed += (header.burst_count - event_count) as u64;

        let event_size = std::mem::size_of::<GpuBurstEvent>();
        events.extend((0..event_count as usize).map(|i| {
            let start = header_size + i * event_size;
            let raw: GpuBurstEvent = bytemuck::pod_read_unaligned(&data[start..start + event_size]);
            raw.to_event()
        }));
    }

    pub fn max_events(&self) -> u32 {
        self.max_events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feedback_buffer_size() {
        assert_eq!(FeedbackReadback::buffer_size(0), 16 + 32);
        assert_eq!(FeedbackReadback::buffer_size(256), 16 + 256 * 32);
    }

    #[test]
    fn test_event_ring_holds_every_particle_of_a_frame() {
        assert_eq!(FeedbackReadback::event_ring_size(0), 1);
        assert_eq!(FeedbackReadback::event_ring_size(1), 2);
        assert_eq!(FeedbackReadback::event_ring_size(10_000), 20_000);
        assert_eq!(FeedbackReadback::event_ring_size(u32::MAX), u32::MAX);
    }
}
