//! SoA (Structure of Arrays) 粒子存储
//!
//! 所有列在构造时按容量一次性分配，之后生成、模拟、压缩都不会再触发堆分配。
//! 活跃粒子始终位于 `[0, live_count)`，死亡粒子通过 swap-remove 移出。

use super::integrator::wrap_angle;
use crate::config::OverflowPolicy;
use crate::render::shapes::ShapeType;
use glam::Vec2;
use thiserror::Error;

/// 生成错误
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnError {
    /// 存储已满，新粒子被丢弃
    #[error("Particle store is full (capacity {capacity})")]
    Full { capacity: usize },
}

/// 粒子句柄
///
/// 句柄在粒子生命周期内稳定，与存储中的槽位无关。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticleId(pub u32);

/// 延迟爆发状态
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BurstState {
    /// 没有爆发
    #[default]
    None = 0,
    /// 等待延迟到期
    Pending = 1,
    /// 已触发，等待主机读取
    Triggered = 2,
    /// 主机已读取
    Consumed = 3,
}

impl BurstState {
    /// 从 GPU 编码还原
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::Pending,
            2 => Self::Triggered,
            3 => Self::Consumed,
            _ => Self::None,
        }
    }

    #[inline]
    pub fn as_raw(self) -> u32 {
        self as u32
    }
}

/// 生成请求
///
/// 除位置外所有字段都有默认值。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnRequest {
    pub position: Vec2,
    pub velocity: Vec2,
    pub size: f32,
    pub hue: f32,
    pub saturation: f32,
    pub brightness: f32,
    pub lifespan: f32,
    pub decay: f32,
    pub rotation: f32,
    pub rotation_speed: f32,
    pub mass: f32,
    /// 形状原始编码，未知值在着色时回退为圆形
    pub shape: u32,
    pub burst_delay: Option<f32>,
    pub spiral_delay: Option<f32>,
    pub image_index: Option<u32>,
}

impl SpawnRequest {
    /// 在指定位置创建默认请求
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            size: 4.0,
            hue: 0.0,
            saturation: 100.0,
            brightness: 100.0,
            lifespan: 1.0,
            decay: 1.0,
            rotation: 0.0,
            rotation_speed: 0.0,
            mass: 1.0,
            shape: ShapeType::Circle.as_raw(),
            burst_delay: None,
            spiral_delay: None,
            image_index: None,
        }
    }

    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }

    /// 设置颜色（色相度数，饱和度与亮度 0-100）
    pub fn with_color(mut self, hue: f32, saturation: f32, brightness: f32) -> Self {
        self.hue = hue;
        self.saturation = saturation;
        self.brightness = brightness;
        self
    }

    pub fn with_lifespan(mut self, lifespan: f32) -> Self {
        self.lifespan = lifespan;
        self
    }

    pub fn with_decay(mut self, decay: f32) -> Self {
        self.decay = decay;
        self
    }

    pub fn with_rotation(mut self, rotation: f32, rotation_speed: f32) -> Self {
        self.rotation = rotation;
        self.rotation_speed = rotation_speed;
        self
    }

    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_shape(mut self, shape: ShapeType) -> Self {
        self.shape = shape.as_raw();
        self
    }

    /// 直接使用外部传入的形状编码
    pub fn with_shape_raw(mut self, shape: u32) -> Self {
        self.shape = shape;
        self
    }

    /// 在 `delay` 秒后触发一次爆发
    pub fn with_burst(mut self, delay: f32) -> Self {
        self.burst_delay = Some(delay);
        self
    }

    /// 在 `delay` 秒后进入螺旋运动
    pub fn with_spiral(mut self, delay: f32) -> Self {
        self.spiral_delay = Some(delay);
        self
    }

    pub fn with_image(mut self, index: u32) -> Self {
        self.image_index = Some(index);
        self
    }
}

/// 爆发事件，由主机用来生成二次粒子
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurstEvent {
    pub particle: ParticleId,
    pub position: Vec2,
    pub hue: f32,
    pub saturation: f32,
    pub brightness: f32,
    pub size: f32,
}

/// 单个粒子的只读快照
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleView {
    pub id: ParticleId,
    pub position: Vec2,
    pub velocity: Vec2,
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
    pub shape: u32,
    pub burst: BurstState,
    pub burst_delay: f32,
    pub spawn_time: f32,
    pub spiral: bool,
    pub spiral_delay: f32,
    pub image_index: Option<u32>,
}

impl ParticleView {
    /// 解析后的形状
    pub fn shape_type(&self) -> ShapeType {
        ShapeType::from_raw(self.shape)
    }
}

/// 活跃范围内各列的只读切片
pub struct Columns<'a> {
    pub ids: &'a [ParticleId],
    pub positions: &'a [Vec2],
    pub velocities: &'a [Vec2],
    pub size: &'a [f32],
    pub hue: &'a [f32],
    pub saturation: &'a [f32],
    pub brightness: &'a [f32],
    pub alpha: &'a [f32],
    pub lifespan: &'a [f32],
    pub decay: &'a [f32],
    pub rotation: &'a [f32],
    pub rotation_speed: &'a [f32],
    pub mass: &'a [f32],
    pub shape: &'a [u32],
    pub burst: &'a [BurstState],
    pub burst_delay: &'a [f32],
    pub spawn_time: &'a [f32],
    pub spiral: &'a [bool],
    pub spiral_delay: &'a [f32],
}

/// 积分器修改的列
pub struct ColumnsMut<'a> {
    pub positions: &'a mut [Vec2],
    pub velocities: &'a mut [Vec2],
    pub alpha: &'a mut [f32],
    pub lifespan: &'a mut [f32],
    pub decay: &'a [f32],
    pub rotation: &'a mut [f32],
    pub rotation_speed: &'a [f32],
    pub burst: &'a mut [BurstState],
    pub burst_delay: &'a [f32],
    pub spawn_time: &'a [f32],
    pub spiral: &'a [bool],
    pub spiral_delay: &'a [f32],
}

/// SoA 粒子存储
pub struct ParticleStore {
    capacity: usize,
    overflow: OverflowPolicy,
    live: usize,

    ids: Vec<ParticleId>,
    positions: Vec<Vec2>,
    velocities: Vec<Vec2>,
    size: Vec<f32>,
    hue: Vec<f32>,
    saturation: Vec<f32>,
    brightness: Vec<f32>,
    alpha: Vec<f32>,
    lifespan: Vec<f32>,
    decay: Vec<f32>,
    rotation: Vec<f32>,
    rotation_speed: Vec<f32>,
    mass: Vec<f32>,
    shape: Vec<u32>,
    burst: Vec<BurstState>,
    burst_delay: Vec<f32>,
    spawn_time: Vec<f32>,
    spiral: Vec<bool>,
    spiral_delay: Vec<f32>,
    image_index: Vec<Option<u32>>,

    next_id: u32,
    total_spawned: u64,
    dropped_spawns: u64,
    evicted: u64,
}

impl ParticleStore {
    /// 创建固定容量的存储
    ///
    /// # 参数
    ///
    /// * `capacity` - 最大粒子数量
    /// * `overflow` - 存储已满时的处理策略
    pub fn with_capacity(capacity: usize, overflow: OverflowPolicy) -> Self {
        tracing::debug!(
            target: "particles",
            "Allocating particle store: capacity={}, overflow={:?}",
            capacity,
            overflow
        );

        Self {
            capacity,
            overflow,
            live: 0,
            ids: vec![ParticleId(0); capacity],
            positions: vec![Vec2::ZERO; capacity],
            velocities: vec![Vec2::ZERO; capacity],
            size: vec![0.0; capacity],
            hue: vec![0.0; capacity],
            saturation: vec![0.0; capacity],
            brightness: vec![0.0; capacity],
            alpha: vec![0.0; capacity],
            lifespan: vec![0.0; capacity],
            decay: vec![0.0; capacity],
            rotation: vec![0.0; capacity],
            rotation_speed: vec![0.0; capacity],
            mass: vec![0.0; capacity],
            shape: vec![0; capacity],
            burst: vec![BurstState::None; capacity],
            burst_delay: vec![0.0; capacity],
            spawn_time: vec![0.0; capacity],
            spiral: vec![false; capacity],
            spiral_delay: vec![0.0; capacity],
            image_index: vec![None; capacity],
            next_id: 0,
            total_spawned: 0,
            dropped_spawns: 0,
            evicted: 0,
        }
    }

    /// 分配一个粒子
    ///
    /// # 参数
    ///
    /// * `request` - 生成参数
    /// * `now` - 当前模拟时钟，作为生成时间戳
    ///
    /// # 返回
    ///
    /// 成功时返回新粒子句柄。存储已满且策略为 `DropNewest` 时返回
    /// `SpawnError::Full` 并计入丢弃统计；策略为 `EvictWeakest` 时覆盖剩余寿命最短的粒子。
    pub fn allocate(&mut self, request: &SpawnRequest, now: f32) -> Result<ParticleId, SpawnError> {
        let slot = if self.live < self.capacity {
            let slot = self.live;
            self.live += 1;
            slot
        } else {
            match self.overflow {
                OverflowPolicy::DropNewest => {
                    self.dropped_spawns += 1;
                    tracing::trace!(target: "particles", "Spawn dropped: store full");
                    return Err(SpawnError::Full {
                        capacity: self.capacity,
                    });
                }
                OverflowPolicy::EvictWeakest => match self.weakest_slot() {
                    Some(slot) => {
                        self.evicted += 1;
                        tracing::trace!(
                            target: "particles",
                            "Evicting particle {:?} to make room",
                            self.ids[slot]
                        );
                        slot
                    }
                    None => {
                        // 容量为零
                        self.dropped_spawns += 1;
                        return Err(SpawnError::Full {
                            capacity: self.capacity,
                        });
                    }
                },
            }
        };

        let id = ParticleId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.total_spawned += 1;
        self.write_slot(slot, id, request, now);
        Ok(id)
    }

    fn write_slot(&mut self, slot: usize, id: ParticleId, r: &SpawnRequest, now: f32) {
        self.ids[slot] = id;
        self.positions[slot] = r.position;
        self.velocities[slot] = r.velocity;
        self.size[slot] = r.size;
        self.hue[slot] = r.hue;
        self.saturation[slot] = r.saturation;
        self.brightness[slot] = r.brightness;
        self.lifespan[slot] = r.lifespan;
        self.alpha[slot] = r.lifespan.clamp(0.0, 1.0);
        self.decay[slot] = r.decay;
        self.rotation[slot] = wrap_angle(r.rotation);
        self.rotation_speed[slot] = r.rotation_speed;
        self.mass[slot] = r.mass;
        self.shape[slot] = r.shape;
        self.burst[slot] = if r.burst_delay.is_some() {
            BurstState::Pending
        } else {
            BurstState::None
        };
        self.burst_delay[slot] = r.burst_delay.unwrap_or(0.0);
        self.spawn_time[slot] = now;
        self.spiral[slot] = r.spiral_delay.is_some();
        self.spiral_delay[slot] = r.spiral_delay.unwrap_or(0.0);
        self.image_index[slot] = r.image_index;
    }

    /// 剩余寿命最短的槽位，线性扫描活跃范围
    fn weakest_slot(&self) -> Option<usize> {
        self.lifespan[..self.live]
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(slot, _)| slot)
    }

    fn move_slot(&mut self, from: usize, to: usize) {
        self.ids[to] = self.ids[from];
        self.positions[to] = self.positions[from];
        self.velocities[to] = self.velocities[from];
        self.size[to] = self.size[from];
        self.hue[to] = self.hue[from];
        self.saturation[to] = self.saturation[from];
        self.brightness[to] = self.brightness[from];
        self.alpha[to] = self.alpha[from];
        self.lifespan[to] = self.lifespan[from];
        self.decay[to] = self.decay[from];
        self.rotation[to] = self.rotation[from];
        self.rotation_speed[to] = self.rotation_speed[from];
        self.mass[to] = self.mass[from];
        self.shape[to] = self.shape[from];
        self.burst[to] = self.burst[from];
        self.burst_delay[to] = self.burst_delay[from];
        self.spawn_time[to] = self.spawn_time[from];
        self.spiral[to] = self.spiral[from];
        self.spiral_delay[to] = self.spiral_delay[from];
        self.image_index[to] = self.image_index[from];
    }

    /// 移除所有死亡粒子
    ///
    /// 每个死亡粒子由末尾的活跃粒子填补（swap-remove），活跃粒子的相对顺序不保证。
    ///
    /// # 返回
    ///
    /// 被移除的粒子数量
    pub fn release_dead(&mut self) -> usize {
        let mut removed = 0;
        let mut i = 0;
        while i < self.live {
            if self.lifespan[i] <= 0.0 {
                let last = self.live - 1;
                if i != last {
                    self.move_slot(last, i);
                }
                self.live -= 1;
                removed += 1;
            } else {
                i += 1;
            }
        }
        removed
    }

    /// 立即清空所有粒子
    pub fn clear(&mut self) {
        if self.live > 0 {
            tracing::debug!(target: "particles", "Clearing {} live particles", self.live);
        }
        self.live = 0;
    }

    /// 时钟纪元前移后平移所有生成时间，粒子年龄不变
    pub fn rebase_spawn_times(&mut self, shift: f32) {
        for t in &mut self.spawn_time[..self.live] {
            *t -= shift;
        }
    }

    /// 交给设备端后丢弃暂存的生成，不计入清空
    pub(crate) fn discard_staged(&mut self) {
        self.live = 0;
    }

    /// 读取已触发的爆发并标记为已消费
    ///
    /// 事件追加到 `out`，调用方复用同一个 `Vec` 时不产生分配。
    ///
    /// # 返回
    ///
    /// 本次追加的事件数量
    pub fn drain_triggered_bursts(&mut self, out: &mut Vec<BurstEvent>) -> usize {
        let mut count = 0;
        for i in 0..self.live {
            if self.burst[i] == BurstState::Triggered {
                self.burst[i] = BurstState::Consumed;
                out.push(BurstEvent {
                    particle: self.ids[i],
                    position: self.positions[i],
                    hue: self.hue[i],
                    saturation: self.saturation[i],
                    brightness: self.brightness[i],
                    size: self.size[i],
                });
                count += 1;
            }
        }
        count
    }

    /// 访问每个活跃粒子
    pub fn for_each_live<F: FnMut(ParticleView)>(&self, mut visitor: F) {
        for i in 0..self.live {
            visitor(self.view(i));
        }
    }

    /// 活跃粒子迭代器
    pub fn iter(&self) -> impl Iterator<Item = ParticleView> + '_ {
        (0..self.live).map(move |i| self.view(i))
    }

    /// 按句柄查找活跃粒子
    pub fn get(&self, id: ParticleId) -> Option<ParticleView> {
        self.ids[..self.live]
            .iter()
            .position(|&other| other == id)
            .map(|i| self.view(i))
    }

    fn view(&self, i: usize) -> ParticleView {
        ParticleView {
            id: self.ids[i],
            position: self.positions[i],
            velocity: self.velocities[i],
            size: self.size[i],
            hue: self.hue[i],
            saturation: self.saturation[i],
            brightness: self.brightness[i],
            alpha: self.alpha[i],
            lifespan: self.lifespan[i],
            decay: self.decay[i],
            rotation: self.rotation[i],
            rotation_speed: self.rotation_speed[i],
            mass: self.mass[i],
            shape: self.shape[i],
            burst: self.burst[i],
            burst_delay: self.burst_delay[i],
            spawn_time: self.spawn_time[i],
            spiral: self.spiral[i],
            spiral_delay: self.spiral_delay[i],
            image_index: self.image_index[i],
        }
    }

    /// 活跃范围的只读列视图
    pub fn columns(&self) -> Columns<'_> {
        let n = self.live;
        Columns {
            ids: &self.ids[..n],
            positions: &self.positions[..n],
            velocities: &self.velocities[..n],
            size: &self.size[..n],
            hue: &self.hue[..n],
            saturation: &self.saturation[..n],
            brightness: &self.brightness[..n],
            alpha: &self.alpha[..n],
            lifespan: &self.lifespan[..n],
            decay: &self.decay[..n],
            rotation: &self.rotation[..n],
            rotation_speed: &self.rotation_speed[..n],
            mass: &self.mass[..n],
            shape: &self.shape[..n],
            burst: &self.burst[..n],
            burst_delay: &self.burst_delay[..n],
            spawn_time: &self.spawn_time[..n],
            spiral: &self.spiral[..n],
            spiral_delay: &self.spiral_delay[..n],
        }
    }

    /// 积分器使用的可变列视图
    pub fn columns_mut(&mut self) -> ColumnsMut<'_> {
        let n = self.live;
        ColumnsMut {
            positions: &mut self.positions[..n],
            velocities: &mut self.velocities[..n],
            alpha: &mut self.alpha[..n],
            lifespan: &mut self.lifespan[..n],
            decay: &self.decay[..n],
            rotation: &mut self.rotation[..n],
            rotation_speed: &self.rotation_speed[..n],
            burst: &mut self.burst[..n],
            burst_delay: &self.burst_delay[..n],
            spawn_time: &self.spawn_time[..n],
            spiral: &self.spiral[..n],
            spiral_delay: &self.spiral_delay[..n],
        }
    }

    #[inline]
    pub fn live_count(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn overflow_policy(&self) -> OverflowPolicy {
        self.overflow
    }

    /// 累计生成数量
    pub fn total_spawned(&self) -> u64 {
        self.total_spawned
    }

    /// 因容量不足被丢弃的生成数量
    pub fn dropped_spawns(&self) -> u64 {
        self.dropped_spawns
    }

    /// 被驱逐的粒子数量
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// 记录在设备端被丢弃的生成
    pub(crate) fn record_dropped(&mut self, count: u64) {
        self.dropped_spawns += count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(capacity: usize) -> ParticleStore {
        ParticleStore::with_capacity(capacity, OverflowPolicy::DropNewest)
    }

    #[test]
    fn test_rebase_spawn_times_keeps_age() {
        let mut store = ParticleStore::with_capacity(4, OverflowPolicy::DropNewest);
        let a = store.allocate(&SpawnRequest::at(Vec2::ZERO), 1000.0).unwrap();
        let b = store.allocate(&SpawnRequest::at(Vec2::ZERO), 1023.5).unwrap();

        store.rebase_spawn_times(1024.0);
        assert_eq!(store.get(a).unwrap().spawn_time, -24.0);
        assert_eq!(store.get(b).unwrap().spawn_time, -0.5);
    }

    #[test]
    fn test_allocate_and_view() {
        let mut store = store(4);
        let request = SpawnRequest::at(Vec2::new(10.0, 20.0))
            .with_velocity(Vec2::new(1.0, 2.0))
            .with_color(120.0, 50.0, 75.0)
            .with_shape(ShapeType::Star)
            .with_image(7);

        let id = store.allocate(&request, 1.5).unwrap();
        assert_eq!(store.live_count(), 1);

        let view = store.get(id).unwrap();
        assert_eq!(view.position, Vec2::new(10.0, 20.0));
        assert_eq!(view.hue, 120.0);
        assert_eq!(view.alpha, 1.0);
        assert_eq!(view.spawn_time, 1.5);
        assert_eq!(view.shape_type(), ShapeType::Star);
        assert_eq!(view.image_index, Some(7));
        assert_eq!(view.burst, BurstState::None);
    }

    #[test]
    fn test_allocate_normalizes_rotation_and_alpha() {
        let mut store = store(2);
        let id = store
            .allocate(
                &SpawnRequest::at(Vec2::ZERO)
                    .with_rotation(-1.0, 0.0)
                    .with_lifespan(3.0),
                0.0,
            )
            .unwrap();
        let view = store.get(id).unwrap();
        assert!(view.rotation >= 0.0 && view.rotation < std::f32::consts::TAU);
        assert_eq!(view.alpha, 1.0);
    }

    #[test]
    fn test_drop_newest_counts_dropped() {
        let mut store = store(3);
        for _ in 0..3 {
            store.allocate(&SpawnRequest::at(Vec2::ZERO), 0.0).unwrap();
        }
        let err = store.allocate(&SpawnRequest::at(Vec2::ZERO), 0.0);
        assert_eq!(err, Err(SpawnError::Full { capacity: 3 }));
        assert_eq!(store.live_count(), 3);
        assert_eq!(store.dropped_spawns(), 1);
        assert_eq!(store.total_spawned(), 3);
    }

    #[test]
    fn test_evict_weakest_replaces_shortest_lived() {
        let mut store = ParticleStore::with_capacity(3, OverflowPolicy::EvictWeakest);
        let a = store
            .allocate(&SpawnRequest::at(Vec2::ZERO).with_lifespan(0.9), 0.0)
            .unwrap();
        let b = store
            .allocate(&SpawnRequest::at(Vec2::ZERO).with_lifespan(0.2), 0.0)
            .unwrap();
        let c = store
            .allocate(&SpawnRequest::at(Vec2::ZERO).with_lifespan(0.5), 0.0)
            .unwrap();

        let d = store.allocate(&SpawnRequest::at(Vec2::ONE), 0.0).unwrap();
        assert_eq!(store.live_count(), 3);
        assert_eq!(store.evicted(), 1);
        assert_eq!(store.dropped_spawns(), 0);
        assert!(store.get(b).is_none());
        assert!(store.get(a).is_some());
        assert!(store.get(c).is_some());
        assert_eq!(store.get(d).unwrap().position, Vec2::ONE);
    }

    #[test]
    fn test_release_dead_swap_removes() {
        let mut store = store(5);
        let ids: Vec<_> = (0..5)
            .map(|i| {
                store
                    .allocate(&SpawnRequest::at(Vec2::splat(i as f32)), 0.0)
                    .unwrap()
            })
            .collect();

        // 杀死第 1 和第 4 个粒子
        {
            let mut cols = store.columns_mut();
            cols.lifespan[1] = 0.0;
            cols.lifespan[4] = -0.5;
        }

        assert_eq!(store.release_dead(), 2);
        assert_eq!(store.live_count(), 3);
        assert!(store.get(ids[1]).is_none());
        assert!(store.get(ids[4]).is_none());
        for id in [ids[0], ids[2], ids[3]] {
            assert!(store.get(id).is_some());
        }
        // 最后一个存活粒子被移动到空出的槽位
        assert_eq!(store.columns().ids[1], ids[3]);
        assert!(store.iter().all(|p| p.lifespan > 0.0));
    }

    #[test]
    fn test_release_dead_handles_all_dead() {
        let mut store = store(4);
        for _ in 0..4 {
            store
                .allocate(&SpawnRequest::at(Vec2::ZERO).with_lifespan(0.0), 0.0)
                .unwrap();
        }
        assert_eq!(store.release_dead(), 4);
        assert!(store.is_empty());
    }

    #[test]
    fn test_clear_is_immediate() {
        let mut store = store(8);
        for _ in 0..8 {
            store.allocate(&SpawnRequest::at(Vec2::ZERO), 0.0).unwrap();
        }
        store.clear();
        assert_eq!(store.live_count(), 0);
        assert_eq!(store.iter().count(), 0);
        assert!(store.allocate(&SpawnRequest::at(Vec2::ZERO), 0.0).is_ok());
    }

    #[test]
    fn test_drain_triggered_bursts_once() {
        let mut store = store(4);
        let id = store
            .allocate(&SpawnRequest::at(Vec2::new(3.0, 4.0)).with_burst(0.5), 0.0)
            .unwrap();
        store.allocate(&SpawnRequest::at(Vec2::ZERO), 0.0).unwrap();
        assert_eq!(store.get(id).unwrap().burst, BurstState::Pending);

        store.columns_mut().burst[0] = BurstState::Triggered;

        let mut events = Vec::with_capacity(4);
        assert_eq!(store.drain_triggered_bursts(&mut events), 1);
        assert_eq!(events[0].particle, id);
        assert_eq!(events[0].position, Vec2::new(3.0, 4.0));
        assert_eq!(store.get(id).unwrap().burst, BurstState::Consumed);

        events.clear();
        assert_eq!(store.drain_triggered_bursts(&mut events), 0);
    }

    #[test]
    fn test_columns_track_live_range() {
        let mut store = store(16);
        for _ in 0..5 {
            store.allocate(&SpawnRequest::at(Vec2::ZERO), 0.0).unwrap();
        }
        assert_eq!(store.columns().positions.len(), 5);
        assert_eq!(store.columns_mut().lifespan.len(), 5);
        assert_eq!(store.capacity(), 16);
    }

    #[test]
    fn test_burst_state_raw_fallback() {
        assert_eq!(BurstState::from_raw(2), BurstState::Triggered);
        assert_eq!(BurstState::from_raw(17), BurstState::None);
    }
}
