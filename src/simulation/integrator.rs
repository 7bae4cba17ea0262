//! 物理积分器
//!
//! 对每个活跃粒子按固定顺序推进一个时间步：重力、指数阻力、位置、旋转、
//! 寿命衰减、alpha、延迟爆发检测、螺旋力，最后是可选的边界回绕。
//! 积分器只标记爆发就绪，从不自行生成粒子。

use super::store::{BurstState, ParticleStore};
use crate::config::{BoundaryMode, SimulationConfig};
use glam::Vec2;
use std::f32::consts::TAU;

/// 单帧模拟参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameUniforms {
    /// 已推进后的模拟时钟（秒）
    pub time: f32,
    /// 时间步长（秒）
    pub delta_time: f32,
    /// 重力（像素/秒²）
    pub gravity: f32,
    /// 空气阻力（每秒保留的速度比例）
    pub air_resistance: f32,
    /// `air_resistance.powf(delta_time)`，每帧在主机端计算一次
    pub drag_factor: f32,
    /// 螺旋力（像素/秒²）
    pub spiral_force: f32,
    pub boundary: BoundaryMode,
    pub canvas_size: Vec2,
    /// 本帧时钟纪元前移量；主机存储已自行平移，只有设备端粒子使用
    pub time_shift: f32,
}

impl FrameUniforms {
    /// 根据配置构建帧参数
    ///
    /// # 参数
    ///
    /// * `config` - 模拟配置
    /// * `time` - 已推进后的模拟时钟
    /// * `delta_time` - 本帧时间步长
    pub fn new(config: &SimulationConfig, time: f32, delta_time: f32) -> Self {
        Self {
            time,
            delta_time,
            gravity: config.gravity,
            air_resistance: config.air_resistance,
            drag_factor: config.air_resistance.powf(delta_time),
            spiral_force: config.spiral_force,
            boundary: config.boundary,
            canvas_size: Vec2::from(config.canvas_size),
            time_shift: 0.0,
        }
    }

    pub fn with_time_shift(mut self, shift: f32) -> Self {
        self.time_shift = shift;
        self
    }
}

/// 单步积分结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    /// 本步处理的活跃粒子数
    pub processed: usize,
    /// 本步死亡的粒子数
    pub died: usize,
    /// 本步触发的爆发数
    pub bursts_triggered: usize,
}

/// 将角度规范到 `[0, 2π)`
///
/// 浮点舍入可能让结果恰好等于 2π，此时归零。非有限值同样归零。
#[inline]
pub fn wrap_angle(angle: f32) -> f32 {
    let mut wrapped = angle - TAU * (angle / TAU).floor();
    if wrapped < 0.0 {
        wrapped += TAU;
    }
    if wrapped >= TAU || !wrapped.is_finite() {
        wrapped = 0.0;
    }
    wrapped
}

/// 将坐标回绕到 `[0, extent)`
#[inline]
fn wrap_coord(value: f32, extent: f32) -> f32 {
    value - extent * (value / extent).floor()
}

/// 物理积分器
pub struct PhysicsIntegrator;

impl PhysicsIntegrator {
    /// 推进所有活跃粒子一个时间步
    ///
    /// 入口处已经死亡（`lifespan <= 0`）的粒子被完全跳过。
    pub fn step(store: &mut ParticleStore, frame: &FrameUniforms) -> StepReport {
        let dt = frame.delta_time;
        let cols = store.columns_mut();
        let mut report = StepReport::default();

        for i in 0..cols.lifespan.len() {
            if cols.lifespan[i] <= 0.0 {
                continue;
            }
            report.processed += 1;

            let mut velocity = cols.velocities[i];
            velocity.y += frame.gravity * dt;
            velocity *= frame.drag_factor;

            let mut position = cols.positions[i] + velocity * dt;

            let rotation = wrap_angle(cols.rotation[i] + cols.rotation_speed[i] * dt);
            cols.rotation[i] = rotation;

            let lifespan = cols.lifespan[i] - cols.decay[i] * dt;
            cols.lifespan[i] = lifespan;
            cols.alpha[i] = lifespan.clamp(0.0, 1.0);
            if lifespan <= 0.0 {
                report.died += 1;
            }

            let age = frame.time - cols.spawn_time[i];
            if cols.burst[i] == BurstState::Pending && age >= cols.burst_delay[i] {
                cols.burst[i] = BurstState::Triggered;
                report.bursts_triggered += 1;
            }

            if cols.spiral[i] && age >= cols.spiral_delay[i] {
                velocity += Vec2::new(rotation.cos(), rotation.sin()) * frame.spiral_force * dt;
            }

            if frame.boundary == BoundaryMode::Wrap {
                position.x = wrap_coord(position.x, frame.canvas_size.x);
                position.y = wrap_coord(position.y, frame.canvas_size.y);
            }

            cols.velocities[i] = velocity;
            cols.positions[i] = position;
        }

        tracing::trace!(
            target: "particles",
            "Integrated {} particles ({} died, {} bursts)",
            report.processed,
            report.died,
            report.bursts_triggered
        );
        report
    }
}
