use super::{ConfigError, ConfigResult};
use crate::impl_default;
use serde::{Deserialize, Serialize};

/// 模拟配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// 粒子存储容量（构造时固定）
    pub capacity: u32,

    /// 重力加速度（像素/秒²，正值向下）
    pub gravity: f32,

    /// 空气阻力（每秒保留的速度比例，取值 (0, 1]）
    pub air_resistance: f32,

    /// 螺旋力（像素/秒²）
    pub spiral_force: f32,

    /// 单帧最大时间步长（秒），更长的帧会被截断
    pub max_delta_time: f32,

    /// 容量已满时的处理策略
    pub overflow: OverflowPolicy,

    /// 边界处理
    pub boundary: BoundaryMode,

    /// 画布尺寸（像素），用于边界处理
    pub canvas_size: [f32; 2],
}

impl_default!(SimulationConfig {
    capacity: 10_000,
    gravity: 400.0,
    air_resistance: 0.6,
    spiral_force: 240.0,
    max_delta_time: 0.1,
    overflow: OverflowPolicy::DropNewest,
    boundary: BoundaryMode::None,
    canvas_size: [1920.0, 1080.0],
});

impl SimulationConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.capacity == 0 {
            return Err(ConfigError::ValidationError(
                "Particle capacity must be greater than zero".to_string(),
            ));
        }
        if !(self.air_resistance > 0.0 && self.air_resistance <= 1.0) {
            return Err(ConfigError::ValidationError(format!(
                "Air resistance must be in (0, 1], got {}",
                self.air_resistance
            )));
        }
        if !self.gravity.is_finite() || !self.spiral_force.is_finite() {
            return Err(ConfigError::ValidationError(
                "Gravity and spiral force must be finite".to_string(),
            ));
        }
        if !(self.max_delta_time > 0.0) {
            return Err(ConfigError::ValidationError(
                "Max delta time must be positive".to_string(),
            ));
        }
        if self.canvas_size[0] <= 0.0 || self.canvas_size[1] <= 0.0 {
            return Err(ConfigError::ValidationError(
                "Invalid canvas size".to_string(),
            ));
        }
        Ok(())
    }
}

/// 容量已满时的生成策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// 拒绝新粒子并计入丢弃统计
    #[default]
    DropNewest,
    /// 覆盖剩余寿命最短的粒子并计入驱逐统计
    ///
    /// 存储已满时每次生成都要扫描全部活跃粒子寻找最短寿命，开销为 O(容量)。
    /// 满载下的大批量生成应优先使用 `DropNewest`。
    EvictWeakest,
}

/// 边界处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryMode {
    /// 不处理，粒子可以离开画布
    #[default]
    None,
    /// 从对侧边缘回绕
    Wrap,
}

impl BoundaryMode {
    /// GPU 端编码
    pub fn as_raw(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Wrap => 1,
        }
    }
}
