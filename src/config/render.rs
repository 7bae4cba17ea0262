use super::{ConfigError, ConfigResult};
use crate::impl_default;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 渲染配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// 后端选择
    pub backend: BackendKind,

    /// 计算着色器工作组大小
    pub workgroup_size: u32,

    /// 圆形粒子核心发光强度
    pub glow_strength: f32,

    /// 每帧爆发事件队列的初始预留；计算后端的设备事件环按容量分配
    pub max_burst_events: u32,
}

impl_default!(RenderConfig {
    backend: BackendKind::Raster,
    workgroup_size: 64,
    glow_strength: 0.35,
    max_burst_events: 256,
});

impl RenderConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.workgroup_size == 0 || self.workgroup_size > 256 {
            return Err(ConfigError::ValidationError(format!(
                "Workgroup size must be in 1..=256, got {}",
                self.workgroup_size
            )));
        }
        if self.max_burst_events == 0 {
            return Err(ConfigError::ValidationError(
                "Burst event capacity must be greater than zero".to_string(),
            ));
        }
        if !self.glow_strength.is_finite() || self.glow_strength < 0.0 {
            return Err(ConfigError::ValidationError(
                "Glow strength must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }
}

/// 渲染后端
///
/// - `Raster`: 主机端模拟，GPU 只做实例化绘制
/// - `Compute`: 模拟完全在 GPU 计算着色器中执行
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Raster,
    Compute,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raster => write!(f, "raster"),
            Self::Compute => write!(f, "compute"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raster" => Ok(Self::Raster),
            "compute" => Ok(Self::Compute),
            other => Err(ConfigError::ParseError(format!(
                "Unknown particle backend: {other}"
            ))),
        }
    }
}
