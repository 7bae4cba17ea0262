//! 统一错误处理模块
//!
//! 提供粒子核心范围内的统一错误类型定义
//!
//! ## 错误类型分层
//!
//! - **渲染层错误** (`RenderError`): 设备、着色器编译、设备丢失等
//! - **配置错误** (`config::ConfigError`): 配置文件读取与校验
//! - **生成错误** (`simulation::SpawnError`): 粒子存储已满
//!
//! `FxError` 可以同时承载以上所有错误。

use crate::config::ConfigError;
use crate::simulation::SpawnError;
use thiserror::Error;

/// 粒子核心顶层错误类型
#[derive(Error, Debug)]
pub enum FxError {
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Spawn error: {0}")]
    Spawn(#[from] SpawnError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 渲染系统错误
#[derive(Error, Debug, Clone)]
pub enum RenderError {
    #[error("Failed to request adapter: no compatible GPU found")]
    NoAdapter,

    #[error("Failed to request device: {0}")]
    DeviceRequest(String),

    #[error("Failed to create shader: {0}")]
    ShaderCompilation(String),

    /// 设备已丢失，嵌入程序需要重新初始化
    #[error("GPU device lost: {0}")]
    DeviceLost(String),

    /// 输出表面不支持直通（非预乘）alpha
    #[error("Surface does not support straight alpha compositing: {0}")]
    UnsupportedAlphaMode(String),

    #[error("Buffer map failed: {0}")]
    BufferMap(String),

    #[error("Invalid render state: {0}")]
    InvalidState(String),
}

/// 顶层结果类型别名
pub type FxResult<T> = Result<T, FxError>;
pub type RenderResult<T> = Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let spawn_err = SpawnError::Full { capacity: 8 };
        let fx_err: FxError = spawn_err.into();
        assert!(matches!(fx_err, FxError::Spawn(_)));

        let fx_err: FxError = RenderError::NoAdapter.into();
        assert!(matches!(fx_err, FxError::Render(RenderError::NoAdapter)));
    }

    #[test]
    fn test_error_display() {
        let err = RenderError::NoAdapter;
        assert_eq!(
            err.to_string(),
            "Failed to request adapter: no compatible GPU found"
        );

        let err = FxError::from(RenderError::DeviceLost("reset".to_string()));
        assert_eq!(err.to_string(), "Render error: GPU device lost: reset");
    }
}
