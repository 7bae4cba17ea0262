//! 核心模块
//!
//! 包含粒子核心的基础设施：
//! - `error` - 错误类型定义
//! - `macros` - 通用宏
//! - 日志初始化

pub mod error;
#[macro_use]
pub mod macros;

use crate::config::LoggingConfig;

// 重新导出错误类型
pub use error::{FxError, FxResult, RenderError, RenderResult};

/// 初始化日志系统
///
/// 配置tracing日志框架。`RUST_LOG` 环境变量优先，
/// 未设置时使用配置中的日志级别。重复调用是安全的。
pub fn init_logging(config: &LoggingConfig) {
    if !config.log_to_console {
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.level.as_str()));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    tracing::info!(target: "particles", "Logging initialized at level {}", config.level.as_str());
}
