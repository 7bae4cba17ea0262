/// 统一配置系统
///
/// 提供TOML/JSON配置文件、环境变量覆盖和配置校验
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod render;
pub mod simulation;

pub use render::{BackendKind, RenderConfig};
pub use simulation::{BoundaryMode, OverflowPolicy, SimulationConfig};

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 文件读取错误
    #[error("Config file error: {0}")]
    FileError(#[from] std::io::Error),
    /// 解析错误
    #[error("Config parse error: {0}")]
    ParseError(String),
    /// 验证错误
    #[error("Config validation error: {0}")]
    ValidationError(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// 粒子核心主配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FxConfig {
    /// 模拟配置
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// 渲染配置
    #[serde(default)]
    pub render: RenderConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl FxConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 从TOML文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_toml_str(&content)
    }

    /// 从TOML字符串解析配置
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_json_str(&content)
    }

    /// 从JSON字符串解析配置
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 保存为TOML文件
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 保存为JSON文件
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 从环境变量覆盖配置
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| env::var(key).ok());
    }

    /// 使用任意键值来源覆盖配置
    ///
    /// 无法解析的值会被忽略并记录警告。
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("PARTICLE_FX_CAPACITY") {
            match val.parse() {
                Ok(capacity) => self.simulation.capacity = capacity,
                Err(_) => warn_unparsed("PARTICLE_FX_CAPACITY", &val),
            }
        }
        if let Some(val) = lookup("PARTICLE_FX_GRAVITY") {
            match val.parse() {
                Ok(gravity) => self.simulation.gravity = gravity,
                Err(_) => warn_unparsed("PARTICLE_FX_GRAVITY", &val),
            }
        }
        if let Some(val) = lookup("PARTICLE_FX_AIR_RESISTANCE") {
            match val.parse() {
                Ok(air) => self.simulation.air_resistance = air,
                Err(_) => warn_unparsed("PARTICLE_FX_AIR_RESISTANCE", &val),
            }
        }
        if let Some(val) = lookup("PARTICLE_FX_BACKEND") {
            match val.parse() {
                Ok(backend) => self.render.backend = backend,
                Err(_) => warn_unparsed("PARTICLE_FX_BACKEND", &val),
            }
        }
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        self.simulation.validate()?;
        self.render.validate()?;
        Ok(())
    }

    /// 自动查找并加载配置文件
    ///
    /// 按以下顺序查找：
    /// 1. ./particle_fx.toml
    /// 2. ./particle_fx.json
    /// 3. ~/.config/particle_fx/config.toml
    /// 4. 使用默认配置
    pub fn load_or_default() -> Self {
        if let Ok(config) = Self::from_toml_file("particle_fx.toml") {
            tracing::info!(target: "particles", "Loaded config from particle_fx.toml");
            return config;
        }

        if let Ok(config) = Self::from_json_file("particle_fx.json") {
            tracing::info!(target: "particles", "Loaded config from particle_fx.json");
            return config;
        }

        if let Some(home) = env::var_os("HOME") {
            let config_path = PathBuf::from(home)
                .join(".config")
                .join("particle_fx")
                .join("config.toml");

            if let Ok(config) = Self::from_toml_file(&config_path) {
                tracing::info!(target: "particles", "Loaded config from {:?}", config_path);
                return config;
            }
        }

        tracing::info!(target: "particles", "Using default configuration");
        Self::default()
    }
}

fn warn_unparsed(key: &str, value: &str) {
    tracing::warn!(target: "particles", "Ignoring {key}: cannot parse {value:?}");
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: LogLevel,

    /// 是否输出到控制台
    pub log_to_console: bool,
}

use crate::impl_default;

impl_default!(LoggingConfig {
    level: LogLevel::Info,
    log_to_console: true,
});

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// 跟踪
    Trace,
    /// 调试
    Debug,
    /// 信息
    Info,
    /// 警告
    Warn,
    /// 错误
    Error,
}

impl LogLevel {
    /// 作为 `EnvFilter` 指令使用的名称
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = FxConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.simulation.overflow, OverflowPolicy::DropNewest);
        assert_eq!(config.render.backend, BackendKind::Raster);
    }

    #[test]
    fn test_toml_serialization() {
        let config = FxConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: FxConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.simulation.capacity, parsed.simulation.capacity);
        assert_eq!(config.render.backend, parsed.render.backend);
    }

    #[test]
    fn test_json_serialization() {
        let config = FxConfig::default();
        let json_str = serde_json::to_string(&config).unwrap();
        let parsed: FxConfig = serde_json::from_str(&json_str).unwrap();
        assert_eq!(config.simulation.gravity, parsed.simulation.gravity);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = FxConfig::from_toml_str(
            r#"
            [simulation]
            capacity = 512
            overflow = "evict_weakest"
            boundary = "wrap"

            [render]
            backend = "compute"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.simulation.capacity, 512);
        assert_eq!(config.simulation.overflow, OverflowPolicy::EvictWeakest);
        assert_eq!(config.simulation.boundary, BoundaryMode::Wrap);
        assert_eq!(config.simulation.air_resistance, 0.6);
        assert_eq!(config.render.backend, BackendKind::Compute);
        assert_eq!(config.render.workgroup_size, 64);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert!(config.logging.log_to_console);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fx.toml");

        let mut config = FxConfig::default();
        config.simulation.capacity = 2048;
        config.save_toml(&path).unwrap();

        let loaded = FxConfig::from_toml_file(&path).unwrap();
        assert_eq!(loaded.simulation.capacity, 2048);

        let json_path = dir.path().join("fx.json");
        config.save_json(&json_path).unwrap();
        let loaded = FxConfig::from_json_file(&json_path).unwrap();
        assert_eq!(loaded.simulation.capacity, 2048);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = FxConfig::default();
        config.simulation.capacity = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        let mut config = FxConfig::default();
        config.simulation.air_resistance = 0.0;
        assert!(config.validate().is_err());

        let mut config = FxConfig::default();
        config.simulation.air_resistance = 1.5;
        assert!(config.validate().is_err());

        let mut config = FxConfig::default();
        config.render.workgroup_size = 512;
        assert!(config.validate().is_err());

        let mut config = FxConfig::default();
        config.simulation.gravity = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PARTICLE_FX_CAPACITY", "4096"),
            ("PARTICLE_FX_GRAVITY", "980.5"),
            ("PARTICLE_FX_BACKEND", "Compute"),
            ("PARTICLE_FX_AIR_RESISTANCE", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = FxConfig::default();
        config.apply_overrides_from(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.simulation.capacity, 4096);
        assert_eq!(config.simulation.gravity, 980.5);
        assert_eq!(config.render.backend, BackendKind::Compute);
        // 无法解析的值保持默认
        assert_eq!(config.simulation.air_resistance, 0.6);
    }
}
