//! # 配置管理模块
//!
//! 处理应用配置加载、验证和管理

mod app_config;
mod manager;

pub use app_config::{
    AppConfig, AuthConfig, DEFAULT_UPSTREAM_BASE_URL, HealthBackend, HealthConfig, KeyPoolConfig,
    ProxyOptions, RedisConfig, ServerConfig, UpstreamConfig,
};
pub use manager::{ConfigManager, DEFAULT_CONFIG_PATH};
