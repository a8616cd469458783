//! # 应用配置结构定义

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::proxy::parse_base_url;

/// 默认上游地址
pub const DEFAULT_UPSTREAM_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// 应用主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 监听配置
    pub server: ServerConfig,
    /// 下游共享密钥配置
    pub auth: AuthConfig,
    /// 上游密钥池配置
    pub key_pool: KeyPoolConfig,
    /// 上游服务配置
    pub upstream: UpstreamConfig,
    /// 转发行为开关
    pub proxy: ProxyOptions,
    /// 健康统计与熔断配置
    pub health: HealthConfig,
}

/// 服务器监听配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    /// 监听地址字符串 `host:port`
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 共享密钥配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// 调用方必须提供的共享密钥；未配置时拒绝所有请求
    pub shared_secret: Option<String>,
}

/// 上游密钥池配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyPoolConfig {
    /// 逗号分隔的上游 API 密钥
    pub keys: String,
}

/// 上游服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// 上游基础地址（scheme + host），路径与查询串来自下游请求
    pub base_url: String,
    /// 建立连接超时（秒）
    pub connect_timeout_seconds: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_UPSTREAM_BASE_URL.to_string(),
            connect_timeout_seconds: 10,
        }
    }
}

impl UpstreamConfig {
    /// 连接超时
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

/// 转发行为开关
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct ProxyOptions {
    /// 同时接受 `X-Goog-Api-Key` 与 `Authorization: Bearer`，并按路径选择上游认证方式
    pub check_dual_auth_headers: bool,
    /// 是否记录每个密钥的成功/限流次数并执行熔断
    pub track_health: bool,
    /// 是否在 debug 日志中输出（脱敏后的）请求头
    pub log_request_headers: bool,
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self {
            check_dual_auth_headers: true,
            track_health: true,
            log_request_headers: false,
        }
    }
}

/// 健康存储后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthBackend {
    /// 不记录，所有密钥始终可用
    #[default]
    None,
    /// 进程内存储
    Memory,
    /// Redis 存储（多进程共享）
    Redis,
}

impl std::str::FromStr for HealthBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "off" | "disabled" => Ok(Self::None),
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            _ => Err(format!("Unknown health backend: {s}")),
        }
    }
}

/// 健康统计与熔断配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// 存储后端
    pub backend: HealthBackend,
    /// 触发判断所需的最小样本数（严格大于）
    pub min_samples: u64,
    /// 失败率阈值（严格大于）
    pub failure_ratio: f64,
    /// 禁用时长（秒）
    pub disable_seconds: u64,
    /// 存储键前缀
    pub key_prefix: String,
    /// Redis 配置
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis: Option<RedisConfig>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            backend: HealthBackend::None,
            min_samples: 20,
            failure_ratio: 0.5,
            disable_seconds: 3600,
            key_prefix: "gemini_proxy".to_string(),
            redis: None,
        }
    }
}

/// Redis配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Redis连接URL
    pub url: String,
    /// 连接超时时间（秒）
    pub connection_timeout: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379/0".to_string(),
            connection_timeout: 5,
        }
    }
}

impl AppConfig {
    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be greater than 0".to_string());
        }
        // 与转发器使用同一解析规则，缺少 scheme 时按 https 处理
        if let Err(e) = parse_base_url(&self.upstream.base_url) {
            return Err(format!(
                "upstream.base_url is invalid ({e}), got {:?}",
                self.upstream.base_url
            ));
        }
        if !(self.health.failure_ratio > 0.0 && self.health.failure_ratio < 1.0) {
            return Err(format!(
                "health.failure_ratio must be within (0, 1), got {}",
                self.health.failure_ratio
            ));
        }
        if self.health.disable_seconds == 0 {
            return Err("health.disable_seconds must be greater than 0".to_string());
        }

        if self.health.backend == HealthBackend::Redis {
            let redis = self
                .health
                .redis
                .as_ref()
                .ok_or_else(|| "health.redis must be provided when backend = \"redis\"".to_string())?;
            if redis.url.trim().is_empty() {
                return Err("Redis URL cannot be empty".to_string());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.upstream.base_url, DEFAULT_UPSTREAM_BASE_URL);
        assert_eq!(config.health.min_samples, 20);
        assert_eq!(config.health.disable_seconds, 3600);
        assert!(config.proxy.check_dual_auth_headers);
        assert!(config.proxy.track_health);
        assert_eq!(config.health.backend, HealthBackend::None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let raw = r#"
            [auth]
            shared_secret = "let-me-in"

            [key_pool]
            keys = "k1, k2"

            [health]
            backend = "redis"

            [health.redis]
            url = "redis://cache:6379/1"
        "#;
        let config: AppConfig = toml::from_str(raw).unwrap();

        assert_eq!(config.auth.shared_secret.as_deref(), Some("let-me-in"));
        assert_eq!(config.key_pool.keys, "k1, k2");
        assert_eq!(config.health.backend, HealthBackend::Redis);
        assert_eq!(
            config.health.redis.as_ref().map(|r| r.url.as_str()),
            Some("redis://cache:6379/1")
        );
        // 未出现的段落回落到默认值
        assert_eq!(config.server.port, 8080);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_redis_backend_requires_redis_section() {
        let mut config = AppConfig::default();
        config.health.backend = HealthBackend::Redis;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_failure_ratio_bounds() {
        let mut config = AppConfig::default();
        config.health.failure_ratio = 1.0;
        assert!(config.validate().is_err());
        config.health.failure_ratio = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_base_url_requires_host() {
        let mut config = AppConfig::default();
        config.upstream.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
        config.upstream.base_url = "   ".to_string();
        assert!(config.validate().is_err());
        config.upstream.base_url = "http://127.0.0.1:9000".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_base_url_without_scheme_is_accepted() {
        let mut config = AppConfig::default();
        config.upstream.base_url = "generativelanguage.googleapis.com".to_string();
        assert!(config.validate().is_ok());
        assert_eq!(
            parse_base_url(&config.upstream.base_url).unwrap().origin,
            "https://generativelanguage.googleapis.com"
        );
    }

    #[test]
    fn test_health_backend_from_str() {
        assert_eq!("Redis".parse::<HealthBackend>(), Ok(HealthBackend::Redis));
        assert_eq!("off".parse::<HealthBackend>(), Ok(HealthBackend::None));
        assert!("etcd".parse::<HealthBackend>().is_err());
    }
}
