//! # 配置管理器
//!
//! 从 TOML 文件加载配置，并叠加环境变量覆盖。
//!
//! 密钥池在进程生命周期内只加载一次，因此这里不提供热重载。

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{AppConfig, HealthBackend, RedisConfig};
use crate::error::config::ConfigError;
use crate::error::{ProxyError, Result};
use crate::{bail, config_error};

/// 未显式指定时尝试读取的配置文件
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// 直接映射到配置项的部署环境变量
const ENV_GOOGLE_API_KEYS: &str = "GOOGLE_API_KEYS";
const ENV_AUTH_API_KEY: &str = "AUTH_API_KEY";
const ENV_REDIS_URL: &str = "REDIS_URL";
/// 通用覆盖前缀，例如 `PROXY_SERVER_PORT` -> `server.port`
const ENV_PREFIX: &str = "PROXY_";
const HEALTH_BACKEND_PATH: &str = "health.backend";

/// 配置管理器
#[derive(Debug, Clone)]
pub struct ConfigManager {
    /// 当前配置
    config: Arc<AppConfig>,
    /// 实际读取的配置文件
    source: Option<PathBuf>,
}

impl ConfigManager {
    /// 按进程环境加载配置
    ///
    /// `config_path` 为显式指定的文件（必须存在）；为 `None` 时尝试
    /// [`DEFAULT_CONFIG_PATH`]，不存在则仅使用默认值与环境变量。
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        Self::from_sources(config_path, env::vars())
    }

    /// 从指定文件与环境变量集合创建配置管理器
    pub fn from_sources<I>(config_path: Option<&Path>, env_vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let (mut config, source) = match config_path {
            Some(path) => (Self::load_config_file(path)?, Some(path.to_path_buf())),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    (
                        Self::load_config_file(default_path)?,
                        Some(default_path.to_path_buf()),
                    )
                } else {
                    debug!("未找到默认配置文件 {DEFAULT_CONFIG_PATH}，使用内置默认值");
                    (AppConfig::default(), None)
                }
            }
        };

        let overrides = Self::build_env_overrides(env_vars);
        Self::apply_env_overrides(&mut config, &overrides)?;

        config.validate().map_err(ConfigError::Invalid)?;

        info!(
            "配置加载完成: source={}, overrides={}",
            source
                .as_ref()
                .map_or_else(|| "<defaults>".to_string(), |p| p.display().to_string()),
            overrides.len()
        );

        Ok(Self {
            config: Arc::new(config),
            source,
        })
    }

    /// 直接包装一份已构建的配置（测试与嵌入场景）
    pub fn from_config(config: AppConfig) -> Result<Self> {
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(Self {
            config: Arc::new(config),
            source: None,
        })
    }

    /// 获取当前配置
    #[must_use]
    pub fn config(&self) -> Arc<AppConfig> {
        Arc::clone(&self.config)
    }

    /// 实际读取的配置文件
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// 加载配置文件
    fn load_config_file(path: &Path) -> Result<AppConfig> {
        if !path.exists() {
            bail!(config_error!("配置文件不存在: {}", path.display()));
        }

        let config_content = std::fs::read_to_string(path).map_err(|e| {
            ProxyError::config_with_source(format!("读取配置文件失败: {}", path.display()), e)
        })?;

        toml::from_str(&config_content).map_err(|e| {
            ProxyError::config_with_source(
                format!("TOML解析失败 - 配置文件: {}, 详细错误: {e}", path.display()),
                e,
            )
        })
    }

    /// 构建环境变量覆盖映射（配置路径 -> 值）
    fn build_env_overrides<I>(env_vars: I) -> BTreeMap<String, String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut overrides = BTreeMap::new();

        for (key, value) in env_vars {
            match key.as_str() {
                ENV_GOOGLE_API_KEYS => {
                    overrides.insert("key_pool.keys".to_string(), value);
                }
                ENV_AUTH_API_KEY => {
                    overrides.insert("auth.shared.secret".to_string(), value);
                }
                ENV_REDIS_URL => {
                    overrides.insert("health.redis.url".to_string(), value);
                }
                _ => {
                    if let Some(config_key) = key.strip_prefix(ENV_PREFIX) {
                        // PROXY_SERVER_PORT -> server.port
                        let config_path = config_key.to_lowercase().replace('_', ".");
                        overrides.insert(config_path, value);
                    }
                }
            }
        }

        debug!("发现 {} 个环境变量覆盖", overrides.len());
        overrides
    }

    /// 应用环境变量覆盖
    fn apply_env_overrides(
        config: &mut AppConfig,
        overrides: &BTreeMap<String, String>,
    ) -> Result<()> {
        // `REDIS_URL` 会把后端切到 redis，显式的 health.backend 最后应用以覆盖它
        let (backend, others): (Vec<_>, Vec<_>) = overrides
            .iter()
            .partition(|(path, _)| path.as_str() == HEALTH_BACKEND_PATH);

        for (path, value) in others.into_iter().chain(backend) {
            debug!(
                "应用环境变量覆盖: {} = {}",
                path,
                if path.contains("key") || path.contains("secret") || path.contains("redis") {
                    "***"
                } else {
                    value.as_str()
                }
            );

            Self::apply_override_to_config(config, path, value)?;
        }
        Ok(())
    }

    /// 将单个覆盖项应用到配置对象
    fn apply_override_to_config(config: &mut AppConfig, path: &str, value: &str) -> Result<()> {
        let parts: Vec<&str> = path.split('.').collect();

        match parts.as_slice() {
            ["key_pool", "keys"] => config.key_pool.keys = value.to_string(),
            ["auth", "shared", "secret"] => {
                config.auth.shared_secret = Some(value.to_string()).filter(|s| !s.is_empty());
            }
            ["health", "redis", "url"] => {
                let redis = config.health.redis.get_or_insert_with(RedisConfig::default);
                redis.url = value.to_string();
                config.health.backend = HealthBackend::Redis;
            }
            ["health", "backend"] => {
                config.health.backend = value.parse().map_err(ProxyError::config)?;
            }
            ["server", "host"] => config.server.host = value.to_string(),
            ["server", "port"] => {
                config.server.port = parse_value(path, value)?;
            }
            ["upstream", "base", "url"] => config.upstream.base_url = value.to_string(),
            ["proxy", "track", "health"] => {
                config.proxy.track_health = parse_value(path, value)?;
            }
            ["proxy", "check", "dual", "auth", "headers"] => {
                config.proxy.check_dual_auth_headers = parse_value(path, value)?;
            }
            _ => {
                warn!("未知的配置路径，忽略环境变量覆盖: {}", path);
            }
        }

        Ok(())
    }
}

fn parse_value<T>(path: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.trim().parse().map_err(|e| {
        ProxyError::config_with_source(format!("无效的配置值: {path} = {value}"), e)
    })
}
