//! # Redis 缓存客户端
//!
//! 提供 Redis 连接管理和健康存储所需的基础命令

use std::collections::HashMap;
use std::time::Duration;

use crate::{ldebug, lerror, linfo, logging::{LogComponent, LogStage}};
use redis::{AsyncCommands, Client, aio::ConnectionManager};

use super::keys::redact_key;
use crate::config::RedisConfig;
use crate::error::{ProxyError, Result};

/// Redis 缓存客户端
#[derive(Clone)]
pub struct CacheClient {
    /// Redis 连接管理器
    connection_manager: ConnectionManager,
    /// 脱敏后的连接地址，仅用于日志
    display_url: String,
}

impl CacheClient {
    /// 创建新的缓存客户端
    ///
    /// 在 `connection_timeout` 秒内未建立连接即视为失败。
    pub async fn new(config: &RedisConfig) -> Result<Self> {
        let display_url = redact_url(&config.url);
        linfo!(
            "system",
            LogStage::Cache,
            LogComponent::Cache,
            "connect_to_redis",
            &format!("正在连接 Redis 服务器: {display_url}")
        );

        let client = Client::open(config.url.as_str())
            .map_err(|e| ProxyError::cache_with_source("创建 Redis 客户端失败", e))?;

        let timeout = Duration::from_secs(config.connection_timeout.max(1));
        let connection_manager = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| {
                ProxyError::cache(format!(
                    "建立 Redis 连接超时: {display_url} ({}s)",
                    timeout.as_secs()
                ))
            })?
            .map_err(|e| ProxyError::cache_with_source("建立 Redis 连接失败", e))?;

        linfo!("system", LogStage::Cache, LogComponent::Cache, "redis_connected", "Redis 连接建立成功");

        Ok(Self {
            connection_manager,
            display_url,
        })
    }

    /// 获取字符串值
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let shown = redact_key(key);
        ldebug!("system", LogStage::Cache, LogComponent::Cache, "get_cache", &format!("获取缓存: key={shown}"));

        let mut conn = self.connection_manager.clone();
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|e| ProxyError::cache_with_source(format!("获取缓存失败: {shown}"), e))
    }

    /// 原子地增加哈希字段，返回增加后的值
    pub async fn hash_increment(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        let shown = redact_key(key);
        ldebug!(
            "system",
            LogStage::Cache,
            LogComponent::Cache,
            "hincrby",
            &format!("增加计数: key={shown}, field={field}, delta={delta}")
        );

        let mut conn = self.connection_manager.clone();
        conn.hincr::<_, _, _, i64>(key, field, delta)
            .await
            .map_err(|e| ProxyError::cache_with_source(format!("增加计数失败: {shown}.{field}"), e))
    }

    /// 设置缓存值并指定 TTL
    pub async fn set_with_ttl(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        let shown = redact_key(key);
        ldebug!("system", LogStage::Cache, LogComponent::Cache, "set_cache", &format!("设置缓存: key={shown}, ttl={ttl_seconds}s"));

        let mut conn = self.connection_manager.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_seconds)
            .await
            .map_err(|e| ProxyError::cache_with_source(format!("设置缓存失败: {shown}"), e))
    }

    /// 读取整个哈希，键不存在时返回空映射
    pub async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>> {
        let shown = redact_key(key);
        ldebug!("system", LogStage::Cache, LogComponent::Cache, "hgetall", &format!("读取哈希: key={shown}"));

        let mut conn = self.connection_manager.clone();
        conn.hgetall::<_, HashMap<String, String>>(key)
            .await
            .map_err(|e| ProxyError::cache_with_source(format!("读取哈希失败: {shown}"), e))
    }

    /// 测试连接
    pub async fn ping(&self) -> Result<()> {
        ldebug!("system", LogStage::Cache, LogComponent::Cache, "ping", "测试 Redis 连接");

        let mut conn = self.connection_manager.clone();

        let response: String = redis::Cmd::new()
            .arg("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| ProxyError::cache_with_source("Redis ping 失败", e))?;

        if response == "PONG" {
            linfo!("system", LogStage::Cache, LogComponent::Cache, "ping_success", &format!("Redis 连接测试成功: {}", self.display_url));
            Ok(())
        } else {
            lerror!("system", LogStage::Cache, LogComponent::Cache, "ping_fail", &format!("Redis ping 响应异常: {response}"));
            Err(ProxyError::cache("Redis 连接测试失败"))
        }
    }

    /// 脱敏后的连接地址
    #[must_use]
    pub fn display_url(&self) -> &str {
        &self.display_url
    }
}

/// 去掉连接串中的密码
fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("***"));
            }
            parsed.to_string()
        }
        Err(_) => "<invalid redis url>".to_string(),
    }
}
