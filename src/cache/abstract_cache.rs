//! # 健康存储抽象层
//!
//! 熔断器与密钥选择器只依赖 [`HealthStore`] 这四个原语，
//! 后端可以是 Redis（多进程共享）或进程内存（单进程部署与测试）。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::client::CacheClient;
use super::keys::redact_key;
use crate::config::{HealthBackend, HealthConfig};
use crate::error::cache::CacheError;
use crate::error::{ProxyError, Result};

/// 健康存储访问接口
#[async_trait]
pub trait HealthStore: Send + Sync {
    /// 读取字符串值，不存在或已过期返回 `None`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// 原子地增加哈希字段，返回增加后的值
    async fn hash_increment(&self, key: &str, field: &str, delta: i64) -> Result<i64>;

    /// 写入字符串值并设置过期时间
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// 读取哈希全部字段，不存在返回 `None`
    async fn get_all_fields(&self, key: &str) -> Result<Option<HashMap<String, String>>>;

    /// 后端名称（日志用）
    fn backend_name(&self) -> &'static str;
}

/// 根据配置创建健康存储
///
/// `backend = "none"` 时返回 `Ok(None)`；Redis 连接失败时返回错误，由调用方决定是否降级。
pub async fn connect_health_store(config: &HealthConfig) -> Result<Option<Arc<dyn HealthStore>>> {
    match config.backend {
        HealthBackend::None => Ok(None),
        HealthBackend::Memory => Ok(Some(Arc::new(MemoryHealthStore::new()))),
        HealthBackend::Redis => {
            let redis = config
                .redis
                .as_ref()
                .ok_or_else(|| ProxyError::config("health.redis 未配置"))?;
            let client = CacheClient::new(redis).await?;
            client.ping().await?;
            Ok(Some(Arc::new(RedisHealthStore::new(client))))
        }
    }
}

/// 存储的值
#[derive(Debug, Clone)]
enum StoredValue {
    Text(String),
    Hash(HashMap<String, i64>),
}

/// 内存条目
#[derive(Debug, Clone)]
struct CacheEntry {
    value: StoredValue,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// 进程内健康存储
///
/// 所有操作在同一把锁内完成，因此 `hash_increment` 是原子的。
#[derive(Debug, Default)]
pub struct MemoryHealthStore {
    data: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryHealthStore {
    /// 创建空存储
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前未过期的键数量
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries().values().filter(|e| !e.is_expired(now)).count()
    }

    /// 是否没有任何未过期的键
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 读取未过期条目，顺带清除已过期的
    fn live_entry<'a>(
        data: &'a mut HashMap<String, CacheEntry>,
        key: &str,
        now: Instant,
    ) -> Option<&'a mut CacheEntry> {
        if data.get(key).is_some_and(|entry| entry.is_expired(now)) {
            data.remove(key);
        }
        data.get_mut(key)
    }

    fn cleanup_expired(data: &mut HashMap<String, CacheEntry>, now: Instant) {
        data.retain(|_, entry| !entry.is_expired(now));
    }
}

fn wrong_type(key: &str) -> ProxyError {
    CacheError::unexpected_response(format!("WRONGTYPE: {} 的值类型不匹配", redact_key(key))).into()
}

#[async_trait]
impl HealthStore for MemoryHealthStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut data = self.entries();
        match Self::live_entry(&mut data, key, Instant::now()) {
            None => Ok(None),
            Some(CacheEntry {
                value: StoredValue::Text(text),
                ..
            }) => Ok(Some(text.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn hash_increment(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        let mut data = self.entries();
        let now = Instant::now();
        if Self::live_entry(&mut data, key, now).is_none() {
            data.insert(
                key.to_string(),
                CacheEntry {
                    value: StoredValue::Hash(HashMap::new()),
                    expires_at: None,
                },
            );
        }

        match data.get_mut(key) {
            Some(CacheEntry {
                value: StoredValue::Hash(fields),
                ..
            }) => {
                let counter = fields.entry(field.to_string()).or_insert(0);
                *counter += delta;
                Ok(*counter)
            }
            _ => Err(wrong_type(key)),
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        if ttl.is_zero() {
            return Err(
                CacheError::invalid_ttl(format!("{} 的 TTL 必须大于 0", redact_key(key))).into(),
            );
        }
        let now = Instant::now();
        let mut data = self.entries();
        Self::cleanup_expired(&mut data, now);
        data.insert(
            key.to_string(),
            CacheEntry {
                value: StoredValue::Text(value.to_string()),
                expires_at: Some(now + ttl),
            },
        );
        Ok(())
    }

    async fn get_all_fields(&self, key: &str) -> Result<Option<HashMap<String, String>>> {
        let mut data = self.entries();
        match Self::live_entry(&mut data, key, Instant::now()) {
            None => Ok(None),
            Some(CacheEntry {
                value: StoredValue::Hash(fields),
                ..
            }) => {
                if fields.is_empty() {
                    return Ok(None);
                }
                Ok(Some(
                    fields
                        .iter()
                        .map(|(field, count)| (field.clone(), count.to_string()))
                        .collect(),
                ))
            }
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Redis 健康存储
#[derive(Clone)]
pub struct RedisHealthStore {
    client: CacheClient,
}

impl RedisHealthStore {
    /// 使用已建立的客户端创建
    #[must_use]
    pub const fn new(client: CacheClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HealthStore for RedisHealthStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.client.get(key).await
    }

    async fn hash_increment(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        self.client.hash_increment(key, field, delta).await
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        // SET EX 只接受整秒
        let seconds = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
        if seconds == 0 {
            return Err(
                CacheError::invalid_ttl(format!("{} 的 TTL 必须大于 0", redact_key(key))).into(),
            );
        }
        self.client.set_with_ttl(key, value, seconds).await
    }

    async fn get_all_fields(&self, key: &str) -> Result<Option<HashMap<String, String>>> {
        let fields = self.client.hash_get_all(key).await?;
        Ok(if fields.is_empty() { None } else { Some(fields) })
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
