//! # 缓存模块
//!
//! 健康存储：Redis 客户端、存储抽象与键命名

pub mod abstract_cache;
pub mod client;
pub mod keys;

pub use abstract_cache::{HealthStore, MemoryHealthStore, RedisHealthStore, connect_health_store};
pub use client::CacheClient;
pub use keys::{CacheKey, CacheKeyBuilder, FIELD_FAILED, FIELD_SUCCESS, redact_key};
