//! # 密钥选择算法
//!
//! 并发查询每个密钥的禁用标记，在仍可用的密钥中均匀随机选择一个。

use chrono::{DateTime, Utc};
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex, PoisonError};

use super::types::{Credential, KeyPool};
use crate::cache::{CacheKeyBuilder, HealthStore};
use crate::error::{Result, key_pool::KeyPoolError};
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, linfo, lwarn};

/// 随机数来源
pub trait RandomSource: Send + Sync {
    /// 返回 `[0, upper)` 内的下标，`upper` 至少为 1
    fn index(&self, upper: usize) -> usize;
}

/// 线程本地随机数
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn index(&self, upper: usize) -> usize {
        if upper <= 1 {
            return 0;
        }
        rand::thread_rng().gen_range(0..upper)
    }
}

/// 固定种子的随机数，选择结果可复现
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    /// 使用种子创建
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn index(&self, upper: usize) -> usize {
        if upper <= 1 {
            return 0;
        }
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_range(0..upper)
    }
}

/// 密钥选择器
#[derive(Clone)]
pub struct KeySelector {
    pool: KeyPool,
    store: Option<Arc<dyn HealthStore>>,
    keys: CacheKeyBuilder,
    random: Arc<dyn RandomSource>,
}

impl KeySelector {
    /// 创建选择器；`store` 为 `None` 时不做健康过滤
    #[must_use]
    pub fn new(
        pool: KeyPool,
        store: Option<Arc<dyn HealthStore>>,
        keys: CacheKeyBuilder,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            pool,
            store,
            keys,
            random,
        }
    }

    /// 当前密钥池
    #[must_use]
    pub const fn pool(&self) -> &KeyPool {
        &self.pool
    }

    /// 选择一个当前可用的密钥
    pub async fn select(&self, request_id: &str) -> Result<Credential> {
        self.select_at(request_id, Utc::now()).await
    }

    /// 以 `now` 为当前时间选择密钥
    pub async fn select_at(&self, request_id: &str, now: DateTime<Utc>) -> Result<Credential> {
        if self.pool.is_empty() {
            return Err(KeyPoolError::PoolEmpty.into());
        }

        let enabled: Vec<&Credential> = match &self.store {
            None => self.pool.iter().collect(),
            Some(store) => {
                let checks = self
                    .pool
                    .iter()
                    .map(|credential| self.is_disabled(store.as_ref(), credential, now, request_id));
                let disabled = join_all(checks).await;
                self.pool
                    .iter()
                    .zip(disabled)
                    .filter_map(|(credential, disabled)| (!disabled).then_some(credential))
                    .collect()
            }
        };

        if enabled.is_empty() {
            lwarn!(
                request_id,
                LogStage::KeySelection,
                LogComponent::KeySelector,
                "all_disabled",
                "所有密钥均处于禁用状态",
                pool_size = self.pool.len()
            );
            return Err(KeyPoolError::AllCredentialsDisabled {
                pool_size: self.pool.len(),
            }
            .into());
        }

        let index = self.random.index(enabled.len()) % enabled.len();
        let chosen = enabled[index].clone();

        linfo!(
            request_id,
            LogStage::KeySelection,
            LogComponent::KeySelector,
            "key_selected",
            "Selected upstream API key",
            key = %chosen,
            enabled = enabled.len(),
            pool_size = self.pool.len()
        );

        Ok(chosen)
    }

    /// 查询禁用标记；存储不可用时视为可用
    async fn is_disabled(
        &self,
        store: &dyn HealthStore,
        credential: &Credential,
        now: DateTime<Utc>,
        request_id: &str,
    ) -> bool {
        let key = self.keys.credential_disabled(credential.as_str()).build();
        match store.get(&key).await {
            Ok(None) => false,
            Ok(Some(value)) => match DateTime::parse_from_rfc3339(value.trim()) {
                Ok(until) => {
                    let disabled = until.with_timezone(&Utc) > now;
                    if disabled {
                        ldebug!(
                            request_id,
                            LogStage::KeySelection,
                            LogComponent::KeySelector,
                            "key_disabled",
                            "跳过已禁用的密钥",
                            key = %credential,
                            disabled_until = %until
                        );
                    }
                    disabled
                }
                // 标记存在但内容无法解析，交给存储的 TTL 过期
                Err(_) => true,
            },
            Err(e) => {
                lwarn!(
                    request_id,
                    LogStage::KeySelection,
                    LogComponent::KeySelector,
                    "disable_flag_lookup_failed",
                    "读取禁用标记失败，按可用处理",
                    key = %credential,
                    backend = store.backend_name(),
                    error = %e
                );
                false
            }
        }
    }
}
