//! # API 密钥健康统计与熔断
//!
//! 每次上游请求完成后记录结果：200 计入 `success`，429 计入 `failed`，
//! 其余状态码不计数。计数增加后立即读回并判断是否需要临时禁用该密钥。
//!
//! 计数只增不减；禁用标记依赖存储的 TTL 自动过期。

use axum::http::StatusCode;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;

use super::types::{Credential, CredentialHealth};
use crate::cache::{CacheKeyBuilder, FIELD_FAILED, FIELD_SUCCESS, HealthStore};
use crate::config::HealthConfig;
use crate::error::{ProxyError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, lwarn};

/// 熔断策略
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthPolicy {
    /// 样本数必须严格大于该值才会判断
    pub min_samples: u64,
    /// 失败率必须严格大于该值才会禁用
    pub failure_ratio: f64,
    /// 禁用时长
    pub disable_duration: Duration,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            min_samples: 20,
            failure_ratio: 0.5,
            disable_duration: Duration::from_secs(3600),
        }
    }
}

impl From<&HealthConfig> for HealthPolicy {
    fn from(config: &HealthConfig) -> Self {
        Self {
            min_samples: config.min_samples,
            failure_ratio: config.failure_ratio,
            disable_duration: Duration::from_secs(config.disable_seconds),
        }
    }
}

impl HealthPolicy {
    /// 当前计数是否应触发禁用
    #[must_use]
    pub fn should_disable(&self, health: &CredentialHealth) -> bool {
        health.total() > self.min_samples && health.failure_ratio() > self.failure_ratio
    }
}

/// 一次记录的结果
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// 状态码不参与统计
    Ignored,
    /// 已计数，未触发禁用
    Recorded(CredentialHealth),
    /// 已计数并禁用到 `until`
    Disabled {
        health: CredentialHealth,
        until: DateTime<Utc>,
    },
    /// 存储不可用，本次记录丢弃
    StoreUnavailable,
}

/// 参与统计的状态码对应的计数字段
#[must_use]
pub fn tracked_field(status: StatusCode) -> Option<&'static str> {
    match status {
        StatusCode::OK => Some(FIELD_SUCCESS),
        StatusCode::TOO_MANY_REQUESTS => Some(FIELD_FAILED),
        _ => None,
    }
}

/// API 密钥健康统计服务
#[derive(Clone)]
pub struct ApiKeyHealthTracker {
    store: Arc<dyn HealthStore>,
    keys: CacheKeyBuilder,
    policy: HealthPolicy,
}

impl ApiKeyHealthTracker {
    /// 创建健康统计服务
    #[must_use]
    pub fn new(store: Arc<dyn HealthStore>, keys: CacheKeyBuilder, policy: HealthPolicy) -> Self {
        Self {
            store,
            keys,
            policy,
        }
    }

    /// 记录一次上游结果，从不返回错误
    pub async fn record_outcome(
        &self,
        request_id: &str,
        credential: &Credential,
        status: StatusCode,
    ) -> RecordOutcome {
        self.record_outcome_at(request_id, credential, status, Utc::now())
            .await
    }

    /// 以 `now` 作为记录时间记录上游结果
    pub async fn record_outcome_at(
        &self,
        request_id: &str,
        credential: &Credential,
        status: StatusCode,
        now: DateTime<Utc>,
    ) -> RecordOutcome {
        let Some(field) = tracked_field(status) else {
            return RecordOutcome::Ignored;
        };

        match self.try_record(credential, field, now).await {
            Ok(outcome) => {
                match &outcome {
                    RecordOutcome::Disabled { health, until } => lwarn!(
                        request_id,
                        LogStage::HealthCheck,
                        LogComponent::HealthTracker,
                        "key_disabled",
                        "API key failure ratio exceeded, key temporarily disabled",
                        key = %credential,
                        success = health.success,
                        failed = health.failed,
                        disabled_until = %until.to_rfc3339()
                    ),
                    RecordOutcome::Recorded(health) => ldebug!(
                        request_id,
                        LogStage::HealthCheck,
                        LogComponent::HealthTracker,
                        "outcome_recorded",
                        "记录上游结果",
                        key = %credential,
                        status = status.as_u16(),
                        success = health.success,
                        failed = health.failed
                    ),
                    RecordOutcome::Ignored | RecordOutcome::StoreUnavailable => {}
                }
                outcome
            }
            Err(e) => {
                lwarn!(
                    request_id,
                    LogStage::HealthCheck,
                    LogComponent::HealthTracker,
                    "record_failed",
                    "健康存储不可用，丢弃本次统计",
                    key = %credential,
                    backend = self.store.backend_name(),
                    error = %e
                );
                RecordOutcome::StoreUnavailable
            }
        }
    }

    async fn try_record(
        &self,
        credential: &Credential,
        field: &str,
        now: DateTime<Utc>,
    ) -> Result<RecordOutcome> {
        let health_key = self.keys.credential_health(credential.as_str()).build();
        self.store.hash_increment(&health_key, field, 1).await?;

        // 增量与读回之间可能插入其他请求的更新，熔断只需最终触发
        let fields = self
            .store
            .get_all_fields(&health_key)
            .await?
            .unwrap_or_default();
        let mut health = CredentialHealth::from_fields(&fields);

        if !self.policy.should_disable(&health) {
            return Ok(RecordOutcome::Recorded(health));
        }

        let until = now + self.disable_delta()?;
        let disabled_key = self.keys.credential_disabled(credential.as_str()).build();
        self.store
            .set_with_ttl(&disabled_key, &until.to_rfc3339(), self.policy.disable_duration)
            .await?;
        health.disabled_until = Some(until);

        Ok(RecordOutcome::Disabled { health, until })
    }

    /// 读取凭据当前的计数与禁用状态
    pub async fn health(&self, credential: &Credential) -> Result<CredentialHealth> {
        let health_key = self.keys.credential_health(credential.as_str()).build();
        let disabled_key = self.keys.credential_disabled(credential.as_str()).build();

        let fields = self
            .store
            .get_all_fields(&health_key)
            .await?
            .unwrap_or_default();
        let mut health = CredentialHealth::from_fields(&fields);
        health.disabled_until = self
            .store
            .get(&disabled_key)
            .await?
            .and_then(|value| DateTime::parse_from_rfc3339(value.trim()).ok())
            .map(|until| until.with_timezone(&Utc));

        Ok(health)
    }

    fn disable_delta(&self) -> Result<TimeDelta> {
        TimeDelta::from_std(self.policy.disable_duration)
            .map_err(|e| ProxyError::internal_with_source("禁用时长超出范围", e))
    }
}
