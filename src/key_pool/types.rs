//! # 密钥池类型定义

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::cache::{FIELD_FAILED, FIELD_SUCCESS};
use crate::logging::mask_secret;

/// 上游凭据
///
/// 以字符串本身作为身份；`Debug`/`Display` 只输出脱敏后的前缀。
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    /// 创建凭据
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// 原始密钥（仅用于构造上游请求与存储键）
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 脱敏后的展示形式
    #[must_use]
    pub fn masked(&self) -> String {
        mask_secret(&self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.masked()).finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

/// 进程生命周期内不可变的密钥池
#[derive(Debug, Clone, Default)]
pub struct KeyPool {
    credentials: Arc<[Credential]>,
}

impl KeyPool {
    /// 从凭据列表创建，重复项只保留第一次出现
    #[must_use]
    pub fn new(credentials: Vec<Credential>) -> Self {
        let mut distinct: Vec<Credential> = Vec::with_capacity(credentials.len());
        for credential in credentials {
            if !distinct.contains(&credential) {
                distinct.push(credential);
            }
        }
        Self {
            credentials: distinct.into(),
        }
    }

    /// 解析逗号分隔的密钥列表：逐项去除首尾空白并丢弃空项
    #[must_use]
    pub fn from_config_str(raw: &str) -> Self {
        Self::new(
            raw.split(',')
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(Credential::new)
                .collect(),
        )
    }

    /// 密钥数量
    #[must_use]
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// 是否为空
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// 遍历密钥
    pub fn iter(&self) -> impl Iterator<Item = &Credential> {
        self.credentials.iter()
    }

    /// 以切片形式访问
    #[must_use]
    pub fn as_slice(&self) -> &[Credential] {
        &self.credentials
    }
}

/// 单个凭据的健康计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CredentialHealth {
    /// 上游返回 200 的次数
    pub success: u64,
    /// 上游返回 429 的次数
    pub failed: u64,
    /// 禁用截止时间
    pub disabled_until: Option<DateTime<Utc>>,
}

impl CredentialHealth {
    /// 从存储哈希字段解析计数，缺失或无法解析的字段视为 0
    #[must_use]
    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        let read = |name: &str| {
            fields
                .get(name)
                .and_then(|value| value.trim().parse::<i64>().ok())
                .map_or(0, |count| u64::try_from(count).unwrap_or(0))
        };

        Self {
            success: read(FIELD_SUCCESS),
            failed: read(FIELD_FAILED),
            disabled_until: None,
        }
    }

    /// 样本总数
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.success.saturating_add(self.failed)
    }

    /// 失败率，无样本时为 0
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn failure_ratio(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.failed as f64 / total as f64
        }
    }

    /// 在 `now` 时刻是否处于禁用状态
    #[must_use]
    pub fn is_disabled_at(&self, now: DateTime<Utc>) -> bool {
        self.disabled_until.is_some_and(|until| until > now)
    }
}
