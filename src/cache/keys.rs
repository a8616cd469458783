//! # 健康存储键命名规范
//!
//! 所有键共享同一个可配置前缀，便于多套部署共用一个 Redis 实例。

use std::fmt;

use crate::logging::mask_secret;

/// 健康计数哈希中的成功次数字段
pub const FIELD_SUCCESS: &str = "success";
/// 健康计数哈希中的限流次数字段
pub const FIELD_FAILED: &str = "failed";

/// 健康存储键类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheKey {
    /// 凭据计数哈希 - `{prefix}:health:{credential}`
    CredentialHealth { prefix: String, credential: String },

    /// 凭据禁用标记 - `{prefix}:disabled:{credential}`
    CredentialDisabled { prefix: String, credential: String },
}

impl CacheKey {
    /// 生成缓存键字符串
    #[must_use]
    pub fn build(&self) -> String {
        match self {
            Self::CredentialHealth { prefix, credential } => {
                format!("{prefix}:health:{credential}")
            }
            Self::CredentialDisabled { prefix, credential } => {
                format!("{prefix}:disabled:{credential}")
            }
        }
    }

    /// 获取缓存键的命名空间
    #[must_use]
    pub const fn namespace(&self) -> &'static str {
        match self {
            Self::CredentialHealth { .. } => "health",
            Self::CredentialDisabled { .. } => "disabled",
        }
    }
}

/// 只输出脱敏后的凭据部分，原始键请用 [`CacheKey::build`]
impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (Self::CredentialHealth { prefix, credential }
        | Self::CredentialDisabled { prefix, credential }) = self;
        write!(f, "{prefix}:{}:{}", self.namespace(), mask_secret(credential))
    }
}

/// 脱敏存储键中的凭据部分（日志与错误信息用）
///
/// 键的最后一段视为凭据；没有分隔符时整体脱敏。
#[must_use]
pub fn redact_key(key: &str) -> String {
    match key.rsplit_once(':') {
        Some((scope, credential)) => format!("{scope}:{}", mask_secret(credential)),
        None => mask_secret(key),
    }
}

/// 缓存键构建器
#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    prefix: String,
}

impl CacheKeyBuilder {
    /// 使用指定前缀创建构建器
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// 构建凭据计数键
    #[must_use]
    pub fn credential_health(&self, credential: &str) -> CacheKey {
        CacheKey::CredentialHealth {
            prefix: self.prefix.clone(),
            credential: credential.to_string(),
        }
    }

    /// 构建凭据禁用标记键
    #[must_use]
    pub fn credential_disabled(&self, credential: &str) -> CacheKey {
        CacheKey::CredentialDisabled {
            prefix: self.prefix.clone(),
            credential: credential.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_keys() {
        let builder = CacheKeyBuilder::new("gemini_proxy");

        assert_eq!(
            builder.credential_health("AIza-1").build(),
            "gemini_proxy:health:AIza-1"
        );
        assert_eq!(
            builder.credential_disabled("AIza-1").build(),
            "gemini_proxy:disabled:AIza-1"
        );
    }

    #[test]
    fn test_display_masks_credential() {
        let key = CacheKeyBuilder::new("gemini_proxy")
            .credential_health("AIzaSyFULLSECRETVALUE0123456789")
            .to_string();

        assert_eq!(key, "gemini_proxy:health:AIzaSyFULL...");
        assert!(!key.contains("AIzaSyFULLSECRETVALUE0123456789"));
    }

    #[test]
    fn test_redact_key() {
        assert_eq!(
            redact_key("p:disabled:AIzaSyFULLSECRETVALUE0123456789"),
            "p:disabled:AIzaSyFULL..."
        );
        assert_eq!(redact_key("p:health:short"), "p:health:***");
        assert_eq!(redact_key("bare-secret"), "***");
    }

    #[test]
    fn test_key_namespace() {
        let builder = CacheKeyBuilder::new("p");
        assert_eq!(builder.credential_health("k").namespace(), "health");
        assert_eq!(builder.credential_disabled("k").namespace(), "disabled");
    }

    #[test]
    fn test_prefix_isolates_deployments() {
        let a = CacheKeyBuilder::new("prod").credential_health("k");
        let b = CacheKeyBuilder::new("staging").credential_health("k");
        assert_ne!(a, b);
    }
}
