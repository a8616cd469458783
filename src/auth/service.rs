//! # 共享密钥认证
//!
//! 下游调用方只需出示一个共享密钥，校验通过后才会进入密钥选择。

use axum::http::HeaderMap;

use super::utils::AuthUtils;
use crate::config::AppConfig;
use crate::error::Result;
use crate::error::auth::AuthError;
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, lwarn};

/// 共享密钥校验器
#[derive(Debug, Clone)]
pub struct SharedSecretGate {
    secret: Option<String>,
    accept_bearer: bool,
}

impl SharedSecretGate {
    /// 创建校验器；空字符串等同于未配置
    #[must_use]
    pub fn new(secret: Option<String>, accept_bearer: bool) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
            accept_bearer,
        }
    }

    /// 从应用配置创建
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.auth.shared_secret.clone(),
            config.proxy.check_dual_auth_headers,
        )
    }

    /// 是否配置了共享密钥
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    /// 校验请求头，返回具体的拒绝原因
    pub fn check(&self, headers: &HeaderMap) -> std::result::Result<(), AuthError> {
        let Some(secret) = self.secret.as_deref() else {
            return Err(AuthError::SharedSecretNotConfigured);
        };

        match AuthUtils::extract_shared_secret(headers, self.accept_bearer) {
            None => Err(AuthError::ApiKeyMissing),
            Some(provided) if provided == secret => Ok(()),
            Some(_) => Err(AuthError::ApiKeyInvalid),
        }
    }

    /// 校验请求并记录结果
    pub fn authenticate(&self, request_id: &str, headers: &HeaderMap) -> Result<()> {
        match self.check(headers) {
            Ok(()) => {
                ldebug!(
                    request_id,
                    LogStage::Authentication,
                    LogComponent::AuthGate,
                    "auth_passed",
                    "共享密钥校验通过"
                );
                Ok(())
            }
            Err(reason) => {
                lwarn!(
                    request_id,
                    LogStage::Authentication,
                    LogComponent::AuthGate,
                    "auth_rejected",
                    "Unauthorized request rejected",
                    reason = %reason
                );
                Err(reason.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProxyError;
    use axum::http::HeaderValue;
    use pretty_assertions::assert_eq;

    fn with_header(name: &'static str, value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_matching_secret_passes() {
        let gate = SharedSecretGate::new(Some("let-me-in".to_string()), true);
        assert_eq!(gate.check(&with_header("x-goog-api-key", "let-me-in")), Ok(()));
        assert_eq!(
            gate.check(&with_header("authorization", "Bearer let-me-in")),
            Ok(())
        );
    }

    #[test]
    fn test_wrong_or_missing_secret() {
        let gate = SharedSecretGate::new(Some("let-me-in".to_string()), true);
        assert_eq!(
            gate.check(&with_header("x-goog-api-key", "wrong-secret")),
            Err(AuthError::ApiKeyInvalid)
        );
        assert_eq!(gate.check(&HeaderMap::new()), Err(AuthError::ApiKeyMissing));
    }

    #[test]
    fn test_comparison_is_exact() {
        let gate = SharedSecretGate::new(Some("let-me-in".to_string()), true);
        assert_eq!(
            gate.check(&with_header("x-goog-api-key", "let-me-in ")),
            Err(AuthError::ApiKeyInvalid)
        );
        assert_eq!(
            gate.check(&with_header("x-goog-api-key", "LET-ME-IN")),
            Err(AuthError::ApiKeyInvalid)
        );
    }

    #[test]
    fn test_unconfigured_secret_rejects_everything() {
        for secret in [None, Some(String::new())] {
            let gate = SharedSecretGate::new(secret, true);
            assert!(!gate.is_configured());
            assert_eq!(
                gate.check(&with_header("x-goog-api-key", "")),
                Err(AuthError::SharedSecretNotConfigured)
            );
        }
    }

    #[test]
    fn test_single_header_mode_ignores_bearer() {
        let gate = SharedSecretGate::new(Some("let-me-in".to_string()), false);
        assert_eq!(
            gate.check(&with_header("authorization", "Bearer let-me-in")),
            Err(AuthError::ApiKeyMissing)
        );
    }

    #[test]
    fn test_authenticate_maps_to_unauthorized() {
        let gate = SharedSecretGate::new(Some("let-me-in".to_string()), true);
        let err = gate
            .authenticate("req", &with_header("x-goog-api-key", "nope"))
            .unwrap_err();
        assert!(matches!(err, ProxyError::Authentication { .. }));
        assert_eq!(err.public_message(), "Unauthorized: Invalid API Key");
    }
}
