//! # 认证工具函数
//!
//! 从下游请求头中提取调用方提供的共享密钥

use axum::http::{HeaderMap, header};

/// 下游与上游通用的 Gemini 原生认证头
pub const GOOG_API_KEY_HEADER: &str = "x-goog-api-key";

/// 认证工具类
pub struct AuthUtils;

impl AuthUtils {
    /// 读取非空的请求头值
    #[must_use]
    pub fn non_empty_header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
    }

    /// `从Authorization头中提取Bearer` token
    ///
    /// # 返回
    /// - `Some(&str)`: Bearer token部分
    /// - `None`: 不是Bearer类型的认证头，或 token 为空
    #[must_use]
    pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
        auth_header
            .strip_prefix("Bearer ")
            .filter(|token| !token.is_empty())
    }

    /// 提取调用方出示的共享密钥
    ///
    /// 优先 `X-Goog-Api-Key`；为空或缺失时，若 `accept_bearer` 开启再读取
    /// `Authorization: Bearer <token>`。只取第一个非空来源。
    #[must_use]
    pub fn extract_shared_secret(headers: &HeaderMap, accept_bearer: bool) -> Option<&str> {
        if let Some(key) = Self::non_empty_header(headers, GOOG_API_KEY_HEADER) {
            return Some(key);
        }

        if !accept_bearer {
            return None;
        }

        Self::non_empty_header(headers, header::AUTHORIZATION.as_str())
            .and_then(Self::extract_bearer_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use rstest::rstest;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_static(*value));
        }
        headers
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(
            AuthUtils::extract_bearer_token("Bearer sk-test123"),
            Some("sk-test123")
        );
        assert_eq!(AuthUtils::extract_bearer_token("Basic user:pass"), None);
        assert_eq!(AuthUtils::extract_bearer_token("Bearer "), None);
        assert_eq!(AuthUtils::extract_bearer_token(""), None);
    }

    #[rstest]
    #[case(&[("x-goog-api-key", "goog")], true, Some("goog"))]
    #[case(&[("authorization", "Bearer tok")], true, Some("tok"))]
    #[case(&[("x-goog-api-key", "goog"), ("authorization", "Bearer tok")], true, Some("goog"))]
    #[case(&[("x-goog-api-key", ""), ("authorization", "Bearer tok")], true, Some("tok"))]
    #[case(&[("authorization", "tok")], true, None)]
    #[case(&[("authorization", "Bearer tok")], false, None)]
    #[case(&[("x-goog-api-key", "goog")], false, Some("goog"))]
    #[case(&[], true, None)]
    fn test_extract_shared_secret(
        #[case] pairs: &[(&'static str, &'static str)],
        #[case] accept_bearer: bool,
        #[case] expected: Option<&str>,
    ) {
        let headers = headers(pairs);
        assert_eq!(
            AuthUtils::extract_shared_secret(&headers, accept_bearer),
            expected
        );
    }
}
