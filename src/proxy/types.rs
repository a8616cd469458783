//! # 代理类型定义

use std::fmt;

/// OpenAI 兼容接口的路径片段
pub const OPENAI_PATH_SEGMENT: &str = "/openai/";

/// 出站请求携带上游凭据的方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `X-Goog-Api-Key: <key>`
    Native,
    /// `Authorization: Bearer <key>`
    OpenAiCompatible,
}

impl AuthScheme {
    /// 按请求路径判断认证方式；关闭双认证头时始终使用原生方式
    #[must_use]
    pub fn for_path(path: &str, check_dual_auth_headers: bool) -> Self {
        if check_dual_auth_headers && path.contains(OPENAI_PATH_SEGMENT) {
            Self::OpenAiCompatible
        } else {
            Self::Native
        }
    }

    /// 名称（日志用）
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::OpenAiCompatible => "openai",
        }
    }
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/v1beta/openai/chat/completions", true, AuthScheme::OpenAiCompatible)]
    #[case("/v1beta/models", true, AuthScheme::Native)]
    #[case("/v1beta/openai", true, AuthScheme::Native)]
    #[case("/v1beta/openai/chat/completions", false, AuthScheme::Native)]
    fn test_scheme_for_path(#[case] path: &str, #[case] dual: bool, #[case] expected: AuthScheme) {
        assert_eq!(AuthScheme::for_path(path, dual), expected);
    }
}
