//! # 错误类型定义

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use super::auth::AuthError;
use super::cache::CacheError;
use super::config::ConfigError;
use super::key_pool::KeyPoolError;
use super::network::NetworkError;

/// 应用主要错误类型
#[derive(Debug, Error)]
pub enum ProxyError {
    /// 配置相关错误
    #[error("配置错误: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 共享密钥校验失败
    #[error("认证错误: {message}")]
    Authentication {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 密钥池错误
    #[error("密钥池错误: {0}")]
    KeyPool(#[from] KeyPoolError),

    /// 健康存储错误
    #[error("缓存错误: {message}")]
    Cache {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 与上游通信失败
    #[error("上游传输错误: {message}")]
    UpstreamTransport {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 系统内部错误
    #[error("内部错误: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// IO相关错误
    #[error("IO错误: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// 附加了上下文的错误
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<ProxyError>,
    },
}

impl ProxyError {
    /// 将错误转换为HTTP状态码和错误代码
    #[must_use]
    pub fn to_http_response_parts(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Config { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            Self::Authentication { .. } => (StatusCode::UNAUTHORIZED, "AUTHENTICATION_ERROR"),
            Self::KeyPool(KeyPoolError::PoolEmpty) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "KEY_POOL_EMPTY")
            }
            Self::KeyPool(KeyPoolError::AllCredentialsDisabled { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "ALL_CREDENTIALS_DISABLED")
            }
            Self::Cache { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "CACHE_ERROR"),
            Self::UpstreamTransport { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "UPSTREAM_TRANSPORT_ERROR")
            }
            Self::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            Self::Io { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            Self::Context { source, .. } => source.to_http_response_parts(),
        }
    }

    /// 返回给下游的纯文本响应体
    ///
    /// 不包含内部细节，避免把上游地址或凭据信息泄露给调用方。
    #[must_use]
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::Authentication { .. } => "Unauthorized: Invalid API Key",
            Self::Config { .. } | Self::KeyPool(KeyPoolError::PoolEmpty) => {
                "Internal Server Error: API Key configuration error"
            }
            Self::KeyPool(KeyPoolError::AllCredentialsDisabled { .. }) => {
                "Internal Server Error: all API keys are temporarily disabled"
            }
            Self::Context { source, .. } => source.public_message(),
            _ => "Internal Server Error",
        }
    }

    /// 创建配置错误
    pub fn config<T: Into<String>>(message: T) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的配置错误
    pub fn config_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建缓存错误
    pub fn cache<T: Into<String>>(message: T) -> Self {
        Self::Cache {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的缓存错误
    pub fn cache_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Cache {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建带来源的上游传输错误
    pub fn upstream_transport_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::UpstreamTransport {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建带来源的内部错误
    pub fn internal_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, _) = self.to_http_response_parts();
        (
            status,
            [(header::CONTENT_TYPE, "text/plain")],
            self.public_message(),
        )
            .into_response()
    }
}

impl From<std::io::Error> for ProxyError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: "文件操作失败".to_string(),
            source: err,
        }
    }
}

impl From<toml::de::Error> for ProxyError {
    fn from(err: toml::de::Error) -> Self {
        Self::config_with_source("TOML解析失败", err)
    }
}

impl From<url::ParseError> for ProxyError {
    fn from(err: url::ParseError) -> Self {
        Self::config_with_source("URL解析失败", err)
    }
}

impl From<ConfigError> for ProxyError {
    fn from(err: ConfigError) -> Self {
        Self::config_with_source(err.to_string(), err)
    }
}

impl From<AuthError> for ProxyError {
    fn from(err: AuthError) -> Self {
        Self::Authentication {
            message: err.to_string(),
            source: Some(err.into()),
        }
    }
}

impl From<CacheError> for ProxyError {
    fn from(err: CacheError) -> Self {
        Self::cache_with_source(err.to_string(), err)
    }
}

impl From<redis::RedisError> for ProxyError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::from(err).into()
    }
}

impl From<NetworkError> for ProxyError {
    fn from(err: NetworkError) -> Self {
        Self::upstream_transport_with_source(err.to_string(), err)
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        NetworkError::from(err).into()
    }
}
