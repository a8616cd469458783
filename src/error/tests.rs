//! # 错误处理测试

use crate::error::auth::AuthError;
use crate::error::key_pool::KeyPoolError;
use crate::error::{Context, ProxyError};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use std::error::Error;

#[test]
fn test_config_error_creation() {
    let err = ProxyError::config("测试配置错误");
    assert!(matches!(err, ProxyError::Config { .. }));
    assert_eq!(err.to_string(), "配置错误: 测试配置错误");
}

#[test]
fn test_config_error_with_source() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "文件不存在");
    let err = ProxyError::config_with_source("配置文件加载失败", io_err);

    assert!(err.to_string().contains("配置错误: 配置文件加载失败"));
    assert!(err.source().is_some());
}

#[test]
fn test_auto_conversion_from_io_error() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "文件不存在");
    let proxy_err: ProxyError = io_err.into();

    assert!(matches!(proxy_err, ProxyError::Io { .. }));
    assert!(proxy_err.to_string().contains("IO错误: 文件操作失败"));
}

#[test]
fn test_auto_conversion_from_toml_error() {
    let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
    let proxy_err: ProxyError = toml_err.into();

    assert!(matches!(proxy_err, ProxyError::Config { .. }));
    assert!(proxy_err.to_string().contains("配置错误: TOML解析失败"));
}

#[test]
fn test_http_status_mapping() {
    assert_eq!(
        ProxyError::from(AuthError::ApiKeyInvalid).to_http_response_parts().0,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        ProxyError::from(KeyPoolError::PoolEmpty).to_http_response_parts(),
        (StatusCode::INTERNAL_SERVER_ERROR, "KEY_POOL_EMPTY")
    );
    assert_eq!(
        ProxyError::from(KeyPoolError::AllCredentialsDisabled { pool_size: 3 })
            .to_http_response_parts(),
        (StatusCode::INTERNAL_SERVER_ERROR, "ALL_CREDENTIALS_DISABLED")
    );
    assert_eq!(
        ProxyError::internal_with_source("boom", std::io::Error::other("boom"))
            .to_http_response_parts()
            .0,
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn test_public_message_hides_internal_details() {
    let err = ProxyError::internal_with_source(
        "连接 generativelanguage.googleapis.com 失败",
        std::io::Error::other("reset"),
    );
    assert_eq!(err.public_message(), "Internal Server Error");
    assert_eq!(
        ProxyError::config("keys").public_message(),
        "Internal Server Error: API Key configuration error"
    );
}

#[test]
fn test_context_keeps_status_of_inner_error() {
    let result: Result<(), ProxyError> = Err(AuthError::ApiKeyInvalid.into());
    let err = result.context("校验共享密钥").unwrap_err();

    assert!(err.to_string().starts_with("校验共享密钥: "));
    assert_eq!(err.to_http_response_parts().0, StatusCode::UNAUTHORIZED);
    assert_eq!(err.public_message(), "Unauthorized: Invalid API Key");
}

#[test]
fn test_lazy_context_wraps_pool_error() {
    let result: std::result::Result<(), KeyPoolError> = Err(KeyPoolError::PoolEmpty);
    let err = result.with_context(|| format!("选择密钥 {}", 1)).unwrap_err();

    assert!(matches!(err, ProxyError::Context { .. }));
    assert_eq!(
        err.public_message(),
        "Internal Server Error: API Key configuration error"
    );
}

#[tokio::test]
async fn test_into_response_is_plain_text() {
    let response = ProxyError::from(AuthError::ApiKeyMissing).into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/plain"
    );

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"Unauthorized: Invalid API Key");
}
