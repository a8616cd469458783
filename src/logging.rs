//! # 日志配置模块
//!
//! 提供日志初始化、结构化日志宏以及凭据脱敏工具

use std::env;
use std::fmt;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// 请求处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStage {
    /// 启动阶段
    Startup,
    /// 关闭阶段
    Shutdown,
    /// 收到下游请求
    RequestStart,
    /// 共享密钥校验
    Authentication,
    /// 选择上游凭据
    KeySelection,
    /// 构建并发送上游请求
    UpstreamRequest,
    /// 处理上游响应
    Response,
    /// 健康统计记录
    HealthCheck,
    /// 健康存储读写
    Cache,
    /// 错误处理
    Error,
}

impl LogStage {
    /// 阶段名称
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Shutdown => "shutdown",
            Self::RequestStart => "request_start",
            Self::Authentication => "authentication",
            Self::KeySelection => "key_selection",
            Self::UpstreamRequest => "upstream_request",
            Self::Response => "response",
            Self::HealthCheck => "health_check",
            Self::Cache => "cache",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 产生日志的组件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogComponent {
    /// 主程序
    Main,
    /// 服务器装配
    ServerSetup,
    /// 共享密钥校验
    AuthGate,
    /// 密钥选择器
    KeySelector,
    /// 熔断器 / 健康统计
    HealthTracker,
    /// 健康存储
    Cache,
    /// 请求转发
    Forwarder,
    /// 请求处理入口
    Handler,
}

impl LogComponent {
    /// 组件名称
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::ServerSetup => "server_setup",
            Self::AuthGate => "auth_gate",
            Self::KeySelector => "key_selector",
            Self::HealthTracker => "health_tracker",
            Self::Cache => "cache",
            Self::Forwarder => "forwarder",
            Self::Handler => "handler",
        }
    }
}

impl fmt::Display for LogComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 结构化 debug 日志
///
/// `ldebug!(request_id, stage, component, operation, message, field = value, ...)`
#[macro_export]
macro_rules! ldebug {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(,)?) => {
        ::tracing::debug!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $message
        )
    };
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr, $($fields:tt)+) => {
        ::tracing::debug!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($fields)+,
            "{}",
            $message
        )
    };
}

/// 结构化 info 日志
#[macro_export]
macro_rules! linfo {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(,)?) => {
        ::tracing::info!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $message
        )
    };
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr, $($fields:tt)+) => {
        ::tracing::info!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($fields)+,
            "{}",
            $message
        )
    };
}

/// 结构化 warn 日志
#[macro_export]
macro_rules! lwarn {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(,)?) => {
        ::tracing::warn!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $message
        )
    };
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr, $($fields:tt)+) => {
        ::tracing::warn!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($fields)+,
            "{}",
            $message
        )
    };
}

/// 结构化 error 日志
#[macro_export]
macro_rules! lerror {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(,)?) => {
        ::tracing::error!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $message
        )
    };
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr, $($fields:tt)+) => {
        ::tracing::error!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($fields)+,
            "{}",
            $message
        )
    };
}

/// 凭据脱敏：只保留前 10 个字符
#[must_use]
pub fn mask_secret(secret: &str) -> String {
    const VISIBLE: usize = 10;
    if secret.chars().count() <= VISIBLE {
        return "***".to_string();
    }
    let prefix: String = secret.chars().take(VISIBLE).collect();
    format!("{prefix}...")
}

/// 初始化日志系统
///
/// `RUST_LOG` 优先；否则使用 `{level},gemini_key_proxy=debug`。
pub fn init_logging(log_level: Option<&str>) {
    let level = log_level.unwrap_or("info");
    let default_filter = format!("{level},gemini_key_proxy=debug,hyper=warn,reqwest=warn");

    let log_filter = env::var("RUST_LOG").unwrap_or(default_filter);

    // 重复初始化（例如测试中）直接忽略
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_new(&log_filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_secret_keeps_prefix_only() {
        assert_eq!(mask_secret("AIzaSyA1234567890abcdef"), "AIzaSyA123...");
    }

    #[test]
    fn test_mask_secret_hides_short_values() {
        assert_eq!(mask_secret("short"), "***");
        assert_eq!(mask_secret(""), "***");
    }

    #[test]
    fn test_stage_and_component_names() {
        assert_eq!(LogStage::KeySelection.to_string(), "key_selection");
        assert_eq!(LogComponent::HealthTracker.to_string(), "health_tracker");
    }
}
