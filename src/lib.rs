//! # Gemini Key Proxy Library
//!
//! 多密钥轮换的 Gemini API 反向代理核心库：共享密钥校验、
//! 上游密钥随机选择、基于失败率的密钥熔断以及流式请求转发。

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod key_pool;
pub mod logging;
pub mod proxy;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{ProxyError, Result};
