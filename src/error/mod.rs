//! # 错误处理
//!
//! `ProxyError` 是全部公开操作的错误类型；各领域的子错误通过 `From` 汇入，
//! 再由 `IntoResponse` 统一渲染为纯文本响应。

pub mod auth;
pub mod cache;
pub mod config;
pub mod key_pool;
pub mod macros;
pub mod network;
pub mod types;

pub use types::ProxyError;

/// 全局 `Result` 别名
pub type Result<T> = std::result::Result<T, ProxyError>;

/// 为任意可转换为 `ProxyError` 的错误附加上下文
///
/// 附加上下文不改变状态码与对外消息，二者都取自内层错误。
pub trait Context<T> {
    /// 附加固定的上下文信息
    fn context<C: std::fmt::Display>(self, context: C) -> Result<T>;

    /// 仅在出错时才构造上下文信息
    fn with_context<C: std::fmt::Display, F: FnOnce() -> C>(self, context: F) -> Result<T>;
}

impl<T, E: Into<ProxyError>> Context<T> for std::result::Result<T, E> {
    fn context<C: std::fmt::Display>(self, context: C) -> Result<T> {
        self.with_context(|| context)
    }

    fn with_context<C: std::fmt::Display, F: FnOnce() -> C>(self, context: F) -> Result<T> {
        self.map_err(|error| ProxyError::Context {
            context: context().to_string(),
            source: Box::new(error.into()),
        })
    }
}

#[cfg(test)]
mod tests;
