//! # 认证模块
//!
//! 下游共享密钥校验

pub mod service;
pub mod utils;

pub use service::SharedSecretGate;
pub use utils::{AuthUtils, GOOG_API_KEY_HEADER};
