//! # 代理服务模块
//!
//! 共享密钥校验、密钥选择、请求转发与健康统计串联成一次代理请求

pub mod forwarding;
pub mod request_handler;
pub mod server;
pub mod state;
pub mod types;
pub mod upstream_url;

pub use forwarding::{EVENT_STREAM_CONTENT_TYPE, RequestForwarder, adjust_response_headers};
pub use request_handler::proxy_handler;
pub use server::{ProxyServer, build_router, shutdown_signal};
pub use state::{ProxyServices, ProxyState};
pub use types::AuthScheme;
pub use upstream_url::{UpstreamAddress, parse_base_url};
