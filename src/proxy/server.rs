//! # 代理服务器
//!
//! 基于 axum 的 HTTP 入口：任意路径、七种方法全部交给同一个处理函数。

use axum::Router;
use axum::routing::{MethodFilter, on};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::request_handler::proxy_handler;
use super::state::ProxyState;
use crate::config::AppConfig;
use crate::error::{ProxyError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::{lerror, linfo};

/// 代理接受的请求方法
#[must_use]
pub fn proxied_methods() -> MethodFilter {
    MethodFilter::GET
        .or(MethodFilter::POST)
        .or(MethodFilter::PUT)
        .or(MethodFilter::DELETE)
        .or(MethodFilter::PATCH)
        .or(MethodFilter::HEAD)
        .or(MethodFilter::OPTIONS)
}

/// 构建代理路由
pub fn build_router(state: ProxyState) -> Router {
    Router::new()
        .route("/", on(proxied_methods(), proxy_handler))
        .route("/{*path}", on(proxied_methods(), proxy_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// 代理服务器
pub struct ProxyServer {
    config: Arc<AppConfig>,
    router: Router,
}

impl ProxyServer {
    /// 使用已装配的状态创建服务器
    #[must_use]
    pub fn new(state: ProxyState) -> Self {
        let config = state.config();
        Self {
            config,
            router: build_router(state),
        }
    }

    /// 按配置初始化全部依赖并创建服务器
    pub async fn from_config(config: Arc<AppConfig>) -> Result<Self> {
        let state = ProxyState::initialize(config).await?;
        Ok(Self::new(state))
    }

    /// 路由（测试中可直接 `oneshot`）
    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// 绑定监听地址并运行，直到 `shutdown` 完成
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let bind_address = self.config.server.bind_address();
        let listener = TcpListener::bind(&bind_address).await.map_err(|e| {
            ProxyError::config_with_source(format!("无法监听地址 {bind_address}"), e)
        })?;
        let local_addr: SocketAddr = listener.local_addr()?;

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::ServerSetup,
            "server_start",
            &format!("Proxy server listening on {local_addr}")
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ProxyError::internal_with_source("代理服务器运行错误", e))?;

        linfo!(
            "system",
            LogStage::Shutdown,
            LogComponent::ServerSetup,
            "server_stopped",
            "Proxy server stopped"
        );
        Ok(())
    }
}

/// 等待 Ctrl+C 或 SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            lerror!(
                "system",
                LogStage::Shutdown,
                LogComponent::ServerSetup,
                "ctrl_c_error",
                &format!("Failed to listen for Ctrl+C: {e:?}")
            );
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                lerror!(
                    "system",
                    LogStage::Shutdown,
                    LogComponent::ServerSetup,
                    "sigterm_error",
                    &format!("Failed to listen for SIGTERM: {e:?}")
                );
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            linfo!("system", LogStage::Shutdown, LogComponent::ServerSetup, "shutdown_signal", "Received Ctrl+C signal");
        },
        () = terminate => {
            linfo!("system", LogStage::Shutdown, LogComponent::ServerSetup, "shutdown_signal", "Received SIGTERM signal");
        },
    }
}
