//! 集成测试公共设施：wiremock 上游 + 计数的内存健康存储 + 直接调用路由

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use tower::ServiceExt;
use wiremock::MockServer;

use gemini_key_proxy::Result;
use gemini_key_proxy::cache::{HealthStore, MemoryHealthStore};
use gemini_key_proxy::config::{AppConfig, HealthBackend};
use gemini_key_proxy::key_pool::SeededRandom;
use gemini_key_proxy::proxy::{ProxyServices, ProxyState, build_router};

pub const SHARED_SECRET: &str = "let-me-in";
pub const KEY_PREFIX: &str = "gemini_proxy";

/// 记录调用次数的内存健康存储
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryHealthStore,
    calls: AtomicUsize,
}

impl CountingStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl HealthStore for CountingStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.touch();
        self.inner.get(key).await
    }

    async fn hash_increment(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        self.touch();
        self.inner.hash_increment(key, field, delta).await
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.touch();
        self.inner.set_with_ttl(key, value, ttl).await
    }

    async fn get_all_fields(&self, key: &str) -> Result<Option<HashMap<String, String>>> {
        self.touch();
        self.inner.get_all_fields(key).await
    }

    fn backend_name(&self) -> &'static str {
        "counting-memory"
    }
}

/// 被测代理
pub struct TestProxy {
    pub router: Router,
    pub store: Arc<CountingStore>,
    pub upstream: MockServer,
}

impl TestProxy {
    /// 使用默认选项启动
    pub async fn start(keys: &str) -> Self {
        Self::start_with(keys, |_| {}).await
    }

    /// 启动前允许调整配置
    pub async fn start_with(keys: &str, adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let upstream = MockServer::start().await;

        let mut config = AppConfig::default();
        config.upstream.base_url = upstream.uri();
        config.auth.shared_secret = Some(SHARED_SECRET.to_string());
        config.key_pool.keys = keys.to_string();
        config.health.backend = HealthBackend::Memory;
        config.health.key_prefix = KEY_PREFIX.to_string();
        adjust(&mut config);

        let store = Arc::new(CountingStore::default());
        let services = ProxyServices::build(
            &config,
            Some(Arc::clone(&store) as Arc<dyn HealthStore>),
            Arc::new(SeededRandom::new(1)),
        )
        .expect("装配代理服务失败");
        let router = build_router(ProxyState::new(Arc::new(config), services));

        Self {
            router,
            store,
            upstream,
        }
    }

    /// 发送请求并读取完整响应
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, String) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, String::from_utf8_lossy(&body).into_owned())
    }

    /// 上游收到的请求数
    pub async fn upstream_hits(&self) -> usize {
        self.upstream
            .received_requests()
            .await
            .map_or(0, |requests| requests.len())
    }

    /// 上游收到的全部请求
    pub async fn upstream_requests(&self) -> Vec<wiremock::Request> {
        self.upstream.received_requests().await.unwrap_or_default()
    }

    pub fn health_key(credential: &str) -> String {
        format!("{KEY_PREFIX}:health:{credential}")
    }

    pub fn disabled_key(credential: &str) -> String {
        format!("{KEY_PREFIX}:disabled:{credential}")
    }
}

/// 携带正确共享密钥的请求
pub fn authorized(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-goog-api-key", SHARED_SECRET)
}
