use crate::auth::SharedSecretGate;
use crate::cache::{CacheKeyBuilder, HealthStore, connect_health_store};
use crate::config::{AppConfig, HealthBackend};
use crate::error::Result;
use crate::key_pool::{
    ApiKeyHealthTracker, HealthPolicy, KeyPool, KeySelector, RandomSource, ThreadRandom,
};
use crate::logging::{LogComponent, LogStage};
use crate::proxy::forwarding::RequestForwarder;
use crate::{linfo, lwarn};
use std::ops::Deref;
use std::sync::Arc;

/// 代理服务集合
#[derive(Clone)]
pub struct ProxyServices {
    /// 共享密钥校验
    pub gate: SharedSecretGate,
    /// 上游密钥选择
    pub selector: KeySelector,
    /// 未启用健康统计时为 `None`
    pub tracker: Option<ApiKeyHealthTracker>,
    /// 出站请求转发
    pub forwarder: RequestForwarder,
}

impl ProxyServices {
    /// 用给定的健康存储与随机数来源装配服务
    ///
    /// `proxy.track_health = false` 时忽略 `store`。
    pub fn build(
        config: &AppConfig,
        store: Option<Arc<dyn HealthStore>>,
        random: Arc<dyn RandomSource>,
    ) -> Result<Self> {
        let store = store.filter(|_| config.proxy.track_health);
        let keys = CacheKeyBuilder::new(config.health.key_prefix.clone());
        let pool = KeyPool::from_config_str(&config.key_pool.keys);

        let tracker = store.clone().map(|store| {
            ApiKeyHealthTracker::new(store, keys.clone(), HealthPolicy::from(&config.health))
        });

        Ok(Self {
            gate: SharedSecretGate::from_config(config),
            selector: KeySelector::new(pool, store, keys, random),
            tracker,
            forwarder: RequestForwarder::new(&config.upstream, config.proxy)?,
        })
    }
}

/// 代理服务的共享状态
///
/// 持有所有代理服务运行所需的依赖项。
#[derive(Clone)]
pub struct ProxyState {
    config: Arc<AppConfig>,
    services: Arc<ProxyServices>,
}

impl ProxyState {
    #[must_use]
    pub fn new(config: Arc<AppConfig>, services: ProxyServices) -> Self {
        Self {
            config,
            services: Arc::new(services),
        }
    }

    /// 按配置连接健康存储并装配全部服务
    ///
    /// 健康存储不可用时降级为不统计，服务照常启动。
    pub async fn initialize(config: Arc<AppConfig>) -> Result<Self> {
        let store = connect_store_or_degrade(&config).await;
        let services = ProxyServices::build(&config, store, Arc::new(ThreadRandom))?;

        let pool_size = services.selector.pool().len();
        if pool_size == 0 {
            lwarn!(
                "system",
                LogStage::Startup,
                LogComponent::ServerSetup,
                "empty_key_pool",
                "未配置任何上游密钥，所有请求将返回配置错误"
            );
        }
        if !services.gate.is_configured() {
            lwarn!(
                "system",
                LogStage::Startup,
                LogComponent::ServerSetup,
                "shared_secret_missing",
                "未配置共享密钥，所有请求将被拒绝"
            );
        }

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::ServerSetup,
            "proxy_state_ready",
            "Proxy services initialized",
            pool_size = pool_size,
            health_tracking = services.tracker.is_some(),
            dual_auth_headers = config.proxy.check_dual_auth_headers,
            upstream = %services.forwarder.upstream().origin
        );

        Ok(Self::new(config, services))
    }

    #[must_use]
    pub fn config(&self) -> Arc<AppConfig> {
        Arc::clone(&self.config)
    }
}

impl Deref for ProxyState {
    type Target = ProxyServices;

    fn deref(&self) -> &Self::Target {
        &self.services
    }
}

async fn connect_store_or_degrade(config: &AppConfig) -> Option<Arc<dyn HealthStore>> {
    if !config.proxy.track_health {
        return None;
    }

    if config.health.backend == HealthBackend::None {
        lwarn!(
            "system",
            LogStage::Startup,
            LogComponent::HealthTracker,
            "health_backend_none",
            "track_health 已开启但 health.backend = none，不进行健康统计"
        );
        return None;
    }

    match connect_health_store(&config.health).await {
        Ok(store) => {
            if let Some(store) = &store {
                linfo!(
                    "system",
                    LogStage::Startup,
                    LogComponent::HealthTracker,
                    "health_store_ready",
                    "Health store connected",
                    backend = store.backend_name()
                );
            }
            store
        }
        Err(e) => {
            lwarn!(
                "system",
                LogStage::Startup,
                LogComponent::HealthTracker,
                "health_store_unavailable",
                "健康存储不可用，降级为不统计、所有密钥视为可用",
                error = %e
            );
            None
        }
    }
}
