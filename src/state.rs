use crate::{
    config::Config,
    services::{auth::AuthService, stats::{StatsService, StatsStore}},
};
use governor::{clock::DefaultClock, state::keyed::DashMapStateStore, Quota, RateLimiter};
use std::{num::NonZeroU32, sync::Arc, time::Duration};
use tokio::time::sleep;
use tracing::debug;

pub type KeyedRateLimiter = RateLimiter<String, DashMapStateStore<String>, DefaultClock>;

/// 限流器清理周期
const RATE_LIMITER_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// 应用程序的共享状态
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Config,

    /// 认证服务
    pub auth_service: AuthService,

    /// 统计服务
    pub stats_service: StatsService,

    /// 按客户端 IP 的速率限制器
    pub rate_limiter: Arc<KeyedRateLimiter>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn StatsStore>) -> anyhow::Result<Self> {
        let requests_per_minute = NonZeroU32::new(config.rate_limit_requests)
            .ok_or_else(|| anyhow::anyhow!("RATE_LIMIT_REQUESTS must be greater than zero"))?;

        let mut stats_service = StatsService::new(store);
        if config.stats_cache_enabled {
            stats_service = stats_service.with_cache(Duration::from_secs(config.cache_ttl));
        }

        let rate_limiter = Arc::new(RateLimiter::dashmap(Quota::per_minute(requests_per_minute)));

        // 在 tokio 运行时内才启动后台清理任务，限流器被释放后退出
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let limiter_ref = Arc::downgrade(&rate_limiter);
            handle.spawn(async move {
                loop {
                    sleep(RATE_LIMITER_SWEEP_INTERVAL).await;
                    match limiter_ref.upgrade() {
                        Some(limiter) => prune_rate_limiter(&limiter),
                        None => break,
                    }
                }
            });
        }

        Ok(Self {
            auth_service: AuthService::new(&config),
            stats_service,
            rate_limiter,
            config,
        })
    }
}

/// 移除已恢复满额的客户端条目，避免键空间无限增长
pub fn prune_rate_limiter(limiter: &KeyedRateLimiter) {
    let before = limiter.len();
    limiter.retain_recent();
    limiter.shrink_to_fit();
    debug!("Rate limiter sweep: {} -> {} tracked clients", before, limiter.len());
}
