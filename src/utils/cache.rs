use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// 缓存项
#[derive(Debug, Clone)]
struct CacheItem<T> {
    value: T,
    expires_at: Instant,
}

/// 简单的内存 TTL 缓存
#[derive(Debug, Clone)]
pub struct Cache<T: Clone + Send + Sync> {
    data: Arc<RwLock<HashMap<String, CacheItem<T>>>>,
    default_ttl: Duration,
}

impl<T: Clone + Send + Sync + 'static> Cache<T> {
    /// 创建新的缓存实例
    pub fn new(default_ttl: Duration) -> Self {
        let cache = Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            default_ttl,
        };

        // 在 tokio 运行时内才启动后台清理任务
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let data_ref = Arc::downgrade(&cache.data);
            handle.spawn(async move {
                loop {
                    sleep(Duration::from_secs(300)).await;
                    match data_ref.upgrade() {
                        Some(data) => Self::cleanup_expired(&data),
                        None => break,
                    }
                }
            });
        }

        cache
    }

    /// 设置缓存项
    pub fn set(&self, key: String, value: T) {
        self.set_with_ttl(key, value, self.default_ttl)
    }

    /// 设置带有自定义TTL的缓存项
    pub fn set_with_ttl(&self, key: String, value: T, ttl: Duration) {
        let item = CacheItem {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.data.write().insert(key, item);
    }

    /// 获取缓存项，过期项视为不存在
    pub fn get(&self, key: &str) -> Option<T> {
        let data = self.data.read();
        data.get(key)
            .filter(|item| item.expires_at > Instant::now())
            .map(|item| item.value.clone())
    }

    /// 删除缓存项
    pub fn delete(&self, key: &str) -> bool {
        self.data.write().remove(key).is_some()
    }

    /// 获取缓存大小
    pub fn size(&self) -> usize {
        self.data.read().len()
    }

    fn cleanup_expired(data: &RwLock<HashMap<String, CacheItem<T>>>) {
        let now = Instant::now();
        data.write().retain(|_, item| item.expires_at > now);
    }
}
