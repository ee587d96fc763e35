use crate::{
    error::{AppError, Result},
    models::stats::{
        AuthorStatsResponse, BlogStatsResponse, BlogSummary, ChartData, DailyStat, DateRange,
        ReadingEvent,
    },
    services::{auth::User, aggregation},
    utils::cache::Cache,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 统计数据的查询层
#[async_trait]
pub trait StatsStore: Send + Sync {
    /// 按 ID 查找博客
    async fn find_blog(&self, blog_id: &str) -> Result<Option<BlogSummary>>;

    /// 作者名下未删除的博客
    async fn blogs_by_author(&self, author_id: &str) -> Result<Vec<BlogSummary>>;

    /// 范围内的按日数据，每篇博客内按日期升序
    async fn daily_stats(&self, blog_ids: &[String], range: &DateRange) -> Result<Vec<DailyStat>>;

    /// 范围内的阅读记录，按时间升序
    async fn reading_events(&self, blog_ids: &[String], range: &DateRange) -> Result<Vec<ReadingEvent>>;
}

#[derive(Clone)]
pub struct StatsService {
    store: Arc<dyn StatsStore>,
    blog_cache: Option<Cache<BlogStatsResponse>>,
    author_cache: Option<Cache<AuthorStatsResponse>>,
}

impl StatsService {
    pub fn new(store: Arc<dyn StatsStore>) -> Self {
        Self {
            store,
            blog_cache: None,
            author_cache: None,
        }
    }

    /// 启用响应缓存
    pub fn with_cache(mut self, ttl: Duration) -> Self {
        self.blog_cache = Some(Cache::new(ttl));
        self.author_cache = Some(Cache::new(ttl));
        self
    }

    /// 获取单篇博客的统计，只有作者本人可以查看
    pub async fn get_blog_stats(
        &self,
        user: &User,
        blog_id: &str,
        range: &DateRange,
    ) -> Result<BlogStatsResponse> {
        debug!("Getting stats for blog {} requested by {}", blog_id, user.id);

        let blog = self
            .store
            .find_blog(blog_id)
            .await?
            .ok_or_else(|| AppError::not_found("Blog"))?;

        if blog.author_id != user.id {
            warn!("User {} attempted to read stats of blog {}", user.id, blog.id);
            return Err(AppError::forbidden("Only the author can view blog statistics"));
        }

        let cache_key = cache_key("blog", &blog.id, range);
        if let Some(cached) = self.blog_cache.as_ref().and_then(|c| c.get(&cache_key)) {
            debug!("Serving cached stats for blog {}", blog.id);
            return Ok(cached);
        }

        let blog_ids = vec![blog.id.clone()];
        let daily_stats = self.store.daily_stats(&blog_ids, range).await?;
        let events = self.store.reading_events(&blog_ids, range).await?;

        let buckets = aggregation::bucket_dates(range.start(), range.end());
        let merged = aggregation::merge(&daily_stats, &buckets);
        let audience = aggregation::classify(&events);

        let response = BlogStatsResponse {
            chart_data: ChartData {
                reaction: merged.series,
                audience,
            },
            totals: merged.totals,
        };

        if let Some(cache) = &self.blog_cache {
            cache.set(cache_key, response.clone());
            info!("Cached stats for blog {} ({} buckets)", blog.id, buckets.len());
        }

        Ok(response)
    }

    /// 获取作者全部博客的合并统计
    pub async fn get_author_stats(&self, user: &User, range: &DateRange) -> Result<AuthorStatsResponse> {
        debug!("Getting combined stats for author {}", user.id);

        let cache_key = cache_key("author", &user.id, range);
        if let Some(cached) = self.author_cache.as_ref().and_then(|c| c.get(&cache_key)) {
            debug!("Serving cached stats for author {}", user.id);
            return Ok(cached);
        }

        let blog_ids: Vec<String> = self
            .store
            .blogs_by_author(&user.id)
            .await?
            .into_iter()
            .map(|blog| blog.id)
            .collect();

        let buckets = aggregation::bucket_dates(range.start(), range.end());

        let (daily_stats, events) = if blog_ids.is_empty() {
            (Vec::new(), Vec::new())
        } else {
            (
                self.store.daily_stats(&blog_ids, range).await?,
                self.store.reading_events(&blog_ids, range).await?,
            )
        };

        let per_blog = aggregation::group_by_blog(daily_stats);
        let combined = aggregation::combine_across_blogs(&per_blog, &buckets);
        let audience = aggregation::classify(&events);

        let response = AuthorStatsResponse {
            blog_ids,
            stats: BlogStatsResponse {
                chart_data: ChartData {
                    reaction: combined.series,
                    audience,
                },
                totals: combined.totals,
            },
        };

        if let Some(cache) = &self.author_cache {
            cache.set(cache_key, response.clone());
            info!(
                "Cached combined stats for author {} across {} blogs",
                user.id,
                response.blog_ids.len()
            );
        }

        Ok(response)
    }
}

fn cache_key(scope: &str, id: &str, range: &DateRange) -> String {
    format!("{}:{}:{}:{}", scope, id, range.start(), range.end())
}
