use crate::{
    config::Config,
    error::Result,
    models::stats::{BlogSummary, DailyStat, DateRange, ReadingEvent},
    services::stats::StatsStore,
};
use async_trait::async_trait;
use surrealdb::engine::remote::http::{Client, Http, Https};
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;
use tracing::{debug, error, info};

/// 数据库服务
#[derive(Clone)]
pub struct Database {
    client: Surreal<Client>,
}

impl Database {
    /// 创建新的数据库实例
    pub async fn new(config: &Config) -> Result<Self> {
        info!("Initializing database connection to {}", config.database_url);

        let client = match config.database_url.strip_prefix("https://") {
            Some(address) => Surreal::new::<Https>(address).await?,
            None => {
                let address = config
                    .database_url
                    .strip_prefix("http://")
                    .unwrap_or(&config.database_url);
                Surreal::new::<Http>(address).await?
            }
        };

        client
            .signin(Root {
                username: &config.database_username,
                password: &config.database_password,
            })
            .await?;
        client
            .use_ns(&config.database_namespace)
            .use_db(&config.database_name)
            .await?;

        Ok(Self { client })
    }

    /// 验证数据库连接
    pub async fn verify_connection(&self) -> Result<()> {
        match self.client.health().await {
            Ok(_) => {
                info!("Database connection verified successfully");
                Ok(())
            }
            Err(e) => {
                error!("Failed to verify database connection: {}", e);
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl StatsStore for Database {
    async fn find_blog(&self, blog_id: &str) -> Result<Option<BlogSummary>> {
        let query = r#"
            SELECT meta::id(id) AS id, author_id
            FROM type::thing('blog', $blog_id)
            WHERE is_deleted != true
        "#;
        debug!("Looking up blog {}", blog_id);

        let mut response = self
            .client
            .query(query)
            .bind(("blog_id", blog_id.to_string()))
            .await?;
        let blogs: Vec<BlogSummary> = response.take(0)?;
        Ok(blogs.into_iter().next())
    }

    async fn blogs_by_author(&self, author_id: &str) -> Result<Vec<BlogSummary>> {
        let query = r#"
            SELECT meta::id(id) AS id, author_id, created_at
            FROM blog
            WHERE author_id = $author_id
            AND is_deleted != true
            ORDER BY created_at ASC
        "#;

        let mut response = self
            .client
            .query(query)
            .bind(("author_id", author_id.to_string()))
            .await?;
        let blogs: Vec<BlogSummary> = response.take(0)?;
        debug!("Author {} owns {} blogs", author_id, blogs.len());
        Ok(blogs)
    }

    async fn daily_stats(&self, blog_ids: &[String], range: &DateRange) -> Result<Vec<DailyStat>> {
        // date 以 YYYY-MM-DD 字符串存储，可直接按字典序比较
        let query = r#"
            SELECT blog_id, date, view_count, like_count, comment_count
            FROM daily_stat
            WHERE blog_id IN $blog_ids
            AND date >= $start_date
            AND date <= $end_date
            ORDER BY blog_id ASC, date ASC
        "#;

        let mut response = self
            .client
            .query(query)
            .bind(("blog_ids", blog_ids.to_vec()))
            .bind(("start_date", range.start().to_string()))
            .bind(("end_date", range.end().to_string()))
            .await?;
        let stats: Vec<DailyStat> = response.take(0)?;
        debug!("Fetched {} daily stat rows for {} blogs", stats.len(), blog_ids.len());
        Ok(stats)
    }

    async fn reading_events(&self, blog_ids: &[String], range: &DateRange) -> Result<Vec<ReadingEvent>> {
        let query = r#"
            SELECT blog_id, user_id, referrer, browser, os, device, ip_address, created_at
            FROM reading_event
            WHERE blog_id IN $blog_ids
            AND created_at >= type::datetime($start_at)
            AND created_at < type::datetime($end_at)
            ORDER BY created_at ASC
        "#;

        let mut response = self
            .client
            .query(query)
            .bind(("blog_ids", blog_ids.to_vec()))
            .bind(("start_at", range.start_instant().to_rfc3339()))
            .bind(("end_at", range.end_instant_exclusive().to_rfc3339()))
            .await?;
        let events: Vec<ReadingEvent> = response.take(0)?;
        debug!("Fetched {} reading events for {} blogs", events.len(), blog_ids.len());
        Ok(events)
    }
}
