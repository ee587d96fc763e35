use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{ser::SerializeMap, Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use validator::Validate;

use crate::{
    error::{AppError, Result},
    utils::validation::DATE_PATTERN,
};

/// 无法识别的分类统一归入该标签
pub const UNKNOWN_LABEL: &str = "Unknown";

/// 单篇博客某一天的互动汇总
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStat {
    pub blog_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub comment_count: u64,
}

/// 一次阅读访问的原始记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingEvent {
    pub blog_id: String,
    pub user_id: Option<String>,
    pub referrer: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub device: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 博客摘要，用于归属校验
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogSummary {
    pub id: String,
    pub author_id: String,
}

/// 闭区间日期范围，保证 start <= end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(AppError::Validation(format!(
                "startDate {} must not be after endDate {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// 范围包含的天数（含首尾）
    pub fn total_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// 范围起点的 UTC 时间戳
    pub fn start_instant(&self) -> DateTime<Utc> {
        self.start.and_time(chrono::NaiveTime::MIN).and_utc()
    }

    /// 范围终点次日零点（不含）
    pub fn end_instant_exclusive(&self) -> DateTime<Utc> {
        (self.end + Duration::days(1))
            .and_time(chrono::NaiveTime::MIN)
            .and_utc()
    }
}

/// 按采样日期对齐的互动序列
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BucketedSeries {
    pub dates: Vec<NaiveDate>,
    pub views: Vec<u64>,
    pub likes: Vec<u64>,
    pub comments: Vec<u64>,
}

impl BucketedSeries {
    /// 与给定采样日期等长的全零序列
    pub fn zeroed(dates: &[NaiveDate]) -> Self {
        Self {
            dates: dates.to_vec(),
            views: vec![0; dates.len()],
            likes: vec![0; dates.len()],
            comments: vec![0; dates.len()],
        }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReactionTotals {
    #[serde(rename = "total_views")]
    pub views: u64,
    #[serde(rename = "total_likes")]
    pub likes: u64,
    #[serde(rename = "total_comments")]
    pub comments: u64,
}

impl std::ops::AddAssign for ReactionTotals {
    fn add_assign(&mut self, other: Self) {
        self.views += other.views;
        self.likes += other.likes;
        self.comments += other.comments;
    }
}

/// 合并结果：序列及其总计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedSeries {
    pub series: BucketedSeries,
    pub totals: ReactionTotals,
}

/// 分类计数。`total` 单独维护，不与分类键混用。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryTally {
    counts: BTreeMap<String, u64>,
    total: u64,
}

impl CategoryTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, label: &str) {
        *self.counts.entry(label.to_string()).or_insert(0) += 1;
        self.total += 1;
    }

    pub fn get(&self, label: &str) -> u64 {
        self.counts.get(label).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn counts(&self) -> &BTreeMap<String, u64> {
        &self.counts
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

// 输出为扁平对象 { "<label>": n, ..., "total": N }
impl Serialize for CategoryTally {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.counts.len() + 1))?;
        for (label, count) in &self.counts {
            map.serialize_entry(label, count)?;
        }
        map.serialize_entry("total", &self.total)?;
        map.end()
    }
}

/// 四个维度的访问来源分布
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AudienceBreakdown {
    pub referrers: CategoryTally,
    pub browsers: CategoryTally,
    pub operating_systems: CategoryTally,
    pub devices: CategoryTally,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartData {
    pub reaction: BucketedSeries,
    #[serde(flatten)]
    pub audience: AudienceBreakdown,
}

/// 单篇博客统计响应
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlogStatsResponse {
    #[serde(rename = "chartData")]
    pub chart_data: ChartData,
    pub totals: ReactionTotals,
}

/// 作者全部博客的合并统计响应
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorStatsResponse {
    pub blog_ids: Vec<String>,
    #[serde(flatten)]
    pub stats: BlogStatsResponse,
}

/// 统计查询参数，日期格式为 YYYY-MM-DD
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    #[validate(
        required(message = "startDate is required"),
        regex(path = "DATE_PATTERN", message = "startDate must match YYYY-MM-DD")
    )]
    pub start_date: Option<String>,
    #[validate(
        required(message = "endDate is required"),
        regex(path = "DATE_PATTERN", message = "endDate must match YYYY-MM-DD")
    )]
    pub end_date: Option<String>,
}
