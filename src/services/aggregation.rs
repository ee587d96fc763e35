//! 统计聚合：日期采样、访问来源分类、按日数据合并。
//!
//! 这里的函数都是纯计算，不做任何 I/O。调用方负责先取好数据并保证
//! 每篇博客的 `DailyStat` 已按日期升序排列。

use crate::models::stats::{
    AudienceBreakdown, BucketedSeries, DailyStat, MergedSeries, ReactionTotals, ReadingEvent,
    UNKNOWN_LABEL,
};
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;
use url::Url;

/// 图表最多展示的采样点数量
pub const MAX_BUCKETS: i64 = 31;

/// 在 [start, end] 内按固定步长采样日期，最多 31 个点。
///
/// 步长为 `ceil(总天数 / 31)`，最后一个点可能落在 `end` 之前。
/// `start > end` 时返回空序列。
pub fn bucket_dates(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    if start > end {
        return Vec::new();
    }

    let total_days = (end - start).num_days() + 1;
    let step = (total_days + MAX_BUCKETS - 1) / MAX_BUCKETS;

    let mut dates = Vec::with_capacity(total_days.min(MAX_BUCKETS) as usize);
    let mut current = start;
    while current <= end {
        dates.push(current);
        current += Duration::days(step);
    }
    dates
}

/// 提取来源 URL 的主机名，无法解析时归为 Unknown
pub fn referrer_host(referrer: Option<&str>) -> String {
    referrer
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .and_then(|r| Url::parse(r).ok())
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| UNKNOWN_LABEL.to_string())
}

/// 缺失或空白值记为 Unknown，其余去掉首尾空白
fn label_or_unknown(value: Option<&str>) -> &str {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => UNKNOWN_LABEL,
    }
}

/// 按来源、浏览器、操作系统、设备四个维度统计访问记录
pub fn classify(events: &[ReadingEvent]) -> AudienceBreakdown {
    let mut breakdown = AudienceBreakdown::default();

    for event in events {
        breakdown
            .referrers
            .record(&referrer_host(event.referrer.as_deref()));
        breakdown
            .browsers
            .record(label_or_unknown(event.browser.as_deref()));
        breakdown
            .operating_systems
            .record(label_or_unknown(event.os.as_deref()));
        breakdown
            .devices
            .record(label_or_unknown(event.device.as_deref()));
    }

    breakdown
}

/// 将单篇博客的按日数据对齐到采样日期上。
///
/// 双指针扫描：日期与采样点相同则取值，早于采样点的记录直接跳过，
/// 不会累加到下一个采样点。总计只包含命中采样点的记录。
pub fn merge(daily_stats: &[DailyStat], bucket_dates: &[NaiveDate]) -> MergedSeries {
    let mut series = BucketedSeries::zeroed(bucket_dates);
    let mut totals = ReactionTotals::default();

    let mut s = 0;
    let mut d = 0;
    while d < bucket_dates.len() {
        let bucket = bucket_dates[d];
        match daily_stats.get(s) {
            Some(stat) if stat.date < bucket => {
                s += 1;
            }
            Some(stat) if stat.date == bucket => {
                series.views[d] = stat.view_count;
                series.likes[d] = stat.like_count;
                series.comments[d] = stat.comment_count;
                totals += ReactionTotals {
                    views: stat.view_count,
                    likes: stat.like_count,
                    comments: stat.comment_count,
                };
                s += 1;
                d += 1;
            }
            // 没有剩余记录，或记录晚于当前采样点
            _ => {
                d += 1;
            }
        }
    }

    MergedSeries { series, totals }
}

/// 分别合并每篇博客的数据，再逐点求和
pub fn combine_across_blogs(
    per_blog_daily_stats: &BTreeMap<String, Vec<DailyStat>>,
    bucket_dates: &[NaiveDate],
) -> MergedSeries {
    let mut combined = MergedSeries {
        series: BucketedSeries::zeroed(bucket_dates),
        totals: ReactionTotals::default(),
    };

    for stats in per_blog_daily_stats.values() {
        let merged = merge(stats, bucket_dates);
        for i in 0..bucket_dates.len() {
            combined.series.views[i] += merged.series.views[i];
            combined.series.likes[i] += merged.series.likes[i];
            combined.series.comments[i] += merged.series.comments[i];
        }
        combined.totals += merged.totals;
    }

    combined
}

/// 按博客分组，保持每组内的原有顺序
pub fn group_by_blog(daily_stats: Vec<DailyStat>) -> BTreeMap<String, Vec<DailyStat>> {
    let mut grouped: BTreeMap<String, Vec<DailyStat>> = BTreeMap::new();
    for stat in daily_stats {
        grouped.entry(stat.blog_id.clone()).or_default().push(stat);
    }
    grouped
}
