use crate::{
    error::{AppError, Result},
    models::stats::{DateRange, StatsQuery},
};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use validator::Validate;

/// 查询参数中的日期格式
pub static DATE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

/// 解析 YYYY-MM-DD 格式的日历日期
pub fn parse_calendar_date(field: &str, value: &str) -> Result<NaiveDate> {
    if !DATE_PATTERN.is_match(value) {
        return Err(AppError::Validation(format!("{} must match YYYY-MM-DD", field)));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("{} is not a valid calendar date", field)))
}

/// 校验查询参数并生成日期范围
pub fn resolve_date_range(query: &StatsQuery, max_range_days: i64) -> Result<DateRange> {
    query.validate()?;

    let start = query
        .start_date
        .as_deref()
        .ok_or_else(|| AppError::validation("startDate is required"))?;
    let end = query
        .end_date
        .as_deref()
        .ok_or_else(|| AppError::validation("endDate is required"))?;

    let range = DateRange::new(
        parse_calendar_date("startDate", start)?,
        parse_calendar_date("endDate", end)?,
    )?;

    if range.total_days() > max_range_days {
        return Err(AppError::Validation(format!(
            "Date range may span at most {} days",
            max_range_days
        )));
    }

    Ok(range)
}
