use crate::{
    error::{AppError, Result},
    models::{response::ApiResponse, stats::{AuthorStatsResponse, BlogStatsResponse, StatsQuery}},
    services::auth::RequiredAuth,
    state::AppState,
    utils::validation::resolve_date_range,
};
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index_handler))
        .route("/me", get(get_author_stats))
        .route("/blogs/:blog_id", get(get_blog_stats))
}

async fn index_handler() -> Result<Json<Value>> {
    Ok(Json(json!({
        "success": true,
        "message": "Statistics API",
        "endpoints": [
            "GET /api/blog/stats/me?startDate=YYYY-MM-DD&endDate=YYYY-MM-DD - Combined stats of your blogs",
            "GET /api/blog/stats/blogs/:blog_id?startDate=YYYY-MM-DD&endDate=YYYY-MM-DD - Stats of one blog"
        ]
    })))
}

/// 获取单篇博客统计
/// GET /api/blog/stats/blogs/:blog_id?startDate=2024-01-01&endDate=2024-01-31
async fn get_blog_stats(
    State(state): State<Arc<AppState>>,
    RequiredAuth(user): RequiredAuth,
    Path(blog_id): Path<String>,
    query: std::result::Result<Query<StatsQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<BlogStatsResponse>>> {
    debug!("Getting blog stats for {} by user: {}", blog_id, user.id);

    let Query(query) = query.map_err(reject_query)?;
    let range = resolve_date_range(&query, state.config.stats_max_range_days)?;
    let stats = state
        .stats_service
        .get_blog_stats(&user, &blog_id, &range)
        .await?;

    Ok(Json(ApiResponse::success(stats)))
}

/// 获取当前作者全部博客的合并统计
/// GET /api/blog/stats/me?startDate=2024-01-01&endDate=2024-01-31
async fn get_author_stats(
    State(state): State<Arc<AppState>>,
    RequiredAuth(user): RequiredAuth,
    query: std::result::Result<Query<StatsQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<AuthorStatsResponse>>> {
    debug!("Getting author stats for user: {}", user.id);

    let Query(query) = query.map_err(reject_query)?;
    let range = resolve_date_range(&query, state.config.stats_max_range_days)?;
    let stats = state.stats_service.get_author_stats(&user, &range).await?;

    Ok(Json(ApiResponse::success(stats)))
}

/// 查询串无法解析（如重复参数）时按 JSON 错误体返回 400
fn reject_query(rejection: QueryRejection) -> AppError {
    debug!("Rejected stats query string: {}", rejection);
    AppError::BadRequest(rejection.body_text())
}
