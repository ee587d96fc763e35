use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use rainbow_blog_stats::{
    config::Config,
    error::Result,
    models::stats::{BlogSummary, DailyStat, DateRange, ReadingEvent},
    routes::app_router,
    services::{AuthService, StatsStore},
    state::AppState,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct MemoryStore {
    blogs: Vec<BlogSummary>,
    daily_stats: Vec<DailyStat>,
    events: Vec<ReadingEvent>,
}

#[async_trait]
impl StatsStore for MemoryStore {
    async fn find_blog(&self, blog_id: &str) -> Result<Option<BlogSummary>> {
        Ok(self.blogs.iter().find(|b| b.id == blog_id).cloned())
    }

    async fn blogs_by_author(&self, author_id: &str) -> Result<Vec<BlogSummary>> {
        Ok(self.blogs.iter().filter(|b| b.author_id == author_id).cloned().collect())
    }

    async fn daily_stats(&self, blog_ids: &[String], range: &DateRange) -> Result<Vec<DailyStat>> {
        Ok(self
            .daily_stats
            .iter()
            .filter(|s| blog_ids.contains(&s.blog_id) && s.date >= range.start() && s.date <= range.end())
            .cloned()
            .collect())
    }

    async fn reading_events(&self, blog_ids: &[String], range: &DateRange) -> Result<Vec<ReadingEvent>> {
        Ok(self
            .events
            .iter()
            .filter(|e| {
                blog_ids.contains(&e.blog_id)
                    && e.created_at >= range.start_instant()
                    && e.created_at < range.end_instant_exclusive()
            })
            .cloned()
            .collect())
    }
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn blog(id: &str, author: &str) -> BlogSummary {
    BlogSummary {
        id: id.to_string(),
        author_id: author.to_string(),
    }
}

fn stat(blog_id: &str, day: &str, views: u64, likes: u64, comments: u64) -> DailyStat {
    DailyStat {
        blog_id: blog_id.to_string(),
        date: date(day),
        view_count: views,
        like_count: likes,
        comment_count: comments,
    }
}

fn visit(blog_id: &str, referrer: Option<&str>, browser: Option<&str>, day: u32) -> ReadingEvent {
    ReadingEvent {
        blog_id: blog_id.to_string(),
        user_id: Some("reader".to_string()),
        referrer: referrer.map(str::to_string),
        browser: browser.map(str::to_string),
        os: Some("Linux".to_string()),
        device: None,
        ip_address: Some("203.0.113.9".to_string()),
        created_at: Utc.with_ymd_and_hms(2024, 1, day, 9, 0, 0).unwrap(),
    }
}

fn test_config() -> Config {
    Config {
        jwt_secret: "test-secret".to_string(),
        rate_limit_requests: 1000,
        stats_cache_enabled: false,
        ..Config::default()
    }
}

fn setup() -> (Router, AuthService) {
    setup_with(test_config())
}

fn setup_with(config: Config) -> (Router, AuthService) {
    let store = MemoryStore {
        blogs: vec![blog("post1", "alice"), blog("post2", "alice"), blog("post3", "bob")],
        daily_stats: vec![
            stat("post1", "2024-01-02", 5, 1, 0),
            stat("post2", "2024-01-02", 2, 0, 1),
            stat("post2", "2024-01-03", 3, 1, 1),
            stat("post3", "2024-01-01", 50, 5, 5),
        ],
        events: vec![
            visit("post1", Some("https://google.com/x"), Some("Chrome"), 2),
            visit("post1", Some("not a url"), None, 3),
            visit("post2", Some("https://twitter.com/status/1"), Some("Safari"), 3),
            visit("post3", Some("https://bing.com"), Some("Edge"), 1),
        ],
    };

    let auth = AuthService::new(&config);
    let state = Arc::new(AppState::new(config, Arc::new(store)).unwrap());
    (app_router(state), auth)
}

fn token(auth: &AuthService, user_id: &str) -> String {
    auth.issue_token(user_id, Duration::hours(1)).unwrap()
}

async fn get(app: Router, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let response = app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();

    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_blog_stats_requires_authentication() {
    let (app, _) = setup();
    let (status, body) = get(app, "/api/blog/stats/blogs/post1?startDate=2024-01-01&endDate=2024-01-03", None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTHENTICATION_ERROR");
}

#[tokio::test]
async fn test_blog_stats_rejects_invalid_token() {
    let (app, _) = setup();
    let (status, _) = get(
        app,
        "/api/blog/stats/blogs/post1?startDate=2024-01-01&endDate=2024-01-03",
        Some("garbage"),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_blog_stats_response_shape() {
    let (app, auth) = setup();
    let token = token(&auth, "alice");
    let (status, body) = get(
        app,
        "/api/blog/stats/blogs/post1?startDate=2024-01-01&endDate=2024-01-03",
        Some(&token),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let data = &body["data"];
    assert_eq!(
        data["chartData"]["reaction"],
        json!({
            "dates": ["2024-01-01", "2024-01-02", "2024-01-03"],
            "views": [0, 5, 0],
            "likes": [0, 1, 0],
            "comments": [0, 0, 0]
        })
    );
    assert_eq!(data["chartData"]["referrers"], json!({"google.com": 1, "Unknown": 1, "total": 2}));
    assert_eq!(data["chartData"]["browsers"], json!({"Chrome": 1, "Unknown": 1, "total": 2}));
    assert_eq!(data["chartData"]["operating_systems"], json!({"Linux": 2, "total": 2}));
    assert_eq!(data["chartData"]["devices"], json!({"Unknown": 2, "total": 2}));
    assert_eq!(
        data["totals"],
        json!({"total_views": 5, "total_likes": 1, "total_comments": 0})
    );
}

#[tokio::test]
async fn test_blog_stats_forbidden_for_other_authors() {
    let (app, auth) = setup();
    let token = token(&auth, "bob");
    let (status, body) = get(
        app,
        "/api/blog/stats/blogs/post1?startDate=2024-01-01&endDate=2024-01-03",
        Some(&token),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "AUTHORIZATION_ERROR");
}

#[tokio::test]
async fn test_blog_stats_unknown_blog() {
    let (app, auth) = setup();
    let token = token(&auth, "alice");
    let (status, _) = get(
        app,
        "/api/blog/stats/blogs/nope?startDate=2024-01-01&endDate=2024-01-03",
        Some(&token),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_end_date_is_rejected() {
    let (app, auth) = setup();
    let token = token(&auth, "alice");
    let (status, body) = get(app, "/api/blog/stats/blogs/post1?startDate=2024-01-01", Some(&token)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_malformed_and_impossible_dates_are_rejected() {
    let (app, auth) = setup();
    let token = token(&auth, "alice");

    let (status, _) = get(
        app.clone(),
        "/api/blog/stats/blogs/post1?startDate=01-01-2024&endDate=2024-01-03",
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(
        app,
        "/api/blog/stats/blogs/post1?startDate=2024-02-01&endDate=2024-02-30",
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_inverted_range_is_rejected() {
    let (app, auth) = setup();
    let token = token(&auth, "alice");
    let (status, body) = get(app, "/api/blog/stats/me?startDate=2024-01-05&endDate=2024-01-01", Some(&token)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_author_stats_combine_blogs() {
    let (app, auth) = setup();
    let token = token(&auth, "alice");
    let (status, body) = get(app, "/api/blog/stats/me?startDate=2024-01-01&endDate=2024-01-03", Some(&token)).await;

    assert_eq!(status, StatusCode::OK);

    let data = &body["data"];
    assert_eq!(data["blog_ids"], json!(["post1", "post2"]));
    assert_eq!(data["chartData"]["reaction"]["views"], json!([0, 7, 3]));
    assert_eq!(data["chartData"]["reaction"]["likes"], json!([0, 1, 1]));
    assert_eq!(data["chartData"]["reaction"]["comments"], json!([0, 1, 1]));
    assert_eq!(data["chartData"]["referrers"]["twitter.com"], 1);
    assert_eq!(data["chartData"]["referrers"]["total"], 3);
    assert!(data["chartData"]["referrers"].get("bing.com").is_none());
    assert_eq!(
        data["totals"],
        json!({"total_views": 10, "total_likes": 2, "total_comments": 2})
    );
}

#[tokio::test]
async fn test_author_without_blogs_gets_zero_series() {
    let (app, auth) = setup();
    let token = token(&auth, "carol");
    let (status, body) = get(app, "/api/blog/stats/me?startDate=2024-01-01&endDate=2024-01-02", Some(&token)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["blog_ids"], json!([]));
    assert_eq!(body["data"]["chartData"]["reaction"]["views"], json!([0, 0]));
    assert_eq!(body["data"]["chartData"]["devices"], json!({"total": 0}));
}

async fn get_with_headers(app: Router, uri: &str, headers: &[(&str, &str)]) -> (StatusCode, Value) {
    let mut builder = Request::builder().uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let response = app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();

    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_rate_limit_exceeded_returns_429() {
    let (app, auth) = setup_with(Config {
        rate_limit_requests: 1,
        ..test_config()
    });
    let token = token(&auth, "alice");
    let uri = "/api/blog/stats/me?startDate=2024-01-01&endDate=2024-01-03";

    let (status, _) = get(app.clone(), uri, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get(app, uri, Some(&token)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "RATE_LIMIT_EXCEEDED");
}

#[tokio::test]
async fn test_rotating_forwarded_for_does_not_bypass_rate_limit() {
    let (app, _) = setup_with(Config {
        rate_limit_requests: 1,
        ..test_config()
    });

    let mut statuses = Vec::new();
    for i in 0..5 {
        let forwarded = format!("198.51.100.{}", i);
        let (status, _) = get_with_headers(
            app.clone(),
            "/health",
            &[("x-forwarded-for", forwarded.as_str()), ("x-real-ip", forwarded.as_str())],
        )
        .await;
        statuses.push(status);
    }

    assert_eq!(statuses[0], StatusCode::OK);
    assert!(statuses[1..].iter().all(|s| *s == StatusCode::TOO_MANY_REQUESTS));
}

#[tokio::test]
async fn test_forwarded_for_is_honored_behind_trusted_proxy() {
    let (app, _) = setup_with(Config {
        rate_limit_requests: 1,
        trust_proxy_headers: true,
        ..test_config()
    });

    for i in 0..3 {
        let forwarded = format!("198.51.100.{}", i);
        let (status, _) =
            get_with_headers(app.clone(), "/health", &[("x-forwarded-for", forwarded.as_str())]).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, _) =
        get_with_headers(app, "/health", &[("x-forwarded-for", "198.51.100.0")]).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_duplicated_query_parameter_returns_json_error() {
    let (app, auth) = setup();
    let token = token(&auth, "alice");

    let (status, body) = get(
        app,
        "/api/blog/stats/blogs/post1?startDate=2024-01-01&startDate=2024-01-02&endDate=2024-01-03",
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert!(body["error"]["message"].is_string());
}
