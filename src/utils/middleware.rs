use crate::{error::AppError, services::auth::User, state::AppState};
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use std::{net::SocketAddr, sync::Arc};
use tracing::{debug, info, warn};

/// 认证中间件
///
/// 令牌有效时把 `User` 写入请求扩展；无效或缺失时按未认证请求继续处理，
/// 由需要认证的处理器自行拒绝。
pub async fn auth_middleware(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request<Body>,
    next: Next<Body>,
) -> Result<Response, AppError> {
    let token = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "));

    if let Some(token) = token {
        match app_state.auth_service.verify_jwt(token) {
            Ok(claims) => {
                let user = User::from(claims);
                debug!("Authenticated user: {}", user.id);
                request.extensions_mut().insert(user);
            }
            Err(e) => {
                debug!("JWT verification failed: {}", e);
            }
        }
    }

    Ok(next.run(request).await)
}

/// 速率限制中间件
pub async fn rate_limit_middleware(
    State(app_state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next<Body>,
) -> Result<Response, AppError> {
    let client_ip = get_client_ip(&request, app_state.config.trust_proxy_headers);

    match app_state.rate_limiter.check_key(&client_ip) {
        Ok(_) => {
            debug!("Rate limit check passed for IP: {}", client_ip);
            Ok(next.run(request).await)
        }
        Err(_) => {
            warn!("Rate limit exceeded for IP: {}", client_ip);
            Err(AppError::RateLimitExceeded)
        }
    }
}

/// 请求日志中间件
pub async fn request_logging_middleware(
    State(app_state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next<Body>,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let client_ip = get_client_ip(&request, app_state.config.trust_proxy_headers);

    let start_time = std::time::Instant::now();

    debug!("Incoming request: {} {} from {}", method, uri, client_ip);

    let response = next.run(request).await;

    let elapsed = start_time.elapsed();
    let status = response.status();

    info!(
        "Request completed: {} {} {} - {}ms",
        method,
        uri,
        status.as_u16(),
        elapsed.as_millis()
    );

    response
}

/// 请求 ID 中间件
pub async fn request_id_middleware(request: Request<Body>, next: Next<Body>) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }

    response
}

/// 获取客户端 IP 地址
///
/// 只有 `trust_forwarded` 为真时才读取 `x-forwarded-for` / `x-real-ip`，
/// 否则以对端套接字地址为准。
fn get_client_ip(request: &Request<Body>, trust_forwarded: bool) -> String {
    if trust_forwarded {
        let headers = request.headers();

        if let Some(ip) = headers
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            return ip.to_string();
        }

        if let Some(ip) = headers.get("x-real-ip").and_then(|h| h.to_str().ok()) {
            return ip.trim().to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_peer(request: Request<Body>, addr: &str) -> Request<Body> {
        let mut request = request;
        let addr: SocketAddr = addr.parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    }

    #[test]
    fn test_forwarded_headers_ignored_by_default() {
        let request = Request::builder()
            .header("x-forwarded-for", "203.0.113.7")
            .header("x-real-ip", "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        let request = with_peer(request, "192.0.2.10:51234");
        assert_eq!(get_client_ip(&request, false), "192.0.2.10");
    }

    #[test]
    fn test_spoofed_forwarded_for_does_not_change_key() {
        let keys: Vec<String> = ["1.1.1.1", "2.2.2.2", "3.3.3.3"]
            .iter()
            .map(|spoofed| {
                let request = Request::builder()
                    .header("x-forwarded-for", *spoofed)
                    .body(Body::empty())
                    .unwrap();
                get_client_ip(&with_peer(request, "192.0.2.10:4000"), false)
            })
            .collect();
        assert!(keys.iter().all(|k| k == "192.0.2.10"));
    }

    #[test]
    fn test_client_ip_from_forwarded_for_when_trusted() {
        let request = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        let request = with_peer(request, "10.0.0.1:8080");
        assert_eq!(get_client_ip(&request, true), "203.0.113.7");
    }

    #[test]
    fn test_client_ip_fallbacks() {
        let request = Request::builder()
            .header("x-real-ip", "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(get_client_ip(&request, true), "198.51.100.2");

        let request = Request::builder()
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::empty())
            .unwrap();
        assert_eq!(get_client_ip(&request, false), "unknown");

        let request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(get_client_ip(&request, true), "unknown");
    }
}
