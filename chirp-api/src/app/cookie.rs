//! 会话 Cookie 的构造与解析

use axum::body::Body;
use axum::http::header::{InvalidHeaderValue, AUTHORIZATION, COOKIE};
use axum::http::{HeaderValue, Request};

/// 会话 Cookie 名称
pub const SESSION_COOKIE_NAME: &str = "chirp_session";

/// 构造会话 Cookie 的 Set-Cookie 值。
pub fn session_cookie(
    token: &str,
    max_age: i64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// 构造使会话 Cookie 立即过期的 Set-Cookie 值。
pub fn clear_session_cookie(secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    session_cookie("", 0, secure)
}

/// 从 Cookie header 中取出会话 token。
fn token_from_cookies(request: &Request<Body>) -> Option<String> {
    let raw = request.headers().get(COOKIE)?.to_str().ok()?;
    for pair in raw.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        if key == SESSION_COOKIE_NAME && !value.is_empty() {
            return Some(value.to_string());
        }
    }
    None
}

/// 从请求中提取会话 token（优先 Cookie，fallback 到 Authorization header）
pub fn extract_token(request: &Request<Body>) -> Option<String> {
    if let Some(token) = token_from_cookies(request) {
        return Some(token);
    }

    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(|t| t.to_string())
}
