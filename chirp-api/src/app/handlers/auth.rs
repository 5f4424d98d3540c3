//! 注册、登录与会话相关 handlers

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::{Extension, Json};
use chirp_core::{AccountSummary, AuthToken, LoginRequest, RegisterRequest};
use serde_json::{json, Value};

use super::super::cookie::{clear_session_cookie, session_cookie};
use super::super::error::ApiError;
use super::super::middleware::{AuthInfo, ClientIp};
use super::super::state::AppState;

/// 构造带 Set-Cookie 的会话响应；token 同时出现在 body 里，供非浏览器客户端使用。
pub(super) fn session_response(
    state: &AppState,
    status: StatusCode,
    summary: AccountSummary,
    token: AuthToken,
) -> Result<(StatusCode, HeaderMap, Json<Value>), ApiError> {
    let cookie = session_cookie(&token.token, token.expires_in, state.cookie_secure)
        .map_err(|err| {
            tracing::error!(error = %err, "failed to build session cookie");
            ApiError::internal()
        })?;
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, cookie);
    Ok((status, headers, Json(json!({ "account": summary, "token": token }))))
}

/// POST /auth/register - 注册新账户
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, HeaderMap, Json<Value>), ApiError> {
    if req.username.trim().is_empty() || req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request(
            "username, email and password are required",
        ));
    }

    let (summary, token) = state.auth.register(req).await?;
    session_response(&state, StatusCode::CREATED, summary, token)
}

/// POST /auth/login - 邮箱密码登录
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(req): Json<LoginRequest>,
) -> Result<(StatusCode, HeaderMap, Json<Value>), ApiError> {
    if !state.login_limiter.allow(&ip).await {
        return Err(ApiError::too_many_requests(
            "too many login attempts, try again later",
        ));
    }

    let (summary, token) = state.auth.login(&req.email, &req.password).await?;
    session_response(&state, StatusCode::OK, summary, token)
}

/// POST /auth/logout - 使会话 Cookie 立即过期
pub async fn logout(
    State(state): State<AppState>,
) -> Result<(StatusCode, HeaderMap, Json<Value>), ApiError> {
    let cookie = clear_session_cookie(state.cookie_secure).map_err(|err| {
        tracing::error!(error = %err, "failed to build clear cookie");
        ApiError::internal()
    })?;
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, cookie);
    Ok((StatusCode::OK, headers, Json(json!({ "message": "signed out" }))))
}

/// GET /auth/me - 当前会话对应的账户信息
pub async fn get_me(Extension(auth): Extension<AuthInfo>) -> Json<Value> {
    Json(json!(AccountSummary::from(auth.account)))
}
