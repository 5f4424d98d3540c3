//! 邮件验证码登录 handlers

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chirp_core::OtpPurpose;
use serde::Deserialize;
use serde_json::{json, Value};

use super::super::error::ApiError;
use super::super::middleware::ClientIp;
use super::super::state::AppState;
use super::auth::session_response;

#[derive(Debug, Deserialize)]
pub struct OtpSendRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct OtpVerifyRequest {
    pub email: String,
    pub code: String,
}

/// POST /auth/otp/send - 发送登录验证码
pub async fn send_otp(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(req): Json<OtpSendRequest>,
) -> Result<Json<Value>, ApiError> {
    if !state.otp_limiter.allow(&ip).await {
        return Err(ApiError::too_many_requests(
            "too many code requests, try again later",
        ));
    }

    state.auth.send_otp(&req.email, OtpPurpose::Login).await?;
    Ok(Json(json!({ "message": "code sent" })))
}

/// POST /auth/otp/verify - 验证码登录
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(req): Json<OtpVerifyRequest>,
) -> Result<(StatusCode, HeaderMap, Json<Value>), ApiError> {
    let (summary, token) = state.auth.verify_login_otp(&req.email, &req.code).await?;
    session_response(&state, StatusCode::OK, summary, token)
}
