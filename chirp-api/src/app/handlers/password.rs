//! 密码找回 handlers

use axum::extract::State;
use axum::Json;
use chirp_core::OtpPurpose;
use serde::Deserialize;
use serde_json::{json, Value};

use super::super::error::ApiError;
use super::super::middleware::ClientIp;
use super::super::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ForgotRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetVerifyRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

/// POST /auth/password/forgot - 发送密码重置验证码
pub async fn forgot_password(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(req): Json<ForgotRequest>,
) -> Result<Json<Value>, ApiError> {
    if !state.otp_limiter.allow(&ip).await {
        return Err(ApiError::too_many_requests(
            "too many code requests, try again later",
        ));
    }

    state
        .auth
        .send_otp(&req.email, OtpPurpose::PasswordReset)
        .await?;
    Ok(Json(json!({ "message": "code sent" })))
}

/// POST /auth/password/verify-otp - 预校验重置验证码（不消费）
pub async fn verify_reset_otp(
    State(state): State<AppState>,
    Json(req): Json<ResetVerifyRequest>,
) -> Result<Json<Value>, ApiError> {
    state.auth.verify_reset_otp(&req.email, &req.code).await?;
    Ok(Json(json!({ "message": "code valid" })))
}

/// POST /auth/password/reset - 消费验证码并更新密码
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.new_password.is_empty() {
        return Err(ApiError::bad_request("new_password is required"));
    }

    state
        .auth
        .reset_password(&req.email, &req.code, &req.new_password)
        .await?;
    Ok(Json(json!({ "message": "password updated" })))
}
