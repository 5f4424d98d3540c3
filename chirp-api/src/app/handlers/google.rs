//! Google 联合登录 handler

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chirp_core::AuthError;
use serde::Deserialize;
use serde_json::Value;

use super::super::error::ApiError;
use super::super::state::AppState;
use super::auth::session_response;

#[derive(Debug, Deserialize)]
pub struct GoogleLoginRequest {
    pub id_token: Option<String>,
    /// 客户端在同意页上取消授权
    #[serde(default)]
    pub cancelled: bool,
}

/// POST /auth/google - Google ID token 登录
pub async fn google_login(
    State(state): State<AppState>,
    Json(req): Json<GoogleLoginRequest>,
) -> Result<(StatusCode, HeaderMap, Json<Value>), ApiError> {
    if req.cancelled {
        return Err(AuthError::Cancelled("user cancelled the consent screen".into()).into());
    }

    let id_token = req
        .id_token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::bad_request("id_token is required"))?;

    let profile = state.verifier.verify(id_token).await?;
    let (summary, token) = state.auth.federated_login(profile).await?;
    session_response(&state, StatusCode::OK, summary, token)
}
