use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;

use axum::body::Body;
use axum::extract::{ConnectInfo, FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderMap, Request};
use axum::middleware::Next;
use axum::response::Response;
use chirp_core::Account;

use super::cookie::extract_token;
use super::error::ApiError;
use super::state::AppState;

/// 认证信息扩展
#[derive(Debug, Clone)]
pub struct AuthInfo {
	pub account: Account,
}

/// 不需要认证的路径
const PUBLIC_PATHS: &[&str] = &[
	"/health",
	"/auth/register",
	"/auth/login",
	"/auth/logout",
	"/auth/otp/send",
	"/auth/otp/verify",
	"/auth/password/forgot",
	"/auth/password/verify-otp",
	"/auth/password/reset",
	"/auth/google",
];

/// 提取客户端 IP
/// 优先级：X-Real-IP > X-Forwarded-For（第一个） > Socket Address
fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> String {
	// 1. 优先从 X-Real-IP header 获取（Nginx 常用）
	if let Some(real_ip) = headers.get("X-Real-IP").and_then(|v| v.to_str().ok()) {
		return real_ip.to_string();
	}

	// 2. 从 X-Forwarded-For 获取第一个 IP（最左边是真实客户端）
	if let Some(forwarded) = headers.get("X-Forwarded-For").and_then(|v| v.to_str().ok()) {
		if let Some(first_ip) = forwarded.split(',').next().map(|s| s.trim()) {
			if !first_ip.is_empty() {
				return first_ip.to_string();
			}
		}
	}

	// 3. fallback 到直连 socket 地址
	extensions
		.get::<ConnectInfo<SocketAddr>>()
		.map(|ci| ci.0.ip().to_string())
		.unwrap_or_else(|| "unknown".to_string())
}

/// 客户端 IP Extractor（限流 key 用）
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
	type Rejection = Infallible;

	fn from_request_parts<'a, 'b, 'c>(
		parts: &'a mut Parts,
		_state: &'b S,
	) -> Pin<Box<dyn Future<Output = Result<Self, Self::Rejection>> + Send + 'c>>
	where
		'a: 'c,
		'b: 'c,
	{
		Box::pin(async move { Ok(ClientIp(client_ip(&parts.headers, &parts.extensions))) })
	}
}

pub async fn auth_middleware(
	State(state): State<AppState>,
	mut request: Request<Body>,
	next: Next,
) -> Result<Response, ApiError> {
	let path = request.uri().path().to_string();

	// 公开端点不需要认证
	if PUBLIC_PATHS.iter().any(|p| path == *p) {
		return Ok(next.run(request).await);
	}

	let token = match extract_token(&request) {
		Some(t) => t,
		None => return Err(ApiError::unauthorized()),
	};

	let account = match state.auth.current_account(&token).await {
		Ok(account) => account,
		Err(err) => {
			tracing::warn!(path = %path, error = %err, "session rejected");
			return Err(ApiError::unauthorized());
		}
	};

	request.extensions_mut().insert(AuthInfo { account });
	Ok(next.run(request).await)
}
