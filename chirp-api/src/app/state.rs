use chirp_core::{AuthService, IdentityVerifier};
use std::sync::Arc;

/// Shared application state for handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    /// 联合登录 ID token 校验器
    pub verifier: Arc<dyn IdentityVerifier>,
    /// 登录接口限流（按 IP）
    pub login_limiter: Arc<crate::app::RateLimiter>,
    /// OTP 发送限流（按 IP，邮件通道开销大）
    pub otp_limiter: Arc<crate::app::RateLimiter>,
    /// 会话 Cookie 是否带 Secure 属性
    pub cookie_secure: bool,
}
