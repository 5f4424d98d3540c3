//! 认证服务：核心结构、注册与密码登录

use super::crypto::{hash_password, verify_password};
use super::models::*;
use super::store::AccountStore;
use crate::error::{AuthError, Result};
use crate::notify::Mailer;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};

const DEFAULT_JWT_ISSUER: &str = "chirp-api";
const DEFAULT_JWT_AUDIENCE: &str = "chirp-clients";

/// 认证服务
#[derive(Clone)]
pub struct AuthService {
    pub(super) store: AccountStore,
    pub(super) mailer: Arc<dyn Mailer>,
    /// JWT 签名密钥
    pub(super) jwt_secret: String,
    /// JWT issuer
    pub(super) jwt_issuer: String,
    /// JWT audience
    pub(super) jwt_audience: String,
    /// Token 有效期（秒），所有签发路径共用
    pub(super) token_ttl: i64,
}

// ============================================================================
// 构造器和配置
// ============================================================================

impl AuthService {
    /// 创建新的认证服务
    pub fn new(store: AccountStore, mailer: Arc<dyn Mailer>, jwt_secret: String) -> Self {
        Self {
            store,
            mailer,
            jwt_secret,
            jwt_issuer: DEFAULT_JWT_ISSUER.to_string(),
            jwt_audience: DEFAULT_JWT_AUDIENCE.to_string(),
            token_ttl: 24 * 3600, // 1 天
        }
    }

    /// 配置 JWT iss/aud
    pub fn with_claims_context(
        mut self,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        self.jwt_issuer = issuer.into();
        self.jwt_audience = audience.into();
        self
    }

    /// 配置 token 有效期
    pub fn with_token_ttl(mut self, ttl: i64) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// 账户存储
    pub fn store(&self) -> &AccountStore {
        &self.store
    }
}

// ============================================================================
// 注册与密码登录
// ============================================================================

impl AuthService {
    /// 注册账户，成功后直接签发 session token
    #[instrument(skip(self, req), fields(username = %req.username, email = %req.email))]
    pub async fn register(&self, req: RegisterRequest) -> Result<(AccountSummary, AuthToken)> {
        let password_hash = hash_password(&req.password).await?;

        let now = Utc::now();
        let account = Account {
            id: uuid::Uuid::new_v4().to_string(),
            username: req.username,
            name: req.name,
            email: req.email,
            password_hash: Some(password_hash),
            google_id: None,
            avatar: None,
            banner: None,
            caption: None,
            phone_number: None,
            verified: false,
            login_otp: None,
            reset_otp: None,
            created_at: Some(now),
            updated_at: Some(now),
        };
        // 唯一性由存储层在锁内保证
        let account = self.store.create(account).await?;

        info!(account_id = %account.id, username = %account.username, "account registered");
        self.dispatch_mail(
            &account.email,
            "Welcome to Chirp",
            format!(
                "Hi {}, your account has been created with this email address.",
                account.name
            ),
        );

        let token = self.issue_token(&account)?;
        Ok((account.into(), token))
    }

    /// 密码登录；未知邮箱、无密码账户、密码错误都返回同一个错误
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<(AccountSummary, AuthToken)> {
        let account = self
            .store
            .find_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let Some(hash) = account.password_hash.as_deref() else {
            warn!(account_id = %account.id, "login failed: account has no password");
            return Err(AuthError::InvalidCredentials);
        };
        let valid = verify_password(password, hash).await?;
        if !valid {
            warn!(account_id = %account.id, "login failed: invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        info!(account_id = %account.id, "logged in");
        self.dispatch_mail(
            &account.email,
            "New sign-in to your account",
            format!("Hi {}, a new sign-in to your account just happened.", account.name),
        );

        let token = self.issue_token(&account)?;
        Ok((account.into(), token))
    }

    /// 后台发送通知邮件；失败只记录日志，绝不回滚触发它的操作
    pub(super) fn dispatch_mail(&self, to: &str, subject: &str, body: String) {
        let mailer = self.mailer.clone();
        let to = to.to_string();
        let subject = subject.to_string();
        tokio::spawn(async move {
            if let Err(e) = mailer.send(&to, &subject, &body).await {
                warn!(error = %e, to = %to, "failed to send notification email");
            }
        });
    }
}
