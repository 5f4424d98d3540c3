//! 联合登录：服务端校验身份提供方签发的 ID token，并归并 / 开通账户

use super::models::{Account, AccountSummary, AuthToken};
use super::service::AuthService;
use crate::error::{AuthError, Result};
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tracing::{info, instrument};

/// Google JWKS 端点
const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
/// Google 的两种历史 issuer 写法都有效
const GOOGLE_ISSUERS: &[&str] = &["https://accounts.google.com", "accounts.google.com"];

/// 身份提供方断言的用户信息
#[derive(Debug, Clone)]
pub struct FederatedProfile {
    /// 提供方内的稳定用户 ID
    pub external_id: String,
    pub email: String,
    pub name: String,
    pub avatar: Option<String>,
}

/// ID token 校验能力
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// 校验 ID token 的签名与声明，返回断言的身份
    async fn verify(&self, id_token: &str) -> Result<FederatedProfile>;
}

/// Google ID token 校验器：抓取 JWKS，验 RS256 签名和 iss/aud
pub struct GoogleIdTokenVerifier {
    client: reqwest::Client,
    client_id: String,
    jwks_url: String,
}

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    #[serde(default)]
    kid: String,
    #[serde(default)]
    n: String,
    #[serde(default)]
    e: String,
}

#[derive(Debug, Deserialize)]
struct GoogleClaims {
    sub: String,
    email: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

impl GoogleIdTokenVerifier {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id: client_id.into(),
            jwks_url: GOOGLE_JWKS_URL.to_string(),
        }
    }

    /// 拉取 JWKS 并找到 token 头部指名的密钥
    async fn fetch_key(&self, kid: &str) -> Result<Jwk> {
        let jwks: JwkSet = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| AuthError::Upstream(format!("jwks fetch failed: {}", e)))?
            .error_for_status()
            .map_err(|e| AuthError::Upstream(format!("jwks fetch failed: {}", e)))?
            .json()
            .await
            .map_err(|e| AuthError::Upstream(format!("jwks parse failed: {}", e)))?;

        jwks.keys
            .into_iter()
            .find(|k| k.kid == kid)
            .ok_or_else(|| AuthError::Unauthorized("invalid id token".into()))
    }
}

#[async_trait]
impl IdentityVerifier for GoogleIdTokenVerifier {
    async fn verify(&self, id_token: &str) -> Result<FederatedProfile> {
        let header =
            decode_header(id_token).map_err(|_| AuthError::Unauthorized("invalid id token".into()))?;
        let kid = header
            .kid
            .ok_or_else(|| AuthError::Unauthorized("invalid id token".into()))?;

        let jwk = self.fetch_key(&kid).await?;
        let key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
            .map_err(|e| AuthError::Upstream(format!("bad jwks key material: {}", e)))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.client_id.clone()]);
        validation.set_issuer(GOOGLE_ISSUERS);
        let data = decode::<GoogleClaims>(id_token, &key, &validation)
            .map_err(|_| AuthError::Unauthorized("invalid id token".into()))?;

        let claims = data.claims;
        Ok(FederatedProfile {
            name: claims.name.unwrap_or_else(|| claims.email.clone()),
            external_id: claims.sub,
            email: claims.email,
            avatar: claims.picture,
        })
    }
}

// ============================================================================
// 归并与开通
// ============================================================================

impl AuthService {
    /// 联合登录：按 Google ID 或邮箱归并到已有账户，否则开通新账户。
    /// 归并命中时不回写任何字段。
    #[instrument(skip(self, profile), fields(email = %profile.email))]
    pub async fn federated_login(
        &self,
        profile: FederatedProfile,
    ) -> Result<(AccountSummary, AuthToken)> {
        if let Some(account) = self.store.find_by_google_id(&profile.external_id).await? {
            let token = self.issue_token(&account)?;
            return Ok((account.into(), token));
        }
        if let Some(account) = self.store.find_by_email(&profile.email).await? {
            info!(account_id = %account.id, "federated login matched existing account by email");
            let token = self.issue_token(&account)?;
            return Ok((account.into(), token));
        }

        let username = self.available_username(&profile.email).await?;
        let now = Utc::now();
        let account = Account {
            id: uuid::Uuid::new_v4().to_string(),
            username,
            name: profile.name,
            email: profile.email,
            // 密码路径对联合账户不可用
            password_hash: None,
            google_id: Some(profile.external_id),
            avatar: profile.avatar,
            banner: None,
            caption: None,
            phone_number: None,
            // 提供方已验证过邮箱归属
            verified: true,
            login_otp: None,
            reset_otp: None,
            created_at: Some(now),
            updated_at: Some(now),
        };
        let account = self.store.create(account).await?;

        info!(account_id = %account.id, username = %account.username, "account provisioned via federation");
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

    /// 从邮箱 local part 推导用户名，撞名时追加数字后缀
    async fn available_username(&self, email: &str) -> Result<String> {
        let base = email.split('@').next().unwrap_or(email);
        let base = if base.is_empty() { "user" } else { base };

        if self.store.find_by_username(base).await?.is_none() {
            return Ok(base.to_string());
        }
        for n in 2..1000 {
            let candidate = format!("{}{}", base, n);
            if self.store.find_by_username(&candidate).await?.is_none() {
                return Ok(candidate);
            }
        }
        Ok(format!("{}-{}", base, uuid::Uuid::new_v4()))
    }
}
