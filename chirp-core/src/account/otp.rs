//! OTP 挑战：签发、验证与密码重置流程

use super::crypto::hash_password;
use super::models::{AccountSummary, AuthToken, OtpChallenge, OtpPurpose};
use super::service::AuthService;
use crate::error::{AuthError, Result};
use chrono::{Duration, Utc};
use rand::Rng;
use tracing::{info, instrument};

/// OTP 有效期（分钟）
const OTP_TTL_MINUTES: i64 = 10;

/// 生成 6 位数字码，均匀分布在 [100000, 999999]
fn generate_code() -> String {
    let code: u32 = rand::thread_rng().gen_range(100_000..=999_999);
    code.to_string()
}

impl AuthService {
    /// 签发指定用途的 OTP 并邮寄验证码；只覆盖同用途的旧挑战
    #[instrument(skip(self))]
    pub async fn send_otp(&self, email: &str, purpose: OtpPurpose) -> Result<()> {
        let account = self
            .store
            .find_by_email(email)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("account: {}", email)))?;

        let code = generate_code();
        let challenge = OtpChallenge {
            code: code.clone(),
            expires_at: Utc::now() + Duration::minutes(OTP_TTL_MINUTES),
        };
        self.store
            .put_challenge(&account.id, purpose, challenge)
            .await?;

        let subject = match purpose {
            OtpPurpose::Login => "Your sign-in code",
            OtpPurpose::PasswordReset => "Your password reset code",
        };
        self.dispatch_mail(
            &account.email,
            subject,
            format!(
                "Your verification code is {}. It expires in {} minutes.",
                code, OTP_TTL_MINUTES
            ),
        );

        info!(account_id = %account.id, ?purpose, "otp issued");
        Ok(())
    }

    /// 验证登录 OTP；成功即消费挑战并签发 session token
    #[instrument(skip(self, code))]
    pub async fn verify_login_otp(
        &self,
        email: &str,
        code: &str,
    ) -> Result<(AccountSummary, AuthToken)> {
        let account = self
            .store
            .find_by_email(email)
            .await?
            .ok_or(AuthError::InvalidOrExpired)?;
        let account = self
            .store
            .consume_challenge(&account.id, OtpPurpose::Login, code)
            .await?;

        info!(account_id = %account.id, "login otp verified");
        let token = self.issue_token(&account)?;
        Ok((account.into(), token))
    }

    /// 预检重置 OTP，不消费挑战（重置流程第二步）
    #[instrument(skip(self, code))]
    pub async fn verify_reset_otp(&self, email: &str, code: &str) -> Result<()> {
        let account = self
            .store
            .find_by_email(email)
            .await?
            .ok_or(AuthError::InvalidOrExpired)?;
        self.store
            .peek_challenge(&account.id, OtpPurpose::PasswordReset, code)
            .await
    }

    /// 用重置 OTP 设置新密码；消费挑战并替换哈希
    #[instrument(skip(self, code, new_password))]
    pub async fn reset_password(&self, email: &str, code: &str, new_password: &str) -> Result<()> {
        let account = self
            .store
            .find_by_email(email)
            .await?
            .ok_or(AuthError::InvalidOrExpired)?;

        let password_hash = hash_password(new_password).await?;
        self.store
            .consume_reset_and_set_hash(&account.id, code, password_hash)
            .await?;

        info!(account_id = %account.id, "password reset");
        self.dispatch_mail(
            &account.email,
            "Your password was changed",
            format!(
                "Hi {}, the password for your account was just reset.",
                account.name
            ),
        );
        Ok(())
    }
}
