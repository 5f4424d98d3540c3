//! 账户数据模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// OTP 挑战用途，每种用途独占一个槽位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpPurpose {
    /// 免密登录
    Login,
    /// 密码重置
    PasswordReset,
}

/// 待验证的 OTP 挑战
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpChallenge {
    /// 6 位数字码
    pub code: String,
    /// 过期时间
    pub expires_at: DateTime<Utc>,
}

/// 用户账户（存储模型，包含密码哈希）
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// 账户唯一 ID (UUID)
    pub id: String,
    /// 用户名（唯一）
    pub username: String,
    /// 展示名
    pub name: String,
    /// 邮箱（唯一，按存储原样区分大小写）
    pub email: String,
    /// bcrypt 哈希后的密码；联合登录开通的账户没有密码
    pub password_hash: Option<String>,
    /// Google 账户 ID（稀疏唯一）
    pub google_id: Option<String>,
    /// 头像 URI
    pub avatar: Option<String>,
    /// 横幅 URI
    pub banner: Option<String>,
    /// 个人简介
    pub caption: Option<String>,
    /// 电话号码
    pub phone_number: Option<String>,
    /// 邮箱是否已验证
    #[serde(default)]
    pub verified: bool,
    /// 登录 OTP 槽位
    pub login_otp: Option<OtpChallenge>,
    /// 密码重置 OTP 槽位
    pub reset_otp: Option<OtpChallenge>,
    /// 创建时间
    pub created_at: Option<DateTime<Utc>>,
    /// 更新时间
    pub updated_at: Option<DateTime<Utc>>,
}

impl Account {
    /// 读取指定用途的 OTP 槽位
    pub fn challenge(&self, purpose: OtpPurpose) -> Option<&OtpChallenge> {
        match purpose {
            OtpPurpose::Login => self.login_otp.as_ref(),
            OtpPurpose::PasswordReset => self.reset_otp.as_ref(),
        }
    }

    pub(super) fn challenge_slot(&mut self, purpose: OtpPurpose) -> &mut Option<OtpChallenge> {
        match purpose {
            OtpPurpose::Login => &mut self.login_otp,
            OtpPurpose::PasswordReset => &mut self.reset_otp,
        }
    }
}

/// JWT Claims 结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: 账户 ID
    pub sub: String,
    /// 用户名
    pub username: String,
    /// JWT issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// JWT audience
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    /// 过期时间戳 (Unix timestamp)
    pub exp: i64,
    /// 签发时间戳 (Unix timestamp)
    pub iat: i64,
}

/// 认证响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthToken {
    /// Session token (JWT)
    pub token: String,
    /// 过期时间（秒）
    pub expires_in: i64,
    /// Token 类型
    pub token_type: String,
}

/// 注册请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub name: String,
    pub email: String,
    pub password: String,
}

/// 登录请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// 账户视图（不含敏感信息）
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSummary {
    pub id: String,
    pub username: String,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub banner: Option<String>,
    pub caption: Option<String>,
    pub phone_number: Option<String>,
    pub verified: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<Account> for AccountSummary {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            username: account.username,
            name: account.name,
            email: account.email,
            avatar: account.avatar,
            banner: account.banner,
            caption: account.caption,
            phone_number: account.phone_number,
            verified: account.verified,
            created_at: account.created_at,
        }
    }
}
