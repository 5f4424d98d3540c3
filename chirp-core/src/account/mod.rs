//! 账户、凭证与会话信任模块

mod crypto;
mod federation;
mod models;
mod otp;
mod service;
mod store;
mod token;

pub use federation::{FederatedProfile, GoogleIdTokenVerifier, IdentityVerifier};
pub use models::{
    Account, AccountSummary, AuthToken, LoginRequest, OtpChallenge, OtpPurpose, RegisterRequest,
    TokenClaims,
};
pub use service::AuthService;
pub use store::AccountStore;
