//! Core library for the auth and session-trust layer: account storage,
//! password hashing, OTP challenges, token issuing, federated identity,
//! and notification email.

pub mod account;
mod error;
pub mod notify;

pub use account::{
    Account, AccountStore, AccountSummary, AuthService, AuthToken, FederatedProfile,
    GoogleIdTokenVerifier, IdentityVerifier, LoginRequest, OtpChallenge, OtpPurpose,
    RegisterRequest, TokenClaims,
};
pub use error::{AuthError, Result};
pub use notify::{Mailer, SmtpMailer, TraceMailer};
