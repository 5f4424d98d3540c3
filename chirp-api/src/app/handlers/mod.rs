mod auth;
mod google;
mod health;
mod otp;
mod password;

pub use auth::{get_me, login, logout, register};
pub use google::google_login;
pub use health::health;
pub use otp::{send_otp, verify_otp};
pub use password::{forgot_password, reset_password, verify_reset_otp};
