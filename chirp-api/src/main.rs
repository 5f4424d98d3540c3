mod app;

use app::{app_router, AppState, RateLimiter};
use chirp_core::{
    AccountStore, AuthService, GoogleIdTokenVerifier, IdentityVerifier, Mailer, SmtpMailer,
    TraceMailer,
};
use dotenvy::dotenv;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone)]
struct SmtpConfig {
    host: String,
    port: u16,
    username: String,
    password: String,
    from: String,
}

#[derive(Debug, Clone)]
struct ApiConfig {
    bind: SocketAddr,
    data_dir: PathBuf,
    /// JWT 签名密钥
    jwt_secret: String,
    /// JWT iss
    jwt_issuer: String,
    /// JWT aud
    jwt_audience: String,
    /// Session token 有效期（秒）
    token_ttl: i64,
    /// Google OAuth client ID（ID token 的 aud）
    google_client_id: String,
    /// CORS 允许的来源列表（空则允许所有）
    cors_origins: Vec<String>,
    /// 会话 Cookie 是否带 Secure 属性
    cookie_secure: bool,
    /// SMTP 配置；缺省时邮件只写日志
    smtp: Option<SmtpConfig>,
}

impl ApiConfig {
    fn from_env() -> Self {
        let bind = env::var("CHIRP_BIND")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| "0.0.0.0:8080".parse().expect("valid default bind"));

        let data_dir = env::var("CHIRP_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        // JWT 密钥，用于签发 session token
        let jwt_secret = env::var("CHIRP_JWT_SECRET").unwrap_or_else(|_| {
            info!("CHIRP_JWT_SECRET not set; generating a random secret for this run");
            uuid::Uuid::new_v4().to_string()
        });
        let jwt_issuer = env::var("CHIRP_JWT_ISSUER").unwrap_or_else(|_| "chirp-api".into());
        let jwt_audience = env::var("CHIRP_JWT_AUDIENCE").unwrap_or_else(|_| "chirp-clients".into());

        let token_ttl = env::var("CHIRP_TOKEN_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|ttl: &i64| *ttl > 0)
            .unwrap_or(24 * 3600);

        let google_client_id = env::var("CHIRP_GOOGLE_CLIENT_ID").unwrap_or_default();
        if google_client_id.is_empty() {
            tracing::warn!(
                "CHIRP_GOOGLE_CLIENT_ID not set; Google sign-in will reject every id token"
            );
        }

        // CORS 允许的来源，逗号分隔；空或 "*" 表示允许所有
        let cors_origins = env::var("CHIRP_CORS_ORIGINS")
            .ok()
            .map(|s| {
                let trimmed = s.trim();
                if trimmed.is_empty() || trimmed == "*" {
                    vec![]
                } else {
                    trimmed
                        .split(',')
                        .filter(|t| !t.trim().is_empty())
                        .map(|t| t.trim().to_string())
                        .collect()
                }
            })
            .unwrap_or_default();

        let cookie_secure = env::var("CHIRP_COOKIE_SECURE")
            .ok()
            .map(|s| s.trim().eq_ignore_ascii_case("true") || s.trim() == "1")
            .unwrap_or(false);

        // SMTP 三要素齐全才启用真实发信
        let smtp = match (
            env::var("CHIRP_SMTP_HOST"),
            env::var("CHIRP_SMTP_USERNAME"),
            env::var("CHIRP_SMTP_PASSWORD"),
        ) {
            (Ok(host), Ok(username), Ok(password)) => Some(SmtpConfig {
                host,
                port: env::var("CHIRP_SMTP_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(587),
                username,
                password,
                from: env::var("CHIRP_SMTP_FROM")
                    .unwrap_or_else(|_| "Chirp <noreply@chirp.local>".into()),
            }),
            _ => None,
        };

        Self {
            bind,
            data_dir,
            jwt_secret,
            jwt_issuer,
            jwt_audience,
            token_ttl,
            google_client_id,
            cors_origins,
            cookie_secure,
            smtp,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 优先读取 .env（若存在）
    let _ = dotenv();
    init_tracing();

    let config = ApiConfig::from_env();
    info!("starting API on {}", config.bind);

    let store = AccountStore::new(config.data_dir.clone());
    store.ensure_dirs()?;

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(
            &smtp.host,
            smtp.port,
            smtp.username.clone(),
            smtp.password.clone(),
            &smtp.from,
        )?),
        None => {
            info!("SMTP not configured; outgoing mail will only be logged");
            Arc::new(TraceMailer)
        }
    };

    let auth = Arc::new(
        AuthService::new(store, mailer, config.jwt_secret.clone())
            .with_claims_context(config.jwt_issuer.clone(), config.jwt_audience.clone())
            .with_token_ttl(config.token_ttl),
    );

    let verifier: Arc<dyn IdentityVerifier> =
        Arc::new(GoogleIdTokenVerifier::new(config.google_client_id.clone()));

    let login_limiter = Arc::new(RateLimiter::new(10, Duration::from_secs(60)));
    let otp_limiter = Arc::new(RateLimiter::new(5, Duration::from_secs(300)));

    let state = AppState {
        auth,
        verifier,
        login_limiter,
        otp_limiter,
        cookie_secure: config.cookie_secure,
    };

    let app = app_router(state, config.cors_origins.clone());
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await?;

    Ok(())
}

fn init_tracing() {
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
