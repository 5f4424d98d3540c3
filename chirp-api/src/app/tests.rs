use super::{app_router, AppState, RateLimiter};
use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use chirp_core::{
    AccountStore, AuthError, AuthService, FederatedProfile, IdentityVerifier, OtpPurpose,
    TraceMailer,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

/// 总是返回固定身份的校验器
struct StaticVerifier(FederatedProfile);

#[async_trait::async_trait]
impl IdentityVerifier for StaticVerifier {
    async fn verify(&self, _id_token: &str) -> chirp_core::Result<FederatedProfile> {
        Ok(self.0.clone())
    }
}

/// 总是报告提供方不可用的校验器
struct RejectingVerifier;

#[async_trait::async_trait]
impl IdentityVerifier for RejectingVerifier {
    async fn verify(&self, _id_token: &str) -> chirp_core::Result<FederatedProfile> {
        Err(AuthError::Upstream("jwks endpoint unreachable".into()))
    }
}

fn store_in(dir: &TempDir) -> AccountStore {
    let store = AccountStore::new(dir.path());
    store.ensure_dirs().unwrap();
    store
}

fn state_for(auth: AuthService, verifier: Arc<dyn IdentityVerifier>) -> AppState {
    AppState {
        auth: Arc::new(auth),
        verifier,
        login_limiter: Arc::new(RateLimiter::new(100, Duration::from_secs(60))),
        otp_limiter: Arc::new(RateLimiter::new(100, Duration::from_secs(60))),
        cookie_secure: false,
    }
}

/// 默认应用：日志邮件 + 永远失败的联合登录校验器
fn build_app(dir: &TempDir) -> (Router, AccountStore) {
    let store = store_in(dir);
    let auth = AuthService::new(store.clone(), Arc::new(TraceMailer), "test-secret".into());
    let app = app_router(state_for(auth, Arc::new(RejectingVerifier)), Vec::new());
    (app, store)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_with_bearer(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn register_payload(username: &str, email: &str, password: &str) -> Value {
    json!({
        "username": username,
        "name": username,
        "email": email,
        "password": password,
    })
}

async fn pending_code(store: &AccountStore, email: &str, purpose: OtpPurpose) -> String {
    let account = store.find_by_email(email).await.unwrap().unwrap();
    account.challenge(purpose).unwrap().code.clone()
}

#[tokio::test]
async fn health_ok_without_auth() {
    let dir = TempDir::new().unwrap();
    let (app, _store) = build_app(&dir);
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn register_login_and_me_flow() {
    let dir = TempDir::new().unwrap();
    let (app, _store) = build_app(&dir);

    let response = app
        .clone()
        .oneshot(post_json(
            "/auth/register",
            register_payload("bob", "bob@example.com", "hunter22"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["account"]["username"], "bob");
    assert!(body["account"].get("password_hash").is_none());
    let token = body["token"]["token"].as_str().unwrap().to_string();
    assert!(!token.is_empty());

    // 错误密码
    let response = app
        .clone()
        .oneshot(post_json(
            "/auth/login",
            json!({ "email": "bob@example.com", "password": "wrong" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // 正确密码
    let response = app
        .clone()
        .oneshot(post_json(
            "/auth/login",
            json!({ "email": "bob@example.com", "password": "hunter22" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Bearer token 访问受保护端点
    let response = app
        .clone()
        .oneshot(get_with_bearer("/auth/me", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let me = body_json(response).await;
    assert_eq!(me["username"], "bob");
    assert_eq!(me["email"], "bob@example.com");

    // 无 token 被拒
    let response = app
        .oneshot(Request::builder().uri("/auth/me").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn session_cookie_round_trip() {
    let dir = TempDir::new().unwrap();
    let (app, _store) = build_app(&dir);

    let response = app
        .clone()
        .oneshot(post_json(
            "/auth/register",
            register_payload("carol", "carol@example.com", "hunter22"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let session_pair = set_cookie.split(';').next().unwrap();
    assert!(session_pair.starts_with("chirp_session="));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/me")
                .header(header::COOKIE, session_pair)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let me = body_json(response).await;
    assert_eq!(me["username"], "carol");
}

#[tokio::test]
async fn duplicate_email_registration_is_conflict() {
    let dir = TempDir::new().unwrap();
    let (app, _store) = build_app(&dir);

    let response = app
        .clone()
        .oneshot(post_json(
            "/auth/register",
            register_payload("dave", "dave@example.com", "hunter22"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(post_json(
            "/auth/register",
            register_payload("dave2", "dave@example.com", "hunter22"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["code"], "AlreadyExists");
}

#[tokio::test]
async fn register_with_empty_fields_is_bad_request() {
    let dir = TempDir::new().unwrap();
    let (app, _store) = build_app(&dir);

    let response = app
        .oneshot(post_json(
            "/auth/register",
            register_payload("", "eve@example.com", "hunter22"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn otp_send_for_unknown_email_is_not_found() {
    let dir = TempDir::new().unwrap();
    let (app, _store) = build_app(&dir);

    let response = app
        .oneshot(post_json(
            "/auth/otp/send",
            json!({ "email": "ghost@example.com" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn otp_login_flow_consumes_the_code() {
    let dir = TempDir::new().unwrap();
    let (app, store) = build_app(&dir);

    let response = app
        .clone()
        .oneshot(post_json(
            "/auth/register",
            register_payload("alice", "alice@example.com", "hunter22"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(post_json(
            "/auth/otp/send",
            json!({ "email": "alice@example.com" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let code = pending_code(&store, "alice@example.com", OtpPurpose::Login).await;
    let response = app
        .clone()
        .oneshot(post_json(
            "/auth/otp/verify",
            json!({ "email": "alice@example.com", "code": code }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["token"]["token"].as_str().is_some());

    // 重放同一验证码
    let response = app
        .oneshot(post_json(
            "/auth/otp/verify",
            json!({ "email": "alice@example.com", "code": code }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn password_reset_flow_updates_the_password() {
    let dir = TempDir::new().unwrap();
    let (app, store) = build_app(&dir);

    let response = app
        .clone()
        .oneshot(post_json(
            "/auth/register",
            register_payload("frank", "frank@example.com", "old-password"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(post_json(
            "/auth/password/forgot",
            json!({ "email": "frank@example.com" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let code = pending_code(&store, "frank@example.com", OtpPurpose::PasswordReset).await;

    // 预校验不消费验证码
    let response = app
        .clone()
        .oneshot(post_json(
            "/auth/password/verify-otp",
            json!({ "email": "frank@example.com", "code": code }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(post_json(
            "/auth/password/reset",
            json!({ "email": "frank@example.com", "code": code, "new_password": "new-password" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(post_json(
            "/auth/login",
            json!({ "email": "frank@example.com", "password": "old-password" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(post_json(
            "/auth/login",
            json!({ "email": "frank@example.com", "password": "new-password" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    // 负 TTL 直接签出已过期的 token（幅度要盖过验证时的时钟宽限）
    let auth = AuthService::new(store.clone(), Arc::new(TraceMailer), "test-secret".into())
        .with_token_ttl(-3600);
    let app = app_router(state_for(auth, Arc::new(RejectingVerifier)), Vec::new());

    let response = app
        .clone()
        .oneshot(post_json(
            "/auth/register",
            register_payload("grace", "grace@example.com", "hunter22"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let token = body["token"]["token"].as_str().unwrap().to_string();

    let response = app
        .oneshot(get_with_bearer("/auth/me", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_clears_the_cookie() {
    let dir = TempDir::new().unwrap();
    let (app, _store) = build_app(&dir);

    let response = app
        .oneshot(post_json("/auth/logout", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(set_cookie.starts_with("chirp_session=;"));
    assert!(set_cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn google_login_provisions_exactly_one_account() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let auth = AuthService::new(store.clone(), Arc::new(TraceMailer), "test-secret".into());
    let verifier = Arc::new(StaticVerifier(FederatedProfile {
        external_id: "google-123".into(),
        email: "hank@example.com".into(),
        name: "Hank".into(),
        avatar: Some("https://lh3.example.com/p.jpg".into()),
    }));
    let app = app_router(state_for(auth, verifier), Vec::new());

    let response = app
        .clone()
        .oneshot(post_json("/auth/google", json!({ "id_token": "stub" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let first = body_json(response).await;
    let first_id = first["account"]["id"].as_str().unwrap().to_string();

    let response = app
        .oneshot(post_json("/auth/google", json!({ "id_token": "stub" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let second = body_json(response).await;
    assert_eq!(second["account"]["id"].as_str().unwrap(), first_id);
}

#[tokio::test]
async fn google_cancelled_is_bad_request() {
    let dir = TempDir::new().unwrap();
    let (app, _store) = build_app(&dir);

    let response = app
        .oneshot(post_json("/auth/google", json!({ "cancelled": true })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "Cancelled");
}

#[tokio::test]
async fn google_without_id_token_is_bad_request() {
    let dir = TempDir::new().unwrap();
    let (app, _store) = build_app(&dir);

    let response = app
        .oneshot(post_json("/auth/google", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn google_upstream_failure_is_bad_gateway() {
    let dir = TempDir::new().unwrap();
    let (app, _store) = build_app(&dir);

    let response = app
        .oneshot(post_json("/auth/google", json!({ "id_token": "stub" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["code"], "Upstream");
}

#[tokio::test]
async fn login_rate_limit_trips_per_ip() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let auth = AuthService::new(store.clone(), Arc::new(TraceMailer), "test-secret".into());
    let mut state = state_for(auth, Arc::new(RejectingVerifier));
    state.login_limiter = Arc::new(RateLimiter::new(2, Duration::from_secs(60)));
    let app = app_router(state, Vec::new());

    let attempt = || {
        post_json(
            "/auth/login",
            json!({ "email": "nobody@example.com", "password": "guess" }),
        )
    };

    for _ in 0..2 {
        let response = app.clone().oneshot(attempt()).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
    let response = app.oneshot(attempt()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}
