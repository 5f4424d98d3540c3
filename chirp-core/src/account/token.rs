//! JWT 签发与验证

use super::models::{Account, AuthToken, TokenClaims};
use super::service::AuthService;
use crate::error::{AuthError, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

impl AuthService {
    /// 为账户签发 session token；所有流程走同一条签发路径、同一个 TTL
    pub fn issue_token(&self, account: &Account) -> Result<AuthToken> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.token_ttl);

        let claims = TokenClaims {
            sub: account.id.clone(),
            username: account.username.clone(),
            iss: Some(self.jwt_issuer.clone()),
            aud: Some(self.jwt_audience.clone()),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::Other(e.to_string()))?;

        Ok(AuthToken {
            token,
            expires_in: self.token_ttl,
            token_type: "Bearer".to_string(),
        })
    }

    /// 验证 JWT token；签名、过期、iss/aud 任一失败都归并为 Unauthorized
    pub fn verify_token(&self, token: &str) -> Result<TokenClaims> {
        let mut validation = Validation::default();
        validation.set_audience(&[self.jwt_audience.clone()]);
        validation.set_issuer(&[self.jwt_issuer.clone()]);
        let token_data = decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|_| AuthError::Unauthorized("invalid token".into()))?;
        Ok(token_data.claims)
    }

    /// 验证 token 并解析出对应账户
    pub async fn current_account(&self, token: &str) -> Result<Account> {
        let claims = self.verify_token(token)?;
        self.store
            .get(&claims.sub)
            .await
            .map_err(|_| AuthError::Unauthorized("account no longer exists".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::models::RegisterRequest;
    use crate::account::store::AccountStore;
    use crate::notify::TraceMailer;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn service(dir: &TempDir) -> AuthService {
        AuthService::new(
            AccountStore::new(dir.path()),
            Arc::new(TraceMailer),
            "test-secret".to_string(),
        )
    }

    async fn register_bob(svc: &AuthService) -> Account {
        let (summary, _) = svc
            .register(RegisterRequest {
                username: "bob".to_string(),
                name: "Bob".to_string(),
                email: "bob@example.com".to_string(),
                password: "pw123".to_string(),
            })
            .await
            .unwrap();
        svc.store().get(&summary.id).await.unwrap()
    }

    #[tokio::test]
    async fn token_round_trip_resolves_the_account() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        let account = register_bob(&svc).await;

        let token = svc.issue_token(&account).unwrap();
        assert_eq!(token.token_type, "Bearer");

        let resolved = svc.current_account(&token.token).await.unwrap();
        assert_eq!(resolved.id, account.id);
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let dir = TempDir::new().unwrap();
        // 负 TTL 要大于验证时的默认 leeway 才会判过期
        let svc = service(&dir).with_token_ttl(-3600);
        let account = register_bob(&svc).await;

        let token = svc.issue_token(&account).unwrap();
        let err = svc.verify_token(&token.token).unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn token_signed_with_another_secret_is_rejected() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        let account = register_bob(&svc).await;
        let token = svc.issue_token(&account).unwrap();

        let other = AuthService::new(
            AccountStore::new(dir.path()),
            Arc::new(TraceMailer),
            "another-secret".to_string(),
        );
        assert!(other.verify_token(&token.token).is_err());
    }

    #[tokio::test]
    async fn token_for_deleted_account_does_not_resolve() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        let account = register_bob(&svc).await;
        let token = svc.issue_token(&account).unwrap();

        std::fs::remove_file(
            dir.path()
                .join("accounts")
                .join(format!("{}.json", account.id)),
        )
        .unwrap();

        let err = svc.current_account(&token.token).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized(_)));
    }
}
