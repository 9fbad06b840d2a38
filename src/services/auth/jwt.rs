use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use log::{debug, error, info};
use thiserror::Error;
use uuid::Uuid;

use crate::config::settings::AuthConfig;
use crate::error::{AppError, AppResult};
use crate::models::auth_claims::{Claims, TOKEN_AUDIENCE, TOKEN_ISSUER, TokenKind};
use crate::models::user::UserRole;
use crate::services::revocation_registry::RevocationRegistry;
use crate::services::session_registry::SessionRegistry;

/// Minimum secret length accepted for HS256 signing.
pub const MIN_SECRET_BYTES: usize = 32;

/// Why a presented token was rejected. Every kind is terminal for the
/// request; none are retried.
#[derive(Debug, Error)]
pub enum TokenVerifyError {
    #[error("Invalid token")]
    Invalid,
    #[error("Token has expired")]
    Expired,
    #[error("Invalid token type")]
    WrongType,
    #[error("Token has been revoked")]
    Revoked,
    #[error("Token does not belong to an active session")]
    NotActive,
    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<TokenVerifyError> for AppError {
    fn from(err: TokenVerifyError) -> Self {
        match err {
            TokenVerifyError::Store(inner) => inner,
            other => AppError::Auth(other.to_string()),
        }
    }
}

/// Result of minting one session: a short-lived access token and a refresh
/// token sharing a single `token_id`.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_id: Uuid,
    /// Seconds until the access token expires.
    pub expires_in: i64,
}

/// Issues and verifies the token pair, and owns the session/revocation
/// registries that back those decisions. One instance is built at startup and
/// cloned into handlers; there is no process-global key state.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_minutes: i64,
    refresh_ttl_hours: i64,
    sessions: SessionRegistry,
    revocations: RevocationRegistry,
}

impl TokenService {
    pub fn new(
        auth: &AuthConfig,
        sessions: SessionRegistry,
        revocations: RevocationRegistry,
    ) -> AppResult<Self> {
        if auth.jwt_secret.len() < MIN_SECRET_BYTES {
            return Err(AppError::Configuration(format!(
                "JWT_SECRET must be at least {} bytes, got {}",
                MIN_SECRET_BYTES,
                auth.jwt_secret.len()
            )));
        }

        let secret = auth.jwt_secret.as_bytes();
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl_minutes: auth.access_token_ttl_minutes,
            refresh_ttl_hours: auth.refresh_token_ttl_hours,
            sessions,
            revocations,
        })
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_minutes * 60
    }

    pub fn refresh_ttl_secs(&self) -> i64 {
        self.refresh_ttl_hours * 3600
    }

    /// Mints an access/refresh pair under a fresh `token_id`, registers the
    /// session, and revokes whatever the concurrency ceiling evicted. The
    /// pair being issued is never the one evicted.
    pub async fn issue(
        &self,
        user_id: &Uuid,
        email: &str,
        role: UserRole,
    ) -> AppResult<IssuedTokens> {
        let token_id = Uuid::new_v4();
        let iat = Utc::now();
        let access_exp = iat + Duration::minutes(self.access_ttl_minutes);
        let refresh_exp = iat + Duration::hours(self.refresh_ttl_hours);

        let access_claims = Claims {
            user_id: *user_id,
            email: Some(email.to_string()),
            token_id,
            token_type: TokenKind::Access,
            role: Some(role),
            iat: iat.timestamp() as usize,
            exp: access_exp.timestamp() as usize,
            iss: TOKEN_ISSUER.to_string(),
            aud: TOKEN_AUDIENCE.to_string(),
        };

        let refresh_claims = Claims {
            user_id: *user_id,
            email: None,
            token_id,
            token_type: TokenKind::Refresh,
            role: None,
            iat: iat.timestamp() as usize,
            exp: refresh_exp.timestamp() as usize,
            iss: TOKEN_ISSUER.to_string(),
            aud: TOKEN_AUDIENCE.to_string(),
        };

        let header = Header::new(Algorithm::HS256);
        let access_token = encode(&header, &access_claims, &self.encoding_key).map_err(|e| {
            error!("Failed to sign access token: {}", e);
            AppError::Internal(format!("Token generation failed: {}", e))
        })?;
        let refresh_token = encode(&header, &refresh_claims, &self.encoding_key).map_err(|e| {
            error!("Failed to sign refresh token: {}", e);
            AppError::Internal(format!("Token generation failed: {}", e))
        })?;

        // Millisecond scores keep rapid issuances ordered; second granularity
        // would tie and leave FIFO eviction to the member sort.
        let evicted = self
            .sessions
            .register(user_id, &token_id, iat.timestamp_millis())
            .await?;
        for evicted_id in &evicted {
            self.revocations.insert(evicted_id).await?;
        }

        debug!("Issued token pair for user {} (token_id: {})", user_id, token_id);

        Ok(IssuedTokens {
            access_token,
            refresh_token,
            token_id,
            expires_in: self.access_ttl_secs(),
        })
    }

    /// Verifies signature, expiry, kind, revocation, and session membership,
    /// in that order. The first failed check names the rejection; an evicted
    /// session therefore reports `Revoked`, not `NotActive`.
    pub async fn verify(
        &self,
        token: &str,
        expected: TokenKind,
    ) -> Result<Claims, TokenVerifyError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.set_audience(&[TOKEN_AUDIENCE]);

        let token_data =
            decode::<Claims>(token, &self.decoding_key, &validation).map_err(|err| {
                match err.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenVerifyError::Expired,
                    _ => {
                        debug!("Token validation failed: {}", err);
                        TokenVerifyError::Invalid
                    }
                }
            })?;

        let claims = token_data.claims;

        if claims.token_type != expected {
            return Err(TokenVerifyError::WrongType);
        }

        if self.revocations.is_revoked(&claims.token_id).await? {
            return Err(TokenVerifyError::Revoked);
        }

        if !self
            .sessions
            .is_active(&claims.user_id, &claims.token_id)
            .await?
        {
            return Err(TokenVerifyError::NotActive);
        }

        Ok(claims)
    }

    /// Revokes one session. Idempotent: returns false when the token was not
    /// an active session, and nothing new enters the revocation registry.
    pub async fn revoke(&self, user_id: &Uuid, token_id: &Uuid) -> AppResult<bool> {
        let removed = self.sessions.remove(user_id, token_id).await?;
        if removed {
            self.revocations.insert(token_id).await?;
        }
        Ok(removed)
    }

    /// Revokes every active session for the user; returns how many there were.
    pub async fn revoke_all(&self, user_id: &Uuid) -> AppResult<usize> {
        let token_ids = self.sessions.clear(user_id).await?;
        for token_id in &token_ids {
            self.revocations.insert(token_id).await?;
        }
        if !token_ids.is_empty() {
            info!(
                "Revoked {} session(s) for user {}",
                token_ids.len(),
                user_id
            );
        }
        Ok(token_ids.len())
    }

    /// Revokes every session of every user. Returns (users, sessions) counts.
    pub async fn revoke_everywhere(&self) -> AppResult<(usize, usize)> {
        let users = self.sessions.active_users().await?;
        let mut revoked_sessions = 0;
        for user_id in &users {
            revoked_sessions += self.revoke_all(user_id).await?;
        }
        info!(
            "Revoked {} session(s) across {} user(s)",
            revoked_sessions,
            users.len()
        );
        Ok((users.len(), revoked_sessions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth_stores::SecurityStore;

    const TEST_SECRET: &str = "unit-test-secret-0123456789abcdef-0123456789";

    fn auth_config(secret: &str) -> AuthConfig {
        AuthConfig {
            jwt_secret: secret.to_string(),
            access_token_ttl_minutes: 15,
            refresh_token_ttl_hours: 24,
            max_concurrent_sessions: 3,
        }
    }

    fn service_with_secret(secret: &str) -> TokenService {
        let store = SecurityStore::new_memory();
        let sessions = SessionRegistry::new(store.clone(), 3, 86400);
        let revocations = RevocationRegistry::new(store, 86400);
        TokenService::new(&auth_config(secret), sessions, revocations).unwrap()
    }

    fn service() -> TokenService {
        service_with_secret(TEST_SECRET)
    }

    fn sign_with(secret: &str, claims: &Claims) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn base_claims(kind: TokenKind, iat: i64, exp: i64) -> Claims {
        Claims {
            user_id: Uuid::new_v4(),
            email: None,
            token_id: Uuid::new_v4(),
            token_type: kind,
            role: None,
            iat: iat as usize,
            exp: exp as usize,
            iss: TOKEN_ISSUER.to_string(),
            aud: TOKEN_AUDIENCE.to_string(),
        }
    }

    #[test]
    fn short_secret_is_a_configuration_error() {
        let store = SecurityStore::new_memory();
        let sessions = SessionRegistry::new(store.clone(), 3, 86400);
        let revocations = RevocationRegistry::new(store, 86400);
        let result = TokenService::new(&auth_config("too-short"), sessions, revocations);
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[tokio::test]
    async fn issue_then_verify_round_trips_the_claims() {
        let service = service();
        let user_id = Uuid::new_v4();

        let issued = service
            .issue(&user_id, "admin@example.com", UserRole::SuperAdmin)
            .await
            .unwrap();
        assert_eq!(issued.expires_in, 15 * 60);

        let access = service
            .verify(&issued.access_token, TokenKind::Access)
            .await
            .unwrap();
        assert_eq!(access.user_id, user_id);
        assert_eq!(access.email.as_deref(), Some("admin@example.com"));
        assert_eq!(access.role, Some(UserRole::SuperAdmin));
        assert_eq!(access.token_id, issued.token_id);

        let refresh = service
            .verify(&issued.refresh_token, TokenKind::Refresh)
            .await
            .unwrap();
        assert_eq!(refresh.user_id, user_id);
        assert_eq!(refresh.email, None);
        assert_eq!(refresh.token_id, issued.token_id);
    }

    #[tokio::test]
    async fn foreign_secret_fails_as_invalid() {
        let service = service();
        let other = service_with_secret("another-secret-0123456789abcdef-0123456789");
        let user_id = Uuid::new_v4();

        let issued = other
            .issue(&user_id, "user@example.com", UserRole::Standard)
            .await
            .unwrap();

        let err = service
            .verify(&issued.access_token, TokenKind::Access)
            .await
            .unwrap_err();
        assert!(matches!(err, TokenVerifyError::Invalid));
    }

    #[tokio::test]
    async fn kind_mismatch_is_rejected_before_store_checks() {
        let service = service();
        let issued = service
            .issue(&Uuid::new_v4(), "user@example.com", UserRole::Standard)
            .await
            .unwrap();

        let err = service
            .verify(&issued.access_token, TokenKind::Refresh)
            .await
            .unwrap_err();
        assert!(matches!(err, TokenVerifyError::WrongType));

        let err = service
            .verify(&issued.refresh_token, TokenKind::Access)
            .await
            .unwrap_err();
        assert!(matches!(err, TokenVerifyError::WrongType));
    }

    #[tokio::test]
    async fn expired_token_is_rejected_as_expired() {
        let service = service();
        let now = Utc::now().timestamp();
        // Past the default decode leeway.
        let claims = base_claims(TokenKind::Access, now - 3600, now - 300);
        let token = sign_with(TEST_SECRET, &claims);

        let err = service.verify(&token, TokenKind::Access).await.unwrap_err();
        assert!(matches!(err, TokenVerifyError::Expired));
    }

    #[tokio::test]
    async fn unregistered_token_is_not_active() {
        let service = service();
        let now = Utc::now().timestamp();
        let claims = base_claims(TokenKind::Access, now, now + 900);
        let token = sign_with(TEST_SECRET, &claims);

        let err = service.verify(&token, TokenKind::Access).await.unwrap_err();
        assert!(matches!(err, TokenVerifyError::NotActive));
    }

    #[tokio::test]
    async fn revoke_is_idempotent_and_kills_both_tokens() {
        let service = service();
        let user_id = Uuid::new_v4();
        let issued = service
            .issue(&user_id, "user@example.com", UserRole::Standard)
            .await
            .unwrap();

        assert!(service.revoke(&user_id, &issued.token_id).await.unwrap());
        assert!(!service.revoke(&user_id, &issued.token_id).await.unwrap());

        let err = service
            .verify(&issued.access_token, TokenKind::Access)
            .await
            .unwrap_err();
        assert!(matches!(err, TokenVerifyError::Revoked));

        let err = service
            .verify(&issued.refresh_token, TokenKind::Refresh)
            .await
            .unwrap_err();
        assert!(matches!(err, TokenVerifyError::Revoked));
    }

    #[tokio::test]
    async fn ceiling_eviction_reports_the_evicted_token_as_revoked() {
        let service = service();
        let user_id = Uuid::new_v4();

        let first = service
            .issue(&user_id, "user@example.com", UserRole::Standard)
            .await
            .unwrap();
        for _ in 0..3 {
            // Distinct issuance milliseconds so FIFO order is unambiguous.
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
            service
                .issue(&user_id, "user@example.com", UserRole::Standard)
                .await
                .unwrap();
        }

        let err = service
            .verify(&first.refresh_token, TokenKind::Refresh)
            .await
            .unwrap_err();
        assert!(matches!(err, TokenVerifyError::Revoked));
        assert_eq!(service.sessions().list(&user_id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn revoke_all_clears_every_session() {
        let service = service();
        let user_id = Uuid::new_v4();
        let issued: Vec<IssuedTokens> = {
            let mut out = Vec::new();
            for _ in 0..3 {
                out.push(
                    service
                        .issue(&user_id, "user@example.com", UserRole::Standard)
                        .await
                        .unwrap(),
                );
            }
            out
        };

        assert_eq!(service.revoke_all(&user_id).await.unwrap(), 3);
        assert_eq!(service.revoke_all(&user_id).await.unwrap(), 0);

        for tokens in issued {
            let err = service
                .verify(&tokens.refresh_token, TokenKind::Refresh)
                .await
                .unwrap_err();
            assert!(matches!(err, TokenVerifyError::Revoked));
        }
    }

    #[tokio::test]
    async fn revoke_everywhere_covers_all_users() {
        let service = service();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        service
            .issue(&alice, "alice@example.com", UserRole::Standard)
            .await
            .unwrap();
        service
            .issue(&alice, "alice@example.com", UserRole::Standard)
            .await
            .unwrap();
        service
            .issue(&bob, "bob@example.com", UserRole::Standard)
            .await
            .unwrap();

        let (users, sessions) = service.revoke_everywhere().await.unwrap();
        assert_eq!(users, 2);
        assert_eq!(sessions, 3);
        assert!(service.sessions().active_users().await.unwrap().is_empty());
    }
}
