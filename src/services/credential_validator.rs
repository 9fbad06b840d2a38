use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::Client;

use crate::config::settings::{CredentialValidatorConfig, CredentialValidatorMode};
use crate::error::{AppError, AppResult};
use crate::security::password_hashing::verify_password;

/// Confirms a user's credentials during sign-in. Either compares against the
/// locally stored hash or delegates to an external identity provider's token
/// endpoint; the sign-in flow does not care which.
#[async_trait]
pub trait CredentialValidator: Send + Sync {
    async fn validate(&self, email: &str, password: &str, stored_hash: &str) -> AppResult<bool>;
}

/// Validation against the account's stored argon2 hash.
pub struct LocalCredentialValidator;

#[async_trait]
impl CredentialValidator for LocalCredentialValidator {
    async fn validate(&self, _email: &str, password: &str, stored_hash: &str) -> AppResult<bool> {
        verify_password(password, stored_hash)
    }
}

/// Delegated validation via an OAuth-style password grant. A 2xx from the
/// provider accepts the credentials, 400/401 rejects them, and anything else
/// is a provider failure that must not read as a rejection.
pub struct ExternalCredentialValidator {
    client: Client,
    token_endpoint: String,
}

impl ExternalCredentialValidator {
    pub fn new(token_endpoint: String) -> Self {
        Self {
            client: Client::new(),
            token_endpoint,
        }
    }
}

#[async_trait]
impl CredentialValidator for ExternalCredentialValidator {
    async fn validate(&self, email: &str, password: &str, _stored_hash: &str) -> AppResult<bool> {
        let response = self
            .client
            .post(&self.token_endpoint)
            .json(&serde_json::json!({
                "grant_type": "password",
                "username": email,
                "password": password,
            }))
            .send()
            .await
            .map_err(|e| {
                error!("Credential provider unreachable: {}", e);
                AppError::External(format!("Credential provider request failed: {}", e))
            })?;

        let status = response.status();
        if status.is_success() {
            debug!("Credential provider accepted credentials for {}", email);
            return Ok(true);
        }
        if status == reqwest::StatusCode::BAD_REQUEST
            || status == reqwest::StatusCode::UNAUTHORIZED
        {
            debug!("Credential provider rejected credentials for {}", email);
            return Ok(false);
        }

        let text = response.text().await.unwrap_or_default();
        error!("Credential provider error: {} - {}", status, text);
        Err(AppError::External(format!(
            "Credential provider returned HTTP {}",
            status
        )))
    }
}

/// Builds the validator selected by configuration.
pub fn create_credential_validator(
    config: &CredentialValidatorConfig,
) -> AppResult<Arc<dyn CredentialValidator>> {
    match config.mode {
        CredentialValidatorMode::Local => {
            info!("Using local credential validation");
            Ok(Arc::new(LocalCredentialValidator))
        }
        CredentialValidatorMode::External => {
            let endpoint = config.token_endpoint.clone().ok_or_else(|| {
                AppError::Configuration(
                    "CREDENTIAL_TOKEN_ENDPOINT must be set when CREDENTIAL_VALIDATOR is 'external'"
                        .to_string(),
                )
            })?;
            info!("Using external credential provider at {}", endpoint);
            Ok(Arc::new(ExternalCredentialValidator::new(endpoint)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::password_hashing::hash_password;

    #[tokio::test]
    async fn local_validator_accepts_the_matching_password() {
        let hash = hash_password("Str0ng!Pass").unwrap();
        let validator = LocalCredentialValidator;

        assert!(validator
            .validate("user@example.com", "Str0ng!Pass", &hash)
            .await
            .unwrap());
        assert!(!validator
            .validate("user@example.com", "Wr0ng!Pass", &hash)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn external_validator_accepts_on_2xx() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_body(r#"{"access_token":"x"}"#)
            .create_async()
            .await;

        let validator = ExternalCredentialValidator::new(format!("{}/oauth/token", server.url()));
        let accepted = validator
            .validate("user@example.com", "Str0ng!Pass", "")
            .await
            .unwrap();

        assert!(accepted);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn external_validator_rejects_on_401() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth/token")
            .with_status(401)
            .create_async()
            .await;

        let validator = ExternalCredentialValidator::new(format!("{}/oauth/token", server.url()));
        let accepted = validator
            .validate("user@example.com", "Wr0ng!Pass", "")
            .await
            .unwrap();

        assert!(!accepted);
    }

    #[tokio::test]
    async fn provider_outage_is_an_error_not_a_rejection() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth/token")
            .with_status(503)
            .create_async()
            .await;

        let validator = ExternalCredentialValidator::new(format!("{}/oauth/token", server.url()));
        let err = validator
            .validate("user@example.com", "Str0ng!Pass", "")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::External(_)));
    }

    #[test]
    fn factory_requires_an_endpoint_for_external_mode() {
        let config = CredentialValidatorConfig {
            mode: CredentialValidatorMode::External,
            token_endpoint: None,
        };
        assert!(matches!(
            create_credential_validator(&config),
            Err(AppError::Configuration(_))
        ));
    }
}
