use std::env;
use crate::error::AppError;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppSettings {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub lockout: LockoutConfig,
    pub service_gate: ServiceGateConfig,
    pub credentials: CredentialValidatorConfig,
    pub maintenance: MaintenanceConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub environment: String,
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

/// Shared security-state store. When `redis_url` is absent the server falls
/// back to the in-process backend, which does not survive restarts and is not
/// shared between instances.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    pub redis_url: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_hours: i64,
    pub max_concurrent_sessions: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub login_window_secs: i64,
    pub login_max_attempts: i64,
    pub login_block_secs: i64,
    pub reset_window_secs: i64,
    pub reset_max_attempts: i64,
    pub reset_block_secs: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LockoutConfig {
    pub max_failed_attempts: i64,
    pub escalation_attempts: i64,
    pub lock_secs: i64,
    pub escalation_lock_secs: i64,
}

/// Service-to-service gate credentials carried in the `x-api-key` header.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceGateConfig {
    pub key: String,
    pub code: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CredentialValidatorConfig {
    pub mode: CredentialValidatorMode,
    pub token_endpoint: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialValidatorMode {
    Local,
    External,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    pub enabled: bool,
}

fn env_i64(name: &str, default: &str) -> Result<i64, AppError> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse::<i64>()
        .map_err(|_| AppError::Configuration(format!("{} must be a valid number", name)))
}

impl AppSettings {
    pub fn from_env() -> Result<Self, AppError> {
        // App config
        let app_name = env::var("APP_NAME").unwrap_or_else(|_| "backoffice-auth".to_string());
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        // Database config
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| AppError::Configuration("DATABASE_URL must be set".to_string()))?;

        let database_max_connections = env_i64("DATABASE_MAX_CONNECTIONS", "10")? as u32;

        // Server config
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|_| AppError::Configuration("SERVER_PORT must be a valid port number".to_string()))?;

        // CORS origins
        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        // Security-state store
        let redis_url = env::var("REDIS_URL").ok().filter(|url| !url.is_empty());

        // Auth config. The secret's strength is enforced where the token
        // service is constructed, not here.
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| AppError::Configuration("JWT_SECRET must be set".to_string()))?;

        let access_token_ttl_minutes = env_i64("ACCESS_TOKEN_TTL_MINUTES", "15")?;
        let refresh_token_ttl_hours = env_i64("REFRESH_TOKEN_TTL_HOURS", "24")?;
        let max_concurrent_sessions = env_i64("MAX_CONCURRENT_SESSIONS", "3")? as usize;

        // Sign-in rate limiting (per client IP)
        let login_window_secs = env_i64("LOGIN_ATTEMPT_WINDOW_SECS", "900")?;
        let login_max_attempts = env_i64("LOGIN_ATTEMPTS_PER_IP", "10")?;
        let login_block_secs = env_i64("LOGIN_BLOCK_SECS", "1800")?;

        // Password-reset initiation limiting (per client IP)
        let reset_window_secs = env_i64("PASSWORD_RESET_WINDOW_SECS", "3600")?;
        let reset_max_attempts = env_i64("PASSWORD_RESET_ATTEMPTS_PER_IP", "3")?;
        let reset_block_secs = env_i64("PASSWORD_RESET_BLOCK_SECS", "3600")?;

        // Account lockout thresholds
        let max_failed_attempts = env_i64("MAX_FAILED_ATTEMPTS", "5")?;
        let escalation_attempts = env_i64("ESCALATION_ATTEMPTS", "10")?;
        let lock_secs = env_i64("ACCOUNT_LOCK_SECS", "1800")?;
        let escalation_lock_secs = env_i64("ESCALATION_LOCK_SECS", "86400")?;

        // Service-to-service gate
        let service_gate_key = env::var("SERVICE_GATE_KEY")
            .map_err(|_| AppError::Configuration("SERVICE_GATE_KEY must be set".to_string()))?;
        let service_gate_code = env::var("SERVICE_GATE_CODE")
            .map_err(|_| AppError::Configuration("SERVICE_GATE_CODE must be set".to_string()))?;

        // Credential validation mode
        let credential_mode = match env::var("CREDENTIAL_VALIDATOR")
            .unwrap_or_else(|_| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "local" => CredentialValidatorMode::Local,
            "external" => CredentialValidatorMode::External,
            other => {
                return Err(AppError::Configuration(format!(
                    "CREDENTIAL_VALIDATOR must be 'local' or 'external', got '{}'",
                    other
                )));
            }
        };

        let token_endpoint = env::var("CREDENTIAL_TOKEN_ENDPOINT").ok();
        if credential_mode == CredentialValidatorMode::External && token_endpoint.is_none() {
            return Err(AppError::Configuration(
                "CREDENTIAL_TOKEN_ENDPOINT must be set when CREDENTIAL_VALIDATOR is 'external'"
                    .to_string(),
            ));
        }

        // Maintenance window (static flag; the store flag overrides at runtime)
        let maintenance_enabled = env::var("MAINTENANCE_MODE")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            app: AppConfig {
                name: app_name,
                environment,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: database_max_connections,
            },
            server: ServerConfig {
                host: server_host,
                port: server_port,
                cors_origins,
            },
            store: StoreConfig { redis_url },
            auth: AuthConfig {
                jwt_secret,
                access_token_ttl_minutes,
                refresh_token_ttl_hours,
                max_concurrent_sessions,
            },
            rate_limit: RateLimitConfig {
                login_window_secs,
                login_max_attempts,
                login_block_secs,
                reset_window_secs,
                reset_max_attempts,
                reset_block_secs,
            },
            lockout: LockoutConfig {
                max_failed_attempts,
                escalation_attempts,
                lock_secs,
                escalation_lock_secs,
            },
            service_gate: ServiceGateConfig {
                key: service_gate_key,
                code: service_gate_code,
            },
            credentials: CredentialValidatorConfig {
                mode: credential_mode,
                token_endpoint,
            },
            maintenance: MaintenanceConfig {
                enabled: maintenance_enabled,
            },
        })
    }
}
