use actix_web::{web, HttpRequest, HttpResponse};
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::config::settings::AppSettings;
use crate::db::repositories::UserRepository;
use crate::error::{AppError, AppResult};
use crate::models::user::UserRole;
use crate::services::account_lockout::AccountLockoutTracker;
use crate::services::auth::TokenService;
use crate::services::credential_validator::CredentialValidator;
use crate::services::maintenance::MaintenanceGate;
use crate::services::permission_resolver::PermissionResolver;
use crate::services::rate_limiter::LoginRateLimiter;
use crate::utils::client_ip::client_ip;
use crate::utils::cookies;

pub(super) static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap()
});

pub(super) const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Full sign-in flow: maintenance gate, per-IP rate limit, per-user lockout,
/// credential check, then token issuance plus the resolved navigation set.
/// Order matters; each gate must fire before the next is consulted.
#[allow(clippy::too_many_arguments)]
pub async fn signin(
    req: HttpRequest,
    payload: web::Json<SignInRequest>,
    settings: web::Data<AppSettings>,
    users: web::Data<UserRepository>,
    tokens: web::Data<TokenService>,
    login_limiter: web::Data<LoginRateLimiter>,
    lockout: web::Data<AccountLockoutTracker>,
    credentials: web::Data<dyn CredentialValidator>,
    resolver: web::Data<PermissionResolver>,
    maintenance: web::Data<MaintenanceGate>,
) -> AppResult<HttpResponse> {
    maintenance.check().await?;

    let email = payload.email.trim().to_lowercase();
    if !EMAIL_RE.is_match(&email) {
        return Err(AppError::Validation("A valid email is required".to_string()));
    }
    if payload.password.is_empty() {
        return Err(AppError::Validation("Password is required".to_string()));
    }

    let ip = client_ip(&req);
    login_limiter.check(&ip).await?;

    let user = match users.find_by_email(&email).await? {
        Some(user) => user,
        None => {
            // Unknown accounts still burn an attempt so the limiter cannot be
            // used to probe which emails exist.
            let count = login_limiter.record_failure(&ip).await?;
            warn!("Sign-in failed for unknown email from {} (attempt {})", ip, count);
            return Err(AppError::Auth(INVALID_CREDENTIALS.to_string()));
        }
    };

    lockout.check(&user.id).await?;

    if !user.is_active {
        warn!("Sign-in rejected for deactivated user {} from {}", user.id, ip);
        return Err(AppError::Auth(
            "Account is deactivated. Contact an administrator".to_string(),
        ));
    }

    let password_ok = credentials
        .validate(&email, &payload.password, &user.password_hash)
        .await?;
    if !password_ok {
        let count = login_limiter.record_failure(&ip).await?;
        let record = lockout.record_failure(&user.id).await?;
        warn!(
            "Sign-in failed for user {} from {} (ip attempt {}, user attempt {})",
            user.id, ip, count, record.attempts
        );
        // Crossing the first lockout tier also deactivates the account, a
        // harder stop than the time-boxed lock. Fires once, exactly at the
        // threshold.
        if record.attempts == settings.lockout.max_failed_attempts {
            users.deactivate(&user.id).await?;
            warn!(
                "User {} deactivated after {} failed sign-in attempts",
                user.id, record.attempts
            );
        }
        return Err(AppError::Auth(INVALID_CREDENTIALS.to_string()));
    }

    if user.must_change_password {
        info!("Sign-in deferred for user {}: password change required", user.id);
        return Err(AppError::MustChangePassword(
            "Password change required before signing in".to_string(),
        ));
    }

    login_limiter.record_success(&ip).await?;
    lockout.clear(&user.id).await?;

    let roles = users.user_roles(&user.id).await?;
    let departments = users.user_departments(&user.id).await?;
    let systems = users.user_systems(&user.id).await?;
    let role = UserRole::from_assignments(&roles);

    let issued = tokens.issue(&user.id, &user.email, role).await?;

    let role_ids: Vec<_> = roles.iter().map(|r| r.id).collect();
    let department_ids: Vec<_> = departments.iter().map(|d| d.id).collect();
    let system_ids: Vec<_> = systems.iter().map(|s| s.id).collect();
    let navigation = resolver
        .resolve_for_user(&role_ids, &department_ids, &system_ids)
        .await?;

    info!("User {} signed in from {} (token_id: {})", user.id, ip, issued.token_id);

    let secure = settings.app.is_production();
    Ok(HttpResponse::Ok()
        .cookie(cookies::access_token_cookie(
            &issued.access_token,
            tokens.access_ttl_secs(),
            secure,
        ))
        .cookie(cookies::refresh_token_cookie(
            &issued.refresh_token,
            tokens.refresh_ttl_secs(),
            secure,
        ))
        .json(serde_json::json!({
            "token": issued.access_token,
            "refreshToken": issued.refresh_token,
            "tokenId": issued.token_id,
            "expiresIn": issued.expires_in,
            "user": {
                "id": user.id,
                "email": user.email,
                "fullName": user.full_name,
            },
            "roles": roles,
            "departments": departments,
            "navigation": navigation,
        })))
}
