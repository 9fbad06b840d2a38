use actix_web::{web, HttpRequest, HttpResponse};
use log::{info, warn};
use serde::Deserialize;
use uuid::Uuid;

use super::signin_handler::{EMAIL_RE, INVALID_CREDENTIALS};
use crate::auth_stores::SecurityStore;
use crate::config::settings::AppSettings;
use crate::db::repositories::UserRepository;
use crate::error::{AppError, AppResult};
use crate::security::password_hashing::{hash_password, verify_password};
use crate::security::reset_codes::{generate_reset_code, hash_reset_code};
use crate::services::account_lockout::AccountLockoutTracker;
use crate::services::auth::TokenService;
use crate::services::notification_queue::NotificationQueue;
use crate::services::password_policy::{self, HISTORY_DEPTH};
use crate::services::rate_limiter::{LoginRateLimiter, PasswordResetRateLimiter};
use crate::utils::client_ip::client_ip;
use crate::utils::cookies;

const RESET_CODE_TTL_SECS: i64 = 900;

fn reset_code_key(digest: &str) -> String {
    format!("pwd_reset:{}", digest)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub email: String,
    pub current_password: String,
    pub new_password: String,
}

/// Password change with the current password as proof of identity. Public on
/// purpose: an account flagged for a forced change is answered with 355 at
/// sign-in and never holds a bearer token, so this is the only door left.
/// Failed current-password checks count against the same per-IP limiter and
/// per-user lockout as sign-in failures.
pub async fn change_password(
    req: HttpRequest,
    payload: web::Json<ChangePasswordRequest>,
    settings: web::Data<AppSettings>,
    users: web::Data<UserRepository>,
    tokens: web::Data<TokenService>,
    login_limiter: web::Data<LoginRateLimiter>,
    lockout: web::Data<AccountLockoutTracker>,
) -> AppResult<HttpResponse> {
    let email = payload.email.trim().to_lowercase();
    if !EMAIL_RE.is_match(&email) {
        return Err(AppError::Validation("A valid email is required".to_string()));
    }
    if payload.current_password.is_empty() {
        return Err(AppError::Validation("Current password is required".to_string()));
    }

    let ip = client_ip(&req);
    login_limiter.check(&ip).await?;

    let account = match users.find_by_email(&email).await? {
        Some(account) => account,
        None => {
            let count = login_limiter.record_failure(&ip).await?;
            warn!("Password change failed for unknown email from {} (attempt {})", ip, count);
            return Err(AppError::Auth(INVALID_CREDENTIALS.to_string()));
        }
    };

    lockout.check(&account.id).await?;

    if !account.is_active {
        warn!("Password change rejected for deactivated user {} from {}", account.id, ip);
        return Err(AppError::Auth(
            "Account is deactivated. Contact an administrator".to_string(),
        ));
    }

    if !verify_password(&payload.current_password, &account.password_hash)? {
        let count = login_limiter.record_failure(&ip).await?;
        let record = lockout.record_failure(&account.id).await?;
        warn!(
            "Password change failed for user {} from {} (ip attempt {}, user attempt {})",
            account.id, ip, count, record.attempts
        );
        return Err(AppError::Auth(INVALID_CREDENTIALS.to_string()));
    }

    // The caller has proven the current password; stop counting the IP.
    login_limiter.record_success(&ip).await?;

    apply_new_password(&users, &account.id, &account.password_hash, &payload.new_password).await?;

    lockout.clear(&account.id).await?;
    let revoked = tokens.revoke_all(&account.id).await?;

    info!(
        "User {} changed their password ({} sessions revoked)",
        account.id, revoked
    );

    let secure = settings.app.is_production();
    Ok(HttpResponse::Ok()
        .cookie(cookies::clear_access_token_cookie(secure))
        .cookie(cookies::clear_refresh_token_cookie(secure))
        .json(serde_json::json!({
            "message": "Password changed. Sign in again with the new password",
            "revokedSessions": revoked,
        })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Starts a password reset. Always answers with the same message so the
/// endpoint cannot confirm which accounts exist; the code travels to the user
/// through the notification outbox, never through this response.
pub async fn forgot_password(
    req: HttpRequest,
    payload: web::Json<ForgotPasswordRequest>,
    users: web::Data<UserRepository>,
    store: web::Data<SecurityStore>,
    reset_limiter: web::Data<PasswordResetRateLimiter>,
    notifications: web::Data<NotificationQueue>,
) -> AppResult<HttpResponse> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(AppError::Validation("Email is required".to_string()));
    }

    let ip = client_ip(&req);
    reset_limiter.check(&ip).await?;
    // Every initiation counts against the IP, known account or not.
    reset_limiter.record_attempt(&ip).await?;

    if let Some(user) = users.find_by_email(&email).await? {
        if user.is_active {
            let code = generate_reset_code();
            let digest = hash_reset_code(&code);
            store
                .put_string(
                    &reset_code_key(&digest),
                    &user.id.to_string(),
                    Some(RESET_CODE_TTL_SECS),
                )
                .await?;
            notifications
                .queue_password_reset(&user.id, &user.email, &code)
                .await?;
            info!("Password reset initiated for user {} from {}", user.id, ip);
        } else {
            warn!("Password reset requested for deactivated user {} from {}", user.id, ip);
        }
    } else {
        info!("Password reset requested for unknown email from {}", ip);
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "If the account exists, a reset code has been sent",
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub code: String,
    pub new_password: String,
}

/// Completes a reset with the emailed code. Codes are single use and stored
/// only as digests.
pub async fn reset_password(
    payload: web::Json<ResetPasswordRequest>,
    users: web::Data<UserRepository>,
    store: web::Data<SecurityStore>,
    tokens: web::Data<TokenService>,
    lockout: web::Data<AccountLockoutTracker>,
) -> AppResult<HttpResponse> {
    let digest = hash_reset_code(payload.code.trim());
    let key = reset_code_key(&digest);

    let user_id = store
        .get_string(&key)
        .await?
        .and_then(|raw| Uuid::parse_str(&raw).ok())
        .ok_or_else(|| AppError::Auth("Invalid or expired reset code".to_string()))?;

    let account = users
        .find_by_id(&user_id)
        .await?
        .ok_or_else(|| AppError::Auth("Invalid or expired reset code".to_string()))?;

    apply_new_password(&users, &account.id, &account.password_hash, &payload.new_password).await?;
    store.delete(&key).await?;

    lockout.clear(&account.id).await?;
    let revoked = tokens.revoke_all(&account.id).await?;

    info!(
        "User {} reset their password ({} sessions revoked)",
        account.id, revoked
    );

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Password reset. Sign in with the new password",
    })))
}

/// Shared tail of both password-change paths: policy check, history check
/// against the current hash plus stored history, then the hashed write.
async fn apply_new_password(
    users: &UserRepository,
    user_id: &Uuid,
    current_hash: &str,
    new_password: &str,
) -> AppResult<()> {
    password_policy::validate(new_password)?;

    let mut hashes = vec![current_hash.to_string()];
    hashes.extend(
        users
            .password_history(user_id, (HISTORY_DEPTH - 1) as i64)
            .await?,
    );
    password_policy::check_history(new_password, &hashes)?;

    let new_hash = hash_password(new_password)?;
    users
        .update_password(user_id, &new_hash, HISTORY_DEPTH as i64)
        .await?;
    Ok(())
}
