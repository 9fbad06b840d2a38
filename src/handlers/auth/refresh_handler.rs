use actix_web::{web, HttpRequest, HttpResponse};
use log::{info, warn};

use crate::config::settings::AppSettings;
use crate::db::repositories::UserRepository;
use crate::error::{AppError, AppResult};
use crate::models::auth_claims::TokenKind;
use crate::models::user::UserRole;
use crate::services::auth::TokenService;
use crate::utils::client_ip::client_ip;
use crate::utils::cookies;

/// Rotates a refresh token: the presented pair is revoked and a fresh pair
/// issued. Revocation happens before issuance so the rotation never trips the
/// concurrency ceiling against the caller's other sessions.
pub async fn refresh(
    req: HttpRequest,
    settings: web::Data<AppSettings>,
    users: web::Data<UserRepository>,
    tokens: web::Data<TokenService>,
) -> AppResult<HttpResponse> {
    let refresh_token = refresh_token_from(&req).ok_or_else(|| {
        AppError::Auth("Missing refresh token".to_string())
    })?;

    let claims = tokens.verify(&refresh_token, TokenKind::Refresh).await?;

    let user = users
        .find_by_id(&claims.user_id)
        .await?
        .ok_or_else(|| AppError::Auth("Account no longer exists".to_string()))?;

    if !user.is_active {
        warn!("Refresh rejected for deactivated user {}", user.id);
        return Err(AppError::Auth(
            "Account is deactivated. Contact an administrator".to_string(),
        ));
    }
    if user.must_change_password {
        return Err(AppError::PasswordChangeRequired(
            "Password change required before the session can be renewed".to_string(),
        ));
    }

    tokens.revoke(&claims.user_id, &claims.token_id).await?;

    let roles = users.user_roles(&user.id).await?;
    let role = UserRole::from_assignments(&roles);
    let issued = tokens.issue(&user.id, &user.email, role).await?;

    info!(
        "Refreshed session for user {} from {} (old token_id: {}, new token_id: {})",
        user.id,
        client_ip(&req),
        claims.token_id,
        issued.token_id
    );

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
        })))
}

/// Cookie first, `Authorization: Bearer` as the fallback for non-browser
/// clients.
fn refresh_token_from(req: &HttpRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(cookies::REFRESH_TOKEN_COOKIE) {
        let value = cookie.value().trim().to_string();
        if !value.is_empty() {
            return Some(value);
        }
    }
    req.headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
