use actix_web::{web, HttpResponse};
use log::{info, warn};

use crate::config::settings::AppSettings;
use crate::error::{AppError, AppResult};
use crate::models::authenticated_user::AuthenticatedUser;
use crate::services::auth::TokenService;
use crate::utils::cookies;

/// Revokes the presented session only. Other devices stay signed in.
pub async fn logout(
    user: AuthenticatedUser,
    settings: web::Data<AppSettings>,
    tokens: web::Data<TokenService>,
) -> AppResult<HttpResponse> {
    let revoked = tokens.revoke(&user.user_id, &user.token_id).await?;

    info!(
        "User {} logged out (token_id: {}, revoked: {})",
        user.user_id, user.token_id, revoked
    );

    let secure = settings.app.is_production();
    Ok(HttpResponse::Ok()
        .cookie(cookies::clear_access_token_cookie(secure))
        .cookie(cookies::clear_refresh_token_cookie(secure))
        .json(serde_json::json!({
            "message": "Logged out successfully",
            "revoked": revoked,
        })))
}

/// Revokes every active session the caller owns.
pub async fn logout_all(
    user: AuthenticatedUser,
    settings: web::Data<AppSettings>,
    tokens: web::Data<TokenService>,
) -> AppResult<HttpResponse> {
    let revoked = tokens.revoke_all(&user.user_id).await?;

    info!("User {} logged out everywhere ({} sessions revoked)", user.user_id, revoked);

    let secure = settings.app.is_production();
    Ok(HttpResponse::Ok()
        .cookie(cookies::clear_access_token_cookie(secure))
        .cookie(cookies::clear_refresh_token_cookie(secure))
        .json(serde_json::json!({
            "message": "Logged out from all sessions",
            "revokedSessions": revoked,
        })))
}

/// Revokes every session for every user. Admin only; used when rotating the
/// signing secret or responding to an incident.
pub async fn logout_all_users(
    user: AuthenticatedUser,
    tokens: web::Data<TokenService>,
) -> AppResult<HttpResponse> {
    if !user.role.is_super_admin() {
        warn!(
            "User {} attempted a global logout without admin rights",
            user.user_id
        );
        return Err(AppError::Forbidden(
            "Only administrators can revoke all sessions".to_string(),
        ));
    }

    let (users_cleared, sessions_revoked) = tokens.revoke_everywhere().await?;

    info!(
        "User {} revoked all sessions system-wide ({} users, {} sessions)",
        user.user_id, users_cleared, sessions_revoked
    );

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "All sessions revoked",
        "usersCleared": users_cleared,
        "revokedSessions": sessions_revoked,
    })))
}

/// Lists the caller's active sessions, oldest first.
pub async fn sessions(
    user: AuthenticatedUser,
    tokens: web::Data<TokenService>,
) -> AppResult<HttpResponse> {
    let sessions = tokens.sessions().list(&user.user_id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "sessions": sessions,
        "current": user.token_id,
    })))
}
