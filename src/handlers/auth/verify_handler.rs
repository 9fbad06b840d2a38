use actix_web::{web, HttpResponse};
use log::debug;
use serde::Deserialize;

use crate::error::AppResult;
use crate::models::auth_claims::TokenKind;
use crate::services::auth::TokenService;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyTokenRequest {
    pub token: String,
    #[serde(default)]
    pub token_type: Option<TokenKind>,
}

/// Out-of-band verification for downstream services. Runs the same checks as
/// the request middleware and returns the claims when the token is live.
pub async fn verify_token(
    payload: web::Json<VerifyTokenRequest>,
    tokens: web::Data<TokenService>,
) -> AppResult<HttpResponse> {
    let expected = payload.token_type.unwrap_or(TokenKind::Access);
    let claims = tokens.verify(&payload.token, expected).await?;

    debug!(
        "Out-of-band verification passed for user {} (token_id: {})",
        claims.user_id, claims.token_id
    );

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "valid": true,
        "claims": claims,
    })))
}
