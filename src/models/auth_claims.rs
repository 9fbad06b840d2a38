use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::models::user::UserRole;

/// Issuer embedded in every token and enforced on decode.
pub const TOKEN_ISSUER: &str = "auth-module";
/// Audience embedded in every token and enforced on decode.
pub const TOKEN_AUDIENCE: &str = "auth-users";

/// The two token kinds minted by the token service. A token presented for a
/// use its kind does not cover is rejected regardless of signature validity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

/// JWT claims structure that will be encoded/decoded for authentication.
///
/// Access tokens carry `email` and `role`; refresh tokens carry neither and
/// are only good for minting a fresh pair. `token_id` is the unit of
/// revocation and session membership, not the token string itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    /// User email (access tokens only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Revocation identifier for this token
    #[serde(rename = "tokenId")]
    pub token_id: Uuid,
    /// Token kind this credential may be used as
    #[serde(rename = "type")]
    pub token_type: TokenKind,
    /// Capability resolved at authentication time (access tokens only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    /// Issued at (as UTC timestamp)
    pub iat: usize,
    /// Expiration time (as UTC timestamp)
    pub exp: usize,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_names_match_the_wire_contract() {
        let claims = Claims {
            user_id: Uuid::new_v4(),
            email: Some("admin@example.com".to_string()),
            token_id: Uuid::new_v4(),
            token_type: TokenKind::Access,
            role: Some(UserRole::Standard),
            iat: 1_700_000_000,
            exp: 1_700_000_900,
            iss: TOKEN_ISSUER.to_string(),
            aud: TOKEN_AUDIENCE.to_string(),
        };

        let value = serde_json::to_value(&claims).unwrap();
        assert!(value.get("userId").is_some());
        assert!(value.get("tokenId").is_some());
        assert_eq!(value["type"], "access");
        assert_eq!(value["iss"], "auth-module");
        assert_eq!(value["aud"], "auth-users");
    }

    #[test]
    fn refresh_claims_omit_email_and_role() {
        let claims = Claims {
            user_id: Uuid::new_v4(),
            email: None,
            token_id: Uuid::new_v4(),
            token_type: TokenKind::Refresh,
            role: None,
            iat: 0,
            exp: 1,
            iss: TOKEN_ISSUER.to_string(),
            aud: TOKEN_AUDIENCE.to_string(),
        };

        let value = serde_json::to_value(&claims).unwrap();
        assert!(value.get("email").is_none());
        assert!(value.get("role").is_none());
        assert_eq!(value["type"], "refresh");
    }
}
