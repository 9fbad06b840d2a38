use actix_web::{dev::Payload, Error, FromRequest, HttpMessage, HttpRequest};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};
use uuid::Uuid;

use crate::models::user::UserRole;

/// Caller identity placed in request extensions by the authentication
/// middleware after the bearer token clears signature, revocation, and
/// session-membership checks.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
    pub token_id: Uuid,
    pub role: UserRole,
}

impl FromRequest for AuthenticatedUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        if let Some(user) = req.extensions().get::<AuthenticatedUser>() {
            ready(Ok(user.clone()))
        } else {
            ready(Err(actix_web::error::ErrorUnauthorized("Not authenticated")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[actix_rt::test]
    async fn extraction_fails_without_the_middleware_insert() {
        let req = TestRequest::default().to_http_request();
        let result = AuthenticatedUser::extract(&req).await;
        assert!(result.is_err());
    }

    #[actix_rt::test]
    async fn extraction_returns_the_inserted_identity() {
        let req = TestRequest::default().to_http_request();
        let user = AuthenticatedUser {
            user_id: Uuid::new_v4(),
            email: "user@example.com".to_string(),
            token_id: Uuid::new_v4(),
            role: UserRole::Standard,
        };
        req.extensions_mut().insert(user.clone());

        let extracted = AuthenticatedUser::extract(&req).await.unwrap();
        assert_eq!(extracted.user_id, user.user_id);
        assert_eq!(extracted.token_id, user.token_id);
    }
}
