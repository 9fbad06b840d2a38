use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, HttpMessage,
};
use futures_util::future::{ok, ready, Ready};
use log::{debug, warn};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::error::AppError;
use crate::models::auth_claims::TokenKind;
use crate::models::authenticated_user::AuthenticatedUser;
use crate::models::user::UserRole;
use crate::services::auth::TokenService;

// Marker struct to indicate the request already went through this middleware
#[derive(Debug)]
struct AuthChecked;

/// Guards the protected API surface. Every request must carry a bearer access
/// token that clears signature, expiry, kind, revocation, and
/// session-membership checks before the handler runs.
#[derive(Clone)]
pub struct SessionAuthentication {
    tokens: TokenService,
}

impl SessionAuthentication {
    pub fn new(tokens: TokenService) -> Self {
        Self { tokens }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionAuthentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = SessionAuthenticationMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(SessionAuthenticationMiddleware {
            service: Arc::new(service),
            tokens: self.tokens.clone(),
        })
    }
}

pub struct SessionAuthenticationMiddleware<S> {
    service: Arc<S>,
    tokens: TokenService,
}

impl<S, B> Service<ServiceRequest> for SessionAuthenticationMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();

        if req.extensions().get::<AuthChecked>().is_some() {
            return Box::pin(service.call(req));
        }

        // CORS pre-flight carries no credentials
        if req.method() == actix_web::http::Method::OPTIONS {
            req.extensions_mut().insert(AuthChecked);
            return Box::pin(service.call(req));
        }

        req.extensions_mut().insert(AuthChecked);

        let token = match bearer_token(&req) {
            Ok(token) => token,
            Err(e) => {
                warn!("Rejected request to {}: {}", req.path(), e);
                return Box::pin(ready(Err(e.into())));
            }
        };

        let tokens = self.tokens.clone();
        Box::pin(async move {
            match tokens.verify(&token, TokenKind::Access).await {
                Ok(claims) => {
                    debug!(
                        "Access token accepted for user {} on {}",
                        claims.user_id,
                        req.path()
                    );
                    req.extensions_mut().insert(AuthenticatedUser {
                        user_id: claims.user_id,
                        email: claims.email.unwrap_or_default(),
                        token_id: claims.token_id,
                        role: claims.role.unwrap_or(UserRole::Standard),
                    });
                    service.call(req).await
                }
                Err(e) => {
                    warn!("Access token rejected on {}: {}", req.path(), e);
                    Err(AppError::from(e).into())
                }
            }
        })
    }
}

/// Pulls the bearer token out of the Authorization header.
pub fn bearer_token(req: &ServiceRequest) -> Result<String, AppError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Auth("Missing Authorization header".to_string()))?;
    let value = header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid Authorization header".to_string()))?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Expected a Bearer token".to_string()))?
        .trim();
    if token.is_empty() {
        return Err(AppError::Auth("Empty Bearer token".to_string()));
    }
    Ok(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App, HttpResponse};
    use uuid::Uuid;

    use crate::auth_stores::SecurityStore;
    use crate::config::settings::AuthConfig;
    use crate::services::revocation_registry::RevocationRegistry;
    use crate::services::session_registry::SessionRegistry;

    fn token_service() -> TokenService {
        let store = SecurityStore::new_memory();
        let auth = AuthConfig {
            jwt_secret: "unit-test-secret-0123456789abcdef-0123456789".to_string(),
            access_token_ttl_minutes: 15,
            refresh_token_ttl_hours: 24,
            max_concurrent_sessions: 3,
        };
        TokenService::new(
            &auth,
            SessionRegistry::new(store.clone(), 3, 86_400),
            RevocationRegistry::new(store, 86_400),
        )
        .unwrap()
    }

    async fn whoami(user: AuthenticatedUser) -> HttpResponse {
        HttpResponse::Ok().body(user.user_id.to_string())
    }

    #[actix_rt::test]
    async fn valid_access_token_reaches_the_handler() {
        let tokens = token_service();
        let user_id = Uuid::new_v4();
        let issued = tokens
            .issue(&user_id, "user@example.com", UserRole::Standard)
            .await
            .unwrap();

        let app = test::init_service(
            App::new()
                .wrap(SessionAuthentication::new(tokens))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/whoami")
            .insert_header((AUTHORIZATION, format!("Bearer {}", issued.access_token)))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert!(resp.status().is_success());
        let body = test::read_body(resp).await;
        assert_eq!(body, user_id.to_string().as_bytes());
    }

    #[actix_rt::test]
    async fn missing_header_is_unauthorized() {
        let app = test::init_service(
            App::new()
                .wrap(SessionAuthentication::new(token_service()))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get().uri("/whoami").to_request();
        let resp = test::try_call_service(&app, req).await;

        let err = resp.unwrap_err();
        assert_eq!(err.error_response().status(), 401);
    }

    #[actix_rt::test]
    async fn refresh_token_cannot_open_the_api() {
        let tokens = token_service();
        let issued = tokens
            .issue(&Uuid::new_v4(), "user@example.com", UserRole::Standard)
            .await
            .unwrap();

        let app = test::init_service(
            App::new()
                .wrap(SessionAuthentication::new(tokens))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/whoami")
            .insert_header((AUTHORIZATION, format!("Bearer {}", issued.refresh_token)))
            .to_request();
        let resp = test::try_call_service(&app, req).await;

        let err = resp.unwrap_err();
        assert_eq!(err.error_response().status(), 401);
    }

    #[actix_rt::test]
    async fn revoked_token_is_rejected() {
        let tokens = token_service();
        let user_id = Uuid::new_v4();
        let issued = tokens
            .issue(&user_id, "user@example.com", UserRole::Standard)
            .await
            .unwrap();
        tokens.revoke(&user_id, &issued.token_id).await.unwrap();

        let app = test::init_service(
            App::new()
                .wrap(SessionAuthentication::new(tokens))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/whoami")
            .insert_header((AUTHORIZATION, format!("Bearer {}", issued.access_token)))
            .to_request();
        let resp = test::try_call_service(&app, req).await;

        let err = resp.unwrap_err();
        assert_eq!(err.error_response().status(), 401);
    }
}
