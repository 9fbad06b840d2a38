use actix_web::web;

use crate::handlers;
use crate::middleware::{ServiceKeyAuthentication, SessionAuthentication};

/// Mounts the whole HTTP surface. Everything hangs off one `/auth` scope so
/// route order stays explicit: public endpoints first, the service-gated
/// verifier next, and the bearer-guarded scope last because its empty prefix
/// matches anything under `/auth`.
pub fn configure_routes(
    cfg: &mut web::ServiceConfig,
    session_auth: SessionAuthentication,
    service_key: ServiceKeyAuthentication,
) {
    cfg.route("/health", web::get().to(handlers::health::health_check));

    cfg.service(
        web::scope("/auth")
            .route(
                "/signin",
                web::post().to(handlers::auth::signin_handler::signin),
            )
            .route(
                "/refresh",
                web::post().to(handlers::auth::refresh_handler::refresh),
            )
            .route(
                "/forgot-password",
                web::post().to(handlers::auth::password_handler::forgot_password),
            )
            .route(
                "/reset-password",
                web::post().to(handlers::auth::password_handler::reset_password),
            )
            // Public so that accounts answered with 355 at sign-in can still
            // complete the forced change.
            .route(
                "/change-password",
                web::post().to(handlers::auth::password_handler::change_password),
            )
            .service(
                web::resource("/verify-token")
                    .wrap(service_key)
                    .route(web::post().to(handlers::auth::verify_handler::verify_token)),
            )
            .service(
                web::scope("")
                    .wrap(session_auth)
                    .route(
                        "/logout",
                        web::post().to(handlers::auth::logout_handler::logout),
                    )
                    .route(
                        "/logout-all",
                        web::post().to(handlers::auth::logout_handler::logout_all),
                    )
                    .route(
                        "/logout-all-users",
                        web::post().to(handlers::auth::logout_handler::logout_all_users),
                    )
                    .route(
                        "/sessions",
                        web::get().to(handlers::auth::logout_handler::sessions),
                    ),
            ),
    );
}
