use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::net::TcpListener;

use backoffice_auth_server::auth_stores::create_security_store;
use backoffice_auth_server::config::AppSettings;
use backoffice_auth_server::db::connection::{create_pool, verify_connection};
use backoffice_auth_server::db::repositories::{PermissionRepository, UserRepository};
use backoffice_auth_server::middleware::{ServiceKeyAuthentication, SessionAuthentication};
use backoffice_auth_server::routes;
use backoffice_auth_server::services::account_lockout::AccountLockoutTracker;
use backoffice_auth_server::services::auth::TokenService;
use backoffice_auth_server::services::credential_validator::create_credential_validator;
use backoffice_auth_server::services::maintenance::MaintenanceGate;
use backoffice_auth_server::services::notification_queue::NotificationQueue;
use backoffice_auth_server::services::permission_resolver::PermissionResolver;
use backoffice_auth_server::services::rate_limiter::{LoginRateLimiter, PasswordResetRateLimiter};
use backoffice_auth_server::services::revocation_registry::RevocationRegistry;
use backoffice_auth_server::services::session_registry::SessionRegistry;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // Load application settings
    let app_settings = match AppSettings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Failed to load application settings: {}", e);
            log::error!("Cannot start server without valid settings");
            std::process::exit(1);
        }
    };

    // Database connection setup
    let db_pool = match create_pool(&app_settings.database).await {
        Ok(pool) => {
            if let Err(e) = verify_connection(&pool).await {
                log::error!("Database connection verification failed: {}", e);
                log::error!("Cannot start server without a working database connection");
                std::process::exit(1);
            }
            log::info!("Database connection established successfully");
            pool
        }
        Err(e) => {
            log::error!("Failed to create database connection pool: {}", e);
            log::error!("Cannot start server without a working database connection");
            std::process::exit(1);
        }
    };

    // Shared security store holding limiter, lockout, session, and revocation
    // state
    let store = match create_security_store(&app_settings.store.redis_url).await {
        Ok(store) => store,
        Err(e) => {
            log::error!("Failed to initialize security store: {}", e);
            std::process::exit(1);
        }
    };
    let _ = store.start_cleanup_task(60);

    // Sessions and revocations both live as long as the longest refresh token
    let retention_secs = app_settings.auth.refresh_token_ttl_hours * 3600;
    let sessions = SessionRegistry::new(
        store.clone(),
        app_settings.auth.max_concurrent_sessions,
        retention_secs,
    );
    let revocations = RevocationRegistry::new(store.clone(), retention_secs);

    let token_service = match TokenService::new(&app_settings.auth, sessions, revocations) {
        Ok(service) => service,
        Err(e) => {
            log::error!("Failed to initialize token service: {}", e);
            log::error!("Cannot start server without a working signing secret");
            std::process::exit(1);
        }
    };

    let credential_validator = match create_credential_validator(&app_settings.credentials) {
        Ok(validator) => validator,
        Err(e) => {
            log::error!("Failed to initialize credential validator: {}", e);
            std::process::exit(1);
        }
    };

    let login_limiter = LoginRateLimiter::new(store.clone(), &app_settings.rate_limit);
    let reset_limiter = PasswordResetRateLimiter::new(store.clone(), &app_settings.rate_limit);
    let lockout = AccountLockoutTracker::new(store.clone(), app_settings.lockout.clone());
    let maintenance = MaintenanceGate::new(store.clone(), app_settings.maintenance.enabled);

    let host = &app_settings.server.host;
    let port = app_settings.server.port;
    log::info!("Starting server at http://{}:{}", host, port);

    let listener = TcpListener::bind(format!("{}:{}", host, port))?;

    HttpServer::new(move || {
        let session_auth = SessionAuthentication::new(token_service.clone());
        let service_key = ServiceKeyAuthentication::new(app_settings.service_gate.clone());

        // Configure CORS using actix-cors
        let mut cors = Cors::default().supports_credentials();
        if app_settings.server.cors_origins.contains(&"*".to_string()) {
            cors = cors.allow_any_origin();
        } else {
            for origin in &app_settings.server.cors_origins {
                cors = cors.allowed_origin(origin);
            }
        }
        cors = cors.allow_any_method().allow_any_header();

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(web::Data::new(app_settings.clone()))
            .app_data(web::Data::new(store.clone()))
            .app_data(web::Data::new(UserRepository::new(db_pool.clone())))
            .app_data(web::Data::new(PermissionResolver::new(
                PermissionRepository::new(db_pool.clone()),
            )))
            .app_data(web::Data::new(NotificationQueue::new(db_pool.clone())))
            .app_data(web::Data::new(token_service.clone()))
            .app_data(web::Data::new(login_limiter.clone()))
            .app_data(web::Data::new(reset_limiter.clone()))
            .app_data(web::Data::new(lockout.clone()))
            .app_data(web::Data::from(credential_validator.clone()))
            .app_data(web::Data::new(maintenance.clone()))
            .configure(|cfg| routes::configure_routes(cfg, session_auth, service_key))
    })
    .listen(listener)?
    .run()
    .await
}
