pub mod account_lockout;
pub mod auth;
pub mod credential_validator;
pub mod maintenance;
pub mod notification_queue;
pub mod password_policy;
pub mod permission_resolver;
pub mod rate_limiter;
pub mod revocation_registry;
pub mod session_registry;
