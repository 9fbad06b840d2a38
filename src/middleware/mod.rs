pub mod secure_auth;
pub mod service_key_auth;

pub use secure_auth::SessionAuthentication;
pub use service_key_auth::ServiceKeyAuthentication;
