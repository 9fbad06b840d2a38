pub mod password_hashing;
pub mod reset_codes;
pub mod service_credentials;
