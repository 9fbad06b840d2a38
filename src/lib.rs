//! Backoffice Authentication Server Library
//!
//! This library exports the core modules used by the server binary and by
//! integration tests.

pub mod auth_stores;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod security;
pub mod services;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::AppSettings;
pub use error::{AppError, AppResult};
