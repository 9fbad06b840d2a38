pub mod jwt;

pub use jwt::{IssuedTokens, TokenService, TokenVerifyError};
