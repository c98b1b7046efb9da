//! CPRHub Auth: password verification, JWT issuance/validation and
//! logout blacklisting.

pub mod config;
pub mod error;
pub mod password;
pub mod service;
pub mod token;

pub use config::AuthConfig;
pub use error::AuthError;
pub use service::{AuthContext, AuthService, LoginInput, LoginOutput};
pub use token::AccessTokenClaims;
