//! Bearer-token authentication for the upgrade endpoint.
//!
//! The hub only consumes the result of authentication, a user identifier.
//! `TokenAuthenticator` is the seam the gateway resolves tokens through.

mod claims;
mod jwt;

pub use claims::Claims;
pub use jwt::JwtValidator;

use crate::error::AppError;

/// Maps a bearer credential to the user identifier it was issued for.
pub trait TokenAuthenticator: Send + Sync {
    fn authenticate(&self, token: &str) -> Result<String, AppError>;
}
