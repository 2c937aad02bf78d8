//! Bearer token validation for murmur.
//!
//! This crate resolves the bearer credential presented on a request or a
//! WebSocket handshake to a [`UserId`](murmur_core::UserId):
//!
//! - HS256 (shared secret) signature validation
//! - Expiry checking with configurable leeway
//! - Optional issuer pinning
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐
//! │   Gateway        │────▶│   JwtValidator   │
//! │   (HTTP/WS)      │     │   (trait)        │
//! └──────────────────┘     └────────┬─────────┘
//!                                   │
//!                     ┌─────────────┴─────────────┐
//!            ┌────────▼─────────┐       ┌─────────▼────────┐
//!            │  HmacValidator   │       │ MockJwtValidator │
//!            │  (production)    │       │ (test-utils)     │
//!            └──────────────────┘       └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use murmur_auth::{AuthConfig, HmacValidator, JwtValidator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let validator = HmacValidator::new(&AuthConfig::new("change-me"));
//!
//! // In a request handler:
//! let token = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...";
//! let claims = validator.validate(token).await?;
//!
//! println!("User ID: {}", claims.user_id);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod jwt;

pub use error::{AuthError, Result};
pub use jwt::{HmacValidator, JwtValidator, ValidatedClaims};

#[cfg(any(test, feature = "test-utils"))]
pub use jwt::MockJwtValidator;

/// Default clock skew tolerated when checking `exp`, in seconds.
pub const DEFAULT_LEEWAY_SECONDS: u64 = 60;

/// Configuration for token validation.
#[derive(Clone)]
pub struct AuthConfig {
    /// Shared HS256 secret.
    pub secret: String,
    /// Expected `iss` claim. Unchecked when `None`.
    pub issuer: Option<String>,
    /// Clock skew tolerated when checking `exp`, in seconds.
    pub leeway_seconds: u64,
}

impl AuthConfig {
    /// Create a configuration with the given secret and default settings.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: None,
            leeway_seconds: DEFAULT_LEEWAY_SECONDS,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("leeway_seconds", &self.leeway_seconds)
            .finish()
    }
}
