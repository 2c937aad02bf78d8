//! HTTP and WebSocket gateway for murmur.
//!
//! This crate provides the public-facing surface of the messaging core:
//!
//! - Bearer token authentication, resolved to a stored user
//! - A WebSocket endpoint carrying `{"event", "data"}` frames
//! - REST endpoints sharing the same pipeline and live state
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Clients                              │
//! │                   (HTTP / WebSocket)                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     murmur-gateway                          │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │   Auth      │ │   Router    │ │    WebSocket        │    │
//! │  │  Extractor  │ │  + Handlers │ │    Reader/Writer    │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┴──────────────┐
//!               ▼                             ▼
//!        ┌──────────────┐              ┌──────────┐
//!        │ ChatService  │              │  Auth    │
//!        │ (realtime)   │              │  (JWT)   │
//!        └──────────────┘              └──────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use murmur_auth::{AuthConfig, HmacValidator};
//! use murmur_gateway::{create_router, GatewayConfig, GatewayState};
//! use murmur_realtime::ChatService;
//! use murmur_store::RocksStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(RocksStore::open("/tmp/murmur")?);
//! let chat = Arc::new(ChatService::with_defaults(store));
//! let jwt_validator = Arc::new(HmacValidator::new(&AuthConfig::new("change-me")));
//!
//! let state = GatewayState::new(chat, jwt_validator, GatewayConfig::default());
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::GatewayConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::GatewayState;

// Re-export key types for convenience
pub use auth::AuthUser;
