//! Gateway application state.
//!
//! This module defines the shared state that is available to all request handlers.

use std::sync::Arc;

use murmur_auth::JwtValidator;
use murmur_realtime::ChatCore;

use crate::config::GatewayConfig;

/// Shared application state for the gateway.
///
/// The WebSocket and REST handlers share one `ChatCore`, so both surfaces
/// see the same connections and rooms.
pub struct GatewayState<C, V>
where
    C: ChatCore,
    V: JwtValidator,
{
    /// The messaging core.
    pub chat: Arc<C>,
    /// The JWT validator for authentication.
    pub jwt_validator: Arc<V>,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl<C, V> GatewayState<C, V>
where
    C: ChatCore,
    V: JwtValidator,
{
    /// Create a new gateway state.
    #[must_use]
    pub fn new(chat: Arc<C>, jwt_validator: Arc<V>, config: GatewayConfig) -> Self {
        Self {
            chat,
            jwt_validator,
            config,
        }
    }
}

impl<C, V> Clone for GatewayState<C, V>
where
    C: ChatCore,
    V: JwtValidator,
{
    fn clone(&self) -> Self {
        Self {
            chat: Arc::clone(&self.chat),
            jwt_validator: Arc::clone(&self.jwt_validator),
            config: self.config.clone(),
        }
    }
}
