//! Murmur Gateway - real-time messaging server
//!
//! This is the main entry point for the gateway service. It embeds the
//! messaging core and serves both the WebSocket and REST surfaces.
//!
//! # Configuration
//!
//! - `LISTEN_ADDR` (default `0.0.0.0:8080`)
//! - `DATA_DIR` (default `/data/murmur`)
//! - `JWT_SECRET`: HS256 secret, required unless built with `dev-mode`
//! - `JWT_ISSUER`: expected `iss` claim, optional
//!
//! # Dev Mode
//!
//! Build with `--features dev-mode` to use a mock JWT validator.
//! Use tokens in format: `test-token:<user_id>`

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "dev-mode")]
use murmur_auth::MockJwtValidator;
#[cfg(not(feature = "dev-mode"))]
use murmur_auth::{AuthConfig, HmacValidator};
use murmur_gateway::{create_router, GatewayConfig, GatewayState};
use murmur_realtime::{ChatConfig, ChatService};
use murmur_store::RocksStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,murmur=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Murmur Gateway");

    // Load configuration from environment
    let listen_addr = std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into());
    let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/murmur".into());
    let jwt_issuer = std::env::var("JWT_ISSUER").ok();

    tracing::info!(
        listen_addr = %listen_addr,
        data_dir = %data_dir,
        jwt_issuer = ?jwt_issuer,
        "Gateway configuration loaded"
    );

    // Initialize RocksDB store
    tracing::info!(path = %data_dir, "Opening RocksDB store");
    let store = Arc::new(RocksStore::open(&data_dir)?);

    let chat = Arc::new(ChatService::new(store, ChatConfig::default()));
    tracing::info!("Messaging core initialized");

    // Initialize JWT validator
    #[cfg(feature = "dev-mode")]
    let jwt_validator = {
        let _ = jwt_issuer;
        tracing::warn!("DEV MODE ENABLED - using mock JWT validator");
        tracing::warn!("Use tokens in format: test-token:<user_id>");
        Arc::new(MockJwtValidator)
    };

    #[cfg(not(feature = "dev-mode"))]
    let jwt_validator = {
        let secret = std::env::var("JWT_SECRET").map_err(|_| "JWT_SECRET must be set")?;
        let mut auth_config = AuthConfig::new(secret);
        auth_config.issuer = jwt_issuer;
        Arc::new(HmacValidator::new(&auth_config))
    };
    tracing::info!("JWT validator initialized");

    // Build gateway state and configuration
    let gateway_config = GatewayConfig {
        listen_addr: listen_addr.clone(),
        ..GatewayConfig::default()
    };
    let state = GatewayState::new(chat, jwt_validator, gateway_config);

    let app = create_router(state);

    // Start HTTP server
    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
