//! HTTP request handlers.
//!
//! This module contains all the endpoint handlers for the gateway API.

pub mod conversations;
pub mod health;
pub mod messages;
pub mod notifications;
pub mod ws;
