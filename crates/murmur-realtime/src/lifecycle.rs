//! Delivery status state machine.
//!
//! Each (message, recipient) pair moves forward only:
//!
//! ```text
//!   ┌────────┐  device ack   ┌───────────┐   seen   ┌────────┐
//!   │  Sent  │──────────────▶│ Delivered │─────────▶│  Read  │
//!   └────────┘               └───────────┘          └────────┘
//!        │                                               ▲
//!        └───────────────────────────────────────────────┘
//!                          seen (skip)
//! ```
//!
//! Requests to move to the current state or to an earlier one are accepted
//! as no-ops rather than rejected.

use murmur_store::DeliveryStatus;

use crate::error::{ChatError, Result};

/// Check if moving from `from` to `to` advances the state.
#[must_use]
pub const fn is_forward_transition(from: DeliveryStatus, to: DeliveryStatus) -> bool {
    from.as_u8() < to.as_u8()
}

/// Parse a client-supplied status name.
///
/// # Errors
///
/// Returns `ChatError::InvalidArgument` for anything other than `sent`,
/// `delivered` or `read`.
pub fn parse_status(raw: &str) -> Result<DeliveryStatus> {
    match raw {
        "sent" => Ok(DeliveryStatus::Sent),
        "delivered" => Ok(DeliveryStatus::Delivered),
        "read" => Ok(DeliveryStatus::Read),
        _ => Err(ChatError::InvalidArgument("Invalid status".to_string())),
    }
}
