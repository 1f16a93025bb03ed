//! Error types for stockroom operations

use crate::RecordId;
use thiserror::Error;

/// Client-side precondition failures, caught before any network call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Quantity {quantity} is below the minimum issue limit of {min}")]
    QuantityBelowMinimum { quantity: u32, min: u32 },

    #[error("Quantity {quantity} exceeds the maximum issue limit of {max}")]
    QuantityAboveMaximum { quantity: u32, max: u32 },

    #[error("Quantity {quantity} exceeds the {available} currently available")]
    QuantityUnavailable { quantity: u32, available: u32 },

    #[error("A remark is required for {action}")]
    RemarkRequired { action: &'static str },

    #[error("Unknown item: {id}")]
    UnknownItem { id: RecordId },

    #[error("Unknown request: {id}")]
    UnknownRequest { id: RecordId },

    #[error("Request {id} is {status} and cannot be {action}")]
    InvalidTransition {
        id: RecordId,
        status: String,
        action: &'static str,
    },
}

/// Push-channel messages that fail to decode.
///
/// These are logged and dropped at the normalizer boundary; they must
/// never crash the stream.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EventDecodeError {
    #[error("Unknown event name: {event}")]
    UnknownEvent { event: String },

    #[error("Malformed payload for {event}: {reason}")]
    MalformedPayload { event: String, reason: String },

    #[error("Invalid channel frame: {reason}")]
    InvalidFrame { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display_bounds() {
        let err = ValidationError::QuantityAboveMaximum {
            quantity: 9,
            max: 5,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("9"));
        assert!(msg.contains("maximum issue limit of 5"));
    }

    #[test]
    fn test_validation_error_display_remark_required() {
        let err = ValidationError::RemarkRequired { action: "reject" };
        assert!(format!("{}", err).contains("reject"));
    }

    #[test]
    fn test_event_decode_error_display() {
        let err = EventDecodeError::UnknownEvent {
            event: "renamed".to_string(),
        };
        assert!(format!("{}", err).contains("renamed"));

        let err = EventDecodeError::MalformedPayload {
            event: "created".to_string(),
            reason: "missing id".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("created"));
        assert!(msg.contains("missing id"));
    }
}
