//! Push-Channel Event Types
//!
//! Raw channel frames carry `{ "event": "<name>", "payload": { ... } }`.
//! Each channel has a closed event set decoded here into a tagged union;
//! anything outside the set is an explicit `EventDecodeError` so the
//! consumer can log and drop it without touching the stream.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use stockroom_core::{Bill, EquipmentItem, EventDecodeError, Handout, IssueRequest, RecordId, RequestNote};

/// A raw frame as read off a push channel, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawChannelMessage {
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl RawChannelMessage {
    /// Parse a channel text frame.
    pub fn parse(text: &str) -> Result<Self, EventDecodeError> {
        serde_json::from_str(text).map_err(|err| EventDecodeError::InvalidFrame {
            reason: err.to_string(),
        })
    }
}

/// The channel a frame arrived on. Channels are independent; ordering is
/// only guaranteed within one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Requests,
    Inventory,
    Finance,
}

/// Payload of a `deleted`-style event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedPayload {
    pub id: RecordId,
}

/// Payload of a `bulk_rejected` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkRejectedPayload {
    pub ids: Vec<RecordId>,
    #[serde(default)]
    pub remarks: Option<String>,
}

fn payload<T: DeserializeOwned>(
    event: &str,
    value: &serde_json::Value,
) -> Result<T, EventDecodeError> {
    serde_json::from_value(value.clone()).map_err(|err| EventDecodeError::MalformedPayload {
        event: event.to_string(),
        reason: err.to_string(),
    })
}

// ============================================================================
// REQUESTS CHANNEL
// ============================================================================

/// Events on the issue-requests channel.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestsEvent {
    Created(IssueRequest),
    Updated(IssueRequest),
    Deleted { id: RecordId },
    BulkRejected { ids: Vec<RecordId>, remarks: Option<String> },
    Message(RequestNote),
}

impl RequestsEvent {
    /// Decode a raw frame from the requests channel.
    pub fn decode(raw: &RawChannelMessage) -> Result<Self, EventDecodeError> {
        match raw.event.as_str() {
            "created" => Ok(Self::Created(payload(&raw.event, &raw.payload)?)),
            "updated" => Ok(Self::Updated(payload(&raw.event, &raw.payload)?)),
            "deleted" => {
                let body: DeletedPayload = payload(&raw.event, &raw.payload)?;
                Ok(Self::Deleted { id: body.id })
            }
            "bulk_rejected" => {
                let body: BulkRejectedPayload = payload(&raw.event, &raw.payload)?;
                Ok(Self::BulkRejected {
                    ids: body.ids,
                    remarks: body.remarks,
                })
            }
            "message" => Ok(Self::Message(payload(&raw.event, &raw.payload)?)),
            other => Err(EventDecodeError::UnknownEvent {
                event: other.to_string(),
            }),
        }
    }

    /// Event name for logging.
    pub fn event_name(&self) -> &'static str {
        match self {
            RequestsEvent::Created(_) => "created",
            RequestsEvent::Updated(_) => "updated",
            RequestsEvent::Deleted { .. } => "deleted",
            RequestsEvent::BulkRejected { .. } => "bulk_rejected",
            RequestsEvent::Message(_) => "message",
        }
    }
}

// ============================================================================
// INVENTORY CHANNEL
// ============================================================================

/// Events on the equipment-inventory channel.
#[derive(Debug, Clone, PartialEq)]
pub enum InventoryEvent {
    Created(EquipmentItem),
    Updated(EquipmentItem),
    Deleted { id: RecordId },
}

impl InventoryEvent {
    /// Decode a raw frame from the inventory channel.
    pub fn decode(raw: &RawChannelMessage) -> Result<Self, EventDecodeError> {
        match raw.event.as_str() {
            "created" => Ok(Self::Created(payload(&raw.event, &raw.payload)?)),
            "updated" => Ok(Self::Updated(payload(&raw.event, &raw.payload)?)),
            "deleted" => {
                let body: DeletedPayload = payload(&raw.event, &raw.payload)?;
                Ok(Self::Deleted { id: body.id })
            }
            other => Err(EventDecodeError::UnknownEvent {
                event: other.to_string(),
            }),
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            InventoryEvent::Created(_) => "created",
            InventoryEvent::Updated(_) => "updated",
            InventoryEvent::Deleted { .. } => "deleted",
        }
    }
}

// ============================================================================
// FINANCE CHANNEL (bills + handouts)
// ============================================================================

/// Events on the finance channel, covering bills and lab handouts.
#[derive(Debug, Clone, PartialEq)]
pub enum FinanceEvent {
    BillCreated(Bill),
    BillUpdated(Bill),
    BillDeleted { id: RecordId },
    HandoutCreated(Handout),
    HandoutUpdated(Handout),
    HandoutDeleted { id: RecordId },
}

impl FinanceEvent {
    /// Decode a raw frame from the finance channel.
    pub fn decode(raw: &RawChannelMessage) -> Result<Self, EventDecodeError> {
        match raw.event.as_str() {
            "bill_created" => Ok(Self::BillCreated(payload(&raw.event, &raw.payload)?)),
            "bill_updated" => Ok(Self::BillUpdated(payload(&raw.event, &raw.payload)?)),
            "bill_deleted" => {
                let body: DeletedPayload = payload(&raw.event, &raw.payload)?;
                Ok(Self::BillDeleted { id: body.id })
            }
            "handout_created" => Ok(Self::HandoutCreated(payload(&raw.event, &raw.payload)?)),
            "handout_updated" => Ok(Self::HandoutUpdated(payload(&raw.event, &raw.payload)?)),
            "handout_deleted" => {
                let body: DeletedPayload = payload(&raw.event, &raw.payload)?;
                Ok(Self::HandoutDeleted { id: body.id })
            }
            other => Err(EventDecodeError::UnknownEvent {
                event: other.to_string(),
            }),
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            FinanceEvent::BillCreated(_) => "bill_created",
            FinanceEvent::BillUpdated(_) => "bill_updated",
            FinanceEvent::BillDeleted { .. } => "bill_deleted",
            FinanceEvent::HandoutCreated(_) => "handout_created",
            FinanceEvent::HandoutUpdated(_) => "handout_updated",
            FinanceEvent::HandoutDeleted { .. } => "handout_deleted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_core::{RequestStatus, SubmissionStatus};

    fn raw(event: &str, payload: serde_json::Value) -> RawChannelMessage {
        RawChannelMessage {
            event: event.to_string(),
            payload,
        }
    }

    fn request_json(id: i64) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "item": {"id": 3, "name": "Soldering iron", "consumable": false},
            "requester": {"id": 9, "name": "Ravi"},
            "quantity": 1,
            "status": "pending",
            "submission_status": "not_required",
            "created_at": "2025-03-02T10:00:00Z",
            "approved_at": null,
            "return_by": null,
            "submitted_at": null,
            "remarks": null
        })
    }

    #[test]
    fn test_parse_frame() {
        let frame = RawChannelMessage::parse(r#"{"event": "deleted", "payload": {"id": 5}}"#)
            .expect("parse");
        assert_eq!(frame.event, "deleted");
    }

    #[test]
    fn test_parse_frame_invalid_json() {
        let err = RawChannelMessage::parse("not json").unwrap_err();
        assert!(matches!(err, EventDecodeError::InvalidFrame { .. }));
    }

    #[test]
    fn test_parse_frame_missing_payload_defaults_null() {
        let frame = RawChannelMessage::parse(r#"{"event": "ping"}"#).expect("parse");
        assert_eq!(frame.payload, serde_json::Value::Null);
    }

    #[test]
    fn test_decode_created_request() {
        let event = RequestsEvent::decode(&raw("created", request_json(12))).expect("decode");
        match event {
            RequestsEvent::Created(request) => {
                assert_eq!(request.id, 12);
                assert_eq!(request.status, RequestStatus::Pending);
                assert_eq!(request.submission_status, SubmissionStatus::NotRequired);
            }
            other => panic!("expected Created, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_bulk_rejected() {
        let event = RequestsEvent::decode(&raw(
            "bulk_rejected",
            serde_json::json!({"ids": [1, 2, 3], "remarks": "semester over"}),
        ))
        .expect("decode");
        match event {
            RequestsEvent::BulkRejected { ids, remarks } => {
                assert_eq!(ids, vec![1, 2, 3]);
                assert_eq!(remarks.as_deref(), Some("semester over"));
            }
            other => panic!("expected BulkRejected, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_unknown_event_name() {
        let err = RequestsEvent::decode(&raw("archived", serde_json::json!({}))).unwrap_err();
        assert_eq!(
            err,
            EventDecodeError::UnknownEvent {
                event: "archived".to_string()
            }
        );
    }

    #[test]
    fn test_decode_malformed_payload() {
        let err = RequestsEvent::decode(&raw("deleted", serde_json::json!({"nope": true})))
            .unwrap_err();
        assert!(matches!(err, EventDecodeError::MalformedPayload { .. }));
    }

    #[test]
    fn test_decode_finance_events() {
        let bill = serde_json::json!({
            "id": 7,
            "financial_year": "2024-25",
            "description": "Resistor restock",
            "amount": 145000,
            "created_at": "2025-01-15T08:30:00Z"
        });
        let event = FinanceEvent::decode(&raw("bill_created", bill)).expect("decode");
        match event {
            FinanceEvent::BillCreated(bill) => assert_eq!(bill.financial_year, "2024-25"),
            other => panic!("expected BillCreated, got {:?}", other),
        }

        let event = FinanceEvent::decode(&raw("handout_deleted", serde_json::json!({"id": 4})))
            .expect("decode");
        assert_eq!(event, FinanceEvent::HandoutDeleted { id: 4 });
    }

    #[test]
    fn test_inventory_channel_does_not_know_request_events() {
        let err = InventoryEvent::decode(&raw("bulk_rejected", serde_json::json!({"ids": []})))
            .unwrap_err();
        assert!(matches!(err, EventDecodeError::UnknownEvent { .. }));
    }
}
