//! Core entity structures

use crate::{is_placeholder_id, RecordId, RequestStatus, SubmissionStatus, Timestamp};
use serde::{Deserialize, Serialize};

/// Snapshot of the equipment item a request refers to.
///
/// Carried on the request so list views never need a join against the
/// inventory collection; `consumable` determines whether the server may
/// auto-submit on approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    pub id: RecordId,
    pub name: String,
    pub consumable: bool,
}

/// Snapshot of the requesting student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequesterRef {
    pub id: RecordId,
    pub name: String,
}

/// A student's request for equipment issuance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueRequest {
    /// Negative id = local placeholder awaiting server confirmation.
    pub id: RecordId,
    pub item: ItemRef,
    pub requester: RequesterRef,
    pub quantity: u32,
    pub status: RequestStatus,
    pub submission_status: SubmissionStatus,
    pub created_at: Timestamp,
    pub approved_at: Option<Timestamp>,
    pub return_by: Option<Timestamp>,
    pub submitted_at: Option<Timestamp>,
    pub remarks: Option<String>,
}

impl IssueRequest {
    pub fn is_placeholder(&self) -> bool {
        is_placeholder_id(self.id)
    }

    /// Submission state as views must interpret it: meaningful only while
    /// approved, `NotRequired` otherwise regardless of the raw field.
    pub fn effective_submission(&self) -> SubmissionStatus {
        match self.status {
            RequestStatus::Approved => self.submission_status,
            RequestStatus::Pending | RequestStatus::Rejected => SubmissionStatus::NotRequired,
        }
    }

    /// True once the request can no longer transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, RequestStatus::Rejected)
            || (self.status == RequestStatus::Approved
                && self.submission_status == SubmissionStatus::Submitted)
    }
}

/// A piece of lab equipment available for issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentItem {
    pub id: RecordId,
    pub name: String,
    /// Quantity currently available; mirrored optimistically on create.
    pub available: u32,
    pub min_issue_limit: u32,
    pub max_issue_limit: u32,
    pub consumable: bool,
}

/// A financial bill tracked by the ledger subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub id: RecordId,
    pub financial_year: String,
    pub description: String,
    /// Amount in the smallest currency unit.
    pub amount: i64,
    pub created_at: Timestamp,
}

/// A lab handout tracked by the ledger subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handout {
    pub id: RecordId,
    pub lab: String,
    pub title: String,
    pub issued_on: Timestamp,
    pub created_at: Timestamp,
}

/// A remark message attached to a requester's thread.
///
/// Delivered over the requests channel as a `message` event; drives the
/// unread flag on requester groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestNote {
    pub requester_id: RecordId,
    pub body: String,
    pub sent_at: Timestamp,
}
