//! API Request and Response Types
//!
//! Request bodies and response envelopes for the stockroom REST API.
//! Field names match the server's JSON contract.

use serde::{Deserialize, Serialize};
use stockroom_core::{RecordId, Timestamp};

// ============================================================================
// COLLECTION ENVELOPE
// ============================================================================

/// One page of a partitioned collection, as the server returns it.
///
/// Items are in server-defined order; the client never re-sorts a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageEnvelope<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub total_pages: u32,
    pub total: u64,
}

impl<T> PageEnvelope<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            page: 1,
            total_pages: 0,
            total: 0,
        }
    }
}

impl<T> Default for PageEnvelope<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Structured error body returned by the server on 4xx/5xx.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub detail: String,
}

// ============================================================================
// ISSUE REQUEST BODIES
// ============================================================================

/// Body for `POST /issue-requests`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateIssueRequestBody {
    pub item_id: RecordId,
    pub quantity: u32,
}

/// Body for `POST /issue-requests/{id}/approve`.
///
/// Exactly one of `return_days` / `return_by` should be supplied;
/// the server (like the client) gives `return_by` precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApproveBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_by: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

/// Body for `POST /issue-requests/{id}/reject`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectBody {
    pub remarks: String,
}

/// Body for `POST /issue-requests/bulk-approve`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkApproveBody {
    pub ids: Vec<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_by: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

/// Body for `POST /issue-requests/bulk-reject`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkRejectBody {
    pub ids: Vec<RecordId>,
    pub remarks: String,
}

/// Body for `POST /issue-requests/{id}/submit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitBody {
    pub notify_email: bool,
}

/// Result of a bulk approve/reject call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub succeeded: Vec<RecordId>,
    #[serde(default)]
    pub failed: Vec<BatchFailure>,
}

/// One failed id within a batch call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub id: RecordId,
    pub detail: String,
}
