//! The authoritative request collection and its reducer.
//!
//! Local intents (optimistic transitions, placeholder bookkeeping) and
//! remote confirmations (push events, response reconciliation) all flow
//! through [`RequestLedger::apply`] as [`LedgerEvent`]s. The reducer is
//! the single place lifecycle invariants are enforced: nothing moves a
//! request out of `Rejected` or out of `Approved`+`Submitted`, and an
//! event that would is dropped, not partially applied. There is
//! deliberately no event that reverts an approve or submit - failed
//! calls wait for the next reconciling event instead of rolling back.

use chrono::Duration;
use stockroom_core::{
    IssueRequest, RecordId, RequestStatus, SubmissionStatus, Timestamp,
};

/// How far back a `created` event searches for a matching placeholder.
const PLACEHOLDER_MATCH_WINDOW_SECS: i64 = 300;

/// One step of the request lifecycle, local or remote.
#[derive(Debug, Clone)]
pub enum LedgerEvent {
    /// Optimistic insert of a locally-synthesized pending request.
    PlaceholderInserted { request: IssueRequest },
    /// A server record confirmed a placeholder; the placeholder goes
    /// away and the confirmed record must be present exactly once.
    PlaceholderResolved {
        placeholder_id: RecordId,
        confirmed: IssueRequest,
    },
    /// The create call failed; the placeholder is withdrawn.
    PlaceholderAbandoned { placeholder_id: RecordId },
    /// Optimistic or confirmed approval.
    Approved {
        id: RecordId,
        approved_at: Timestamp,
        return_by: Option<Timestamp>,
        remark: Option<String>,
    },
    /// Optimistic or confirmed submission of an approved request.
    Submitted {
        id: RecordId,
        at: Timestamp,
        remark: String,
    },
    /// Optimistic or confirmed rejection.
    Rejected { id: RecordId, remark: String },
    /// Authoritative server copy of a request (created/updated events,
    /// call responses).
    RemoteUpsert { request: IssueRequest },
    /// The server removed a request.
    Removed { id: RecordId },
    /// A batch rejection, one transition per id.
    BulkRejected {
        ids: Vec<RecordId>,
        remark: Option<String>,
    },
}

/// The authoritative in-memory request collection.
///
/// Owned by the engine; views read snapshots and never mutate.
#[derive(Debug, Default)]
pub struct RequestLedger {
    requests: Vec<IssueRequest>,
}

impl RequestLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> &[IssueRequest] {
        &self.requests
    }

    pub fn get(&self, id: RecordId) -> Option<&IssueRequest> {
        self.requests.iter().find(|request| request.id == id)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Oldest pending placeholder for this requester and item created
    /// within the match window, if any.
    pub fn find_matching_placeholder(
        &self,
        requester_id: RecordId,
        item_id: RecordId,
        now: Timestamp,
    ) -> Option<RecordId> {
        let window = Duration::seconds(PLACEHOLDER_MATCH_WINDOW_SECS);
        self.requests
            .iter()
            .filter(|request| {
                request.is_placeholder()
                    && request.status == RequestStatus::Pending
                    && request.requester.id == requester_id
                    && request.item.id == item_id
                    && now.signed_duration_since(request.created_at) <= window
            })
            .min_by_key(|request| request.created_at)
            .map(|request| request.id)
    }

    /// Apply one event. Returns false when the event was dropped by an
    /// invariant guard or changed nothing.
    pub fn apply(&mut self, event: LedgerEvent) -> bool {
        match event {
            LedgerEvent::PlaceholderInserted { request } => {
                if !request.is_placeholder() {
                    tracing::warn!(id = request.id, "placeholder insert with server id dropped");
                    return false;
                }
                self.requests.insert(0, request);
                true
            }
            LedgerEvent::PlaceholderResolved {
                placeholder_id,
                confirmed,
            } => {
                self.requests.retain(|request| request.id != placeholder_id);
                self.upsert_guarded(confirmed)
            }
            LedgerEvent::PlaceholderAbandoned { placeholder_id } => {
                let before = self.requests.len();
                self.requests.retain(|request| request.id != placeholder_id);
                self.requests.len() < before
            }
            LedgerEvent::Approved {
                id,
                approved_at,
                return_by,
                remark,
            } => {
                let Some(request) = self.requests.iter_mut().find(|r| r.id == id) else {
                    return false;
                };
                if request.is_terminal() {
                    tracing::warn!(id, "approve for terminal request dropped");
                    return false;
                }
                request.status = RequestStatus::Approved;
                request.approved_at = Some(approved_at);
                request.return_by = return_by;
                if request.submission_status == SubmissionStatus::NotRequired {
                    request.submission_status = SubmissionStatus::Pending;
                }
                if remark.is_some() {
                    request.remarks = remark;
                }
                true
            }
            LedgerEvent::Submitted { id, at, remark } => {
                let Some(request) = self.requests.iter_mut().find(|r| r.id == id) else {
                    return false;
                };
                if request.status != RequestStatus::Approved {
                    tracing::warn!(id, status = %request.status, "submit for non-approved request dropped");
                    return false;
                }
                if request.submission_status == SubmissionStatus::Submitted {
                    return false;
                }
                request.submission_status = SubmissionStatus::Submitted;
                request.submitted_at = Some(at);
                request.remarks = Some(remark);
                true
            }
            LedgerEvent::Rejected { id, remark } => self.reject_one(id, Some(remark)),
            LedgerEvent::RemoteUpsert { request } => self.upsert_guarded(request),
            LedgerEvent::Removed { id } => {
                let before = self.requests.len();
                self.requests.retain(|request| request.id != id);
                self.requests.len() < before
            }
            LedgerEvent::BulkRejected { ids, remark } => {
                let mut changed = false;
                for id in ids {
                    changed |= self.reject_one(id, remark.clone());
                }
                changed
            }
        }
    }

    fn reject_one(&mut self, id: RecordId, remark: Option<String>) -> bool {
        let Some(request) = self.requests.iter_mut().find(|r| r.id == id) else {
            return false;
        };
        if request.status == RequestStatus::Approved
            && request.submission_status == SubmissionStatus::Submitted
        {
            tracing::warn!(id, "reject for submitted request dropped");
            return false;
        }
        if request.status == RequestStatus::Rejected {
            return false;
        }
        request.status = RequestStatus::Rejected;
        request.submission_status = SubmissionStatus::NotRequired;
        if remark.is_some() {
            request.remarks = remark;
        }
        true
    }

    /// Replace-or-insert a server record, refusing regressions out of a
    /// terminal state (duplicate delivery and event/response races make
    /// those arrive in practice).
    fn upsert_guarded(&mut self, incoming: IssueRequest) -> bool {
        match self.requests.iter_mut().find(|r| r.id == incoming.id) {
            Some(existing) => {
                let leaves_terminal = existing.is_terminal()
                    && (incoming.status != existing.status
                        || incoming.effective_submission() != existing.effective_submission());
                if leaves_terminal {
                    tracing::warn!(
                        id = incoming.id,
                        "upsert regressing a terminal request dropped"
                    );
                    return false;
                }
                *existing = incoming;
                true
            }
            None => {
                self.requests.insert(0, incoming);
                true
            }
        }
    }
}

/// Ids a bulk operation acts on: an explicit non-empty selection limits
/// it to that subset, an empty selection means every eligible id in the
/// current view.
pub fn resolve_selection(selection: &[RecordId], eligible: &[RecordId]) -> Vec<RecordId> {
    if selection.is_empty() {
        eligible.to_vec()
    } else {
        selection
            .iter()
            .copied()
            .filter(|id| eligible.contains(id))
            .collect()
    }
}
