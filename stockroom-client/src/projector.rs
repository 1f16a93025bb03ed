//! Derived views over the authoritative request collection.
//!
//! Pure functions, recomputed on every call; no view is ever stored as
//! a second source of truth. Tab semantics: the approved tab holds
//! approved requests still awaiting submission, the submitted tab holds
//! the approved complement (submitted or submission-not-required).

use std::collections::{HashMap, HashSet};
use stockroom_core::{
    IssueRequest, RecordId, RequestStatus, RequesterRef, StatusTab, SubmissionStatus, Timestamp,
};

/// Requests belonging to one tab, in collection order.
pub fn filter_tab<'a>(requests: &'a [IssueRequest], tab: StatusTab) -> Vec<&'a IssueRequest> {
    requests
        .iter()
        .filter(|request| match tab {
            StatusTab::Pending => request.status == RequestStatus::Pending,
            StatusTab::Rejected => request.status == RequestStatus::Rejected,
            StatusTab::Approved => {
                request.status == RequestStatus::Approved
                    && !matches!(
                        request.effective_submission(),
                        SubmissionStatus::Submitted | SubmissionStatus::NotRequired
                    )
            }
            StatusTab::Submitted => {
                request.status == RequestStatus::Approved
                    && matches!(
                        request.effective_submission(),
                        SubmissionStatus::Submitted | SubmissionStatus::NotRequired
                    )
            }
        })
        .collect()
}

/// One requester's slice of the collection.
#[derive(Debug, Clone, PartialEq)]
pub struct RequesterGroup {
    pub requester: RequesterRef,
    pub count: usize,
    /// Most recent activity across the group; drives the default sort.
    pub latest_activity: Timestamp,
    /// Remark of the most recently active request that carries one.
    pub last_remark: Option<String>,
    /// Driven by the message-event stream, not by the requests.
    pub unread: bool,
}

/// Group requests by requester, newest activity first.
pub fn group_by_requester(
    requests: &[IssueRequest],
    unread: &HashSet<RecordId>,
) -> Vec<RequesterGroup> {
    let mut groups: HashMap<RecordId, RequesterGroup> = HashMap::new();
    let mut remark_activity: HashMap<RecordId, Timestamp> = HashMap::new();

    for request in requests {
        let activity = last_activity(request);
        let group = groups
            .entry(request.requester.id)
            .or_insert_with(|| RequesterGroup {
                requester: request.requester.clone(),
                count: 0,
                latest_activity: activity,
                last_remark: None,
                unread: unread.contains(&request.requester.id),
            });
        group.count += 1;
        if activity > group.latest_activity {
            group.latest_activity = activity;
        }
        if let Some(remark) = &request.remarks {
            let newer = remark_activity
                .get(&request.requester.id)
                .map(|&prev| activity > prev)
                .unwrap_or(true);
            if newer {
                remark_activity.insert(request.requester.id, activity);
                group.last_remark = Some(remark.clone());
            }
        }
    }

    let mut result: Vec<RequesterGroup> = groups.into_values().collect();
    result.sort_by(|a, b| b.latest_activity.cmp(&a.latest_activity));
    result
}

fn last_activity(request: &IssueRequest) -> Timestamp {
    let mut latest = request.created_at;
    for candidate in [request.approved_at, request.submitted_at] {
        if let Some(at) = candidate {
            if at > latest {
                latest = at;
            }
        }
    }
    latest
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use stockroom_core::ItemRef;

    fn request(
        id: RecordId,
        requester_id: RecordId,
        status: RequestStatus,
        submission: SubmissionStatus,
    ) -> IssueRequest {
        IssueRequest {
            id,
            item: ItemRef {
                id: 1,
                name: "Power supply".to_string(),
                consumable: false,
            },
            requester: RequesterRef {
                id: requester_id,
                name: format!("requester-{}", requester_id),
            },
            quantity: 1,
            status,
            submission_status: submission,
            created_at: Utc::now(),
            approved_at: None,
            return_by: None,
            submitted_at: None,
            remarks: None,
        }
    }

    #[test]
    fn test_tab_partition_of_approved_requests() {
        let requests = vec![
            request(1, 1, RequestStatus::Pending, SubmissionStatus::NotRequired),
            request(2, 1, RequestStatus::Approved, SubmissionStatus::Pending),
            request(3, 1, RequestStatus::Approved, SubmissionStatus::Submitted),
            request(4, 1, RequestStatus::Approved, SubmissionStatus::NotRequired),
            request(5, 1, RequestStatus::Rejected, SubmissionStatus::NotRequired),
        ];

        let ids = |tab| -> Vec<RecordId> {
            filter_tab(&requests, tab).iter().map(|r| r.id).collect()
        };

        assert_eq!(ids(StatusTab::Pending), vec![1]);
        // Awaiting submission only.
        assert_eq!(ids(StatusTab::Approved), vec![2]);
        // Submitted tab is the complement: submitted or not required.
        assert_eq!(ids(StatusTab::Submitted), vec![3, 4]);
        assert_eq!(ids(StatusTab::Rejected), vec![5]);
    }

    #[test]
    fn test_tabs_ignore_stale_submission_state_on_non_approved() {
        // A rejected request with a leftover submitted marker must not
        // appear in the submitted tab.
        let requests = vec![request(
            1,
            1,
            RequestStatus::Rejected,
            SubmissionStatus::Submitted,
        )];
        assert!(filter_tab(&requests, StatusTab::Submitted).is_empty());
        assert_eq!(filter_tab(&requests, StatusTab::Rejected).len(), 1);
    }

    #[test]
    fn test_group_counts_and_sort() {
        let now = Utc::now();
        let mut a1 = request(1, 1, RequestStatus::Pending, SubmissionStatus::NotRequired);
        a1.created_at = now - Duration::hours(2);
        let mut a2 = request(2, 1, RequestStatus::Pending, SubmissionStatus::NotRequired);
        a2.created_at = now - Duration::hours(1);
        let mut b1 = request(3, 2, RequestStatus::Pending, SubmissionStatus::NotRequired);
        b1.created_at = now;

        let groups = group_by_requester(&[a1, a2, b1], &HashSet::new());
        assert_eq!(groups.len(), 2);
        // Requester 2 has the newest activity and sorts first.
        assert_eq!(groups[0].requester.id, 2);
        assert_eq!(groups[0].count, 1);
        assert_eq!(groups[1].requester.id, 1);
        assert_eq!(groups[1].count, 2);
    }

    #[test]
    fn test_group_latest_activity_considers_transitions() {
        let now = Utc::now();
        let mut old_created = request(1, 1, RequestStatus::Approved, SubmissionStatus::Pending);
        old_created.created_at = now - Duration::days(3);
        old_created.approved_at = Some(now);

        let groups = group_by_requester(&[old_created], &HashSet::new());
        assert_eq!(groups[0].latest_activity, now);
    }

    #[test]
    fn test_group_last_remark_is_most_recent() {
        let now = Utc::now();
        let mut older = request(1, 1, RequestStatus::Rejected, SubmissionStatus::NotRequired);
        older.created_at = now - Duration::hours(2);
        older.remarks = Some("out of stock".to_string());
        let mut newer = request(2, 1, RequestStatus::Approved, SubmissionStatus::Pending);
        newer.created_at = now;
        newer.remarks = Some("return in a week".to_string());
        let mut no_remark = request(3, 1, RequestStatus::Pending, SubmissionStatus::NotRequired);
        no_remark.created_at = now + Duration::minutes(5);

        let groups = group_by_requester(&[older, newer, no_remark], &HashSet::new());
        assert_eq!(groups[0].last_remark.as_deref(), Some("return in a week"));
    }

    #[test]
    fn test_group_unread_flag_from_message_set() {
        let requests = vec![
            request(1, 1, RequestStatus::Pending, SubmissionStatus::NotRequired),
            request(2, 2, RequestStatus::Pending, SubmissionStatus::NotRequired),
        ];
        let unread: HashSet<RecordId> = [2].into_iter().collect();
        let groups = group_by_requester(&requests, &unread);
        let by_id: HashMap<RecordId, bool> = groups
            .iter()
            .map(|g| (g.requester.id, g.unread))
            .collect();
        assert!(!by_id[&1]);
        assert!(by_id[&2]);
    }
}
