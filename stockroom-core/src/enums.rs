//! Enum types for stockroom entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of an issue request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            other => Err(format!("unknown request status: {}", other)),
        }
    }
}

/// Submission state of an approved request.
///
/// Only meaningful while the request status is `Approved`; pending and
/// rejected requests always report `NotRequired` through
/// [`crate::IssueRequest::effective_submission`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    #[default]
    NotRequired,
    Pending,
    Submitted,
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubmissionStatus::NotRequired => "not_required",
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Submitted => "submitted",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for SubmissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_required" => Ok(SubmissionStatus::NotRequired),
            "pending" => Ok(SubmissionStatus::Pending),
            "submitted" => Ok(SubmissionStatus::Submitted),
            other => Err(format!("unknown submission status: {}", other)),
        }
    }
}

/// Tab selection for request list views.
///
/// `Approved` and `Submitted` partition the approved requests: a request
/// whose submission state is `Submitted` or `NotRequired` belongs to the
/// submitted tab, every other approved request to the approved tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTab {
    Pending,
    Approved,
    Submitted,
    Rejected,
}

impl StatusTab {
    pub fn all() -> [StatusTab; 4] {
        [
            StatusTab::Pending,
            StatusTab::Approved,
            StatusTab::Submitted,
            StatusTab::Rejected,
        ]
    }
}
