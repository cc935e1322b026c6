//! Submission review state machine
//!
//! ```text
//! pending -> under_review -> approved -> applied
//!                         \-> rejected
//! ```
//!
//! Every edge points forward; `rejected` and `applied` are terminal.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::errors::{WorkflowError, WorkflowResult};

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    UnderReview,
    Approved,
    Rejected,
    Applied,
}

impl SubmissionStatus {
    /// Statuses that block an identical submission from being filed again
    pub const IN_FLIGHT: [SubmissionStatus; 3] = [
        SubmissionStatus::Pending,
        SubmissionStatus::UnderReview,
        SubmissionStatus::Approved,
    ];

    pub fn can_transition_to(self, next: SubmissionStatus) -> bool {
        use SubmissionStatus::*;
        matches!(
            (self, next),
            (Pending, UnderReview)
                | (UnderReview, Approved)
                | (UnderReview, Rejected)
                | (Approved, Applied)
        )
    }

    /// Check the edge `self -> next`, returning `next` when it exists
    pub fn transition(self, next: SubmissionStatus) -> WorkflowResult<SubmissionStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(WorkflowError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SubmissionStatus::Rejected | SubmissionStatus::Applied)
    }

    pub fn is_in_flight(self) -> bool {
        Self::IN_FLIGHT.contains(&self)
    }
}

/// Reviewer verdict on a submission under review
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

impl ReviewDecision {
    pub fn target_status(self) -> SubmissionStatus {
        match self {
            ReviewDecision::Approve => SubmissionStatus::Approved,
            ReviewDecision::Reject => SubmissionStatus::Rejected,
        }
    }
}
