//! Review state machine for personal documents.
//!
//! ```text
//! pending --approve--> approved
//! pending --reject---> rejected
//! ```
//!
//! Both outcomes are terminal. A rejected document is replaced by deleting it
//! and uploading a new one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::DocumentStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

impl ReviewDecision {
    pub fn target(&self) -> DocumentStatus {
        match self {
            ReviewDecision::Approve => DocumentStatus::Approved,
            ReviewDecision::Reject => DocumentStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("document is already {0}")]
    Terminal(DocumentStatus),
    #[error("document was modified concurrently (expected version {expected}, found {found})")]
    Stale { expected: i32, found: i32 },
}

impl DocumentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DocumentStatus::Pending)
    }

    pub fn apply(self, decision: ReviewDecision) -> Result<DocumentStatus, TransitionError> {
        match self {
            DocumentStatus::Pending => Ok(decision.target()),
            terminal => Err(TransitionError::Terminal(terminal)),
        }
    }
}

/// Column values written by a successful transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewOutcome {
    pub status: DocumentStatus,
    pub reviewer_id: Uuid,
    pub reviewed_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
    pub rejection_reason: Option<String>,
}

/// Validates a review against the current row state and produces the update.
///
/// `expected_version` is the optimistic precondition a reviewer may send; the
/// database write re-checks both status and version so a concurrent writer
/// between this call and the UPDATE still loses.
pub fn review(
    current: DocumentStatus,
    current_version: i32,
    expected_version: Option<i32>,
    decision: ReviewDecision,
    reviewer_id: Uuid,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> Result<ReviewOutcome, TransitionError> {
    if let Some(expected) = expected_version {
        if expected != current_version {
            return Err(TransitionError::Stale {
                expected,
                found: current_version,
            });
        }
    }

    let status = current.apply(decision)?;
    let notes = notes
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());

    Ok(ReviewOutcome {
        status,
        reviewer_id,
        reviewed_at: now,
        approved_at: (status == DocumentStatus::Approved).then_some(now),
        rejection_reason: match status {
            DocumentStatus::Rejected => notes.clone(),
            _ => None,
        },
        review_notes: notes,
    })
}
