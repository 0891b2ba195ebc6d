//! Ticket data model — the three-level tree.

use crate::ids::TicketId;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Pending,
    Decomposing,
    InProgress,
    ReviewRequested,
    RevisionRequired,
    Completed,
    Failed,
    PrCreated,
    /// Set by `WorkflowEngine::handle_escalation(Skip)` so a skipped
    /// grandchild stops blocking propagation without being misreported as
    /// `Completed`.
    Skipped,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkerType {
    Research,
    Design,
    Developer,
    Test,
    Reviewer,
    Designer,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReviewResult {
    pub verdict: ReviewVerdict,
    pub notes: String,
    pub reviewed_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReviewVerdict {
    Approved,
    NeedsRevision,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GrandchildTicket {
    pub id: TicketId,
    pub title: String,
    pub status: TicketStatus,
    pub acceptance_criteria: Vec<String>,
    pub assignee: Option<String>,
    pub git_branch: Option<String>,
    pub artifacts: Vec<String>,
    pub review_result: Option<ReviewResult>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChildTicket {
    pub id: TicketId,
    pub title: String,
    pub status: TicketStatus,
    pub worker_type: WorkerType,
    pub children: Vec<GrandchildTicket>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParentTicket {
    pub id: TicketId,
    pub title: String,
    pub instruction: String,
    pub status: TicketStatus,
    pub children: Vec<ChildTicket>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Snapshot of a whole project's hierarchy, as written to
/// `tickets/<projectId>.json`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TicketTree {
    pub project_id: String,
    pub parent_tickets: Vec<ParentTicket>,
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

/// The status-propagation rule: derive a parent's status from its children.
/// Pure function so it can be tested (and reused) independent of any store
/// or tree-walking code. Returns `None` when no rule applies (an empty
/// child list never changes the parent).
pub fn derive_parent_status(children: &[TicketStatus]) -> Option<TicketStatus> {
    if children.is_empty() {
        return None;
    }
    if children.iter().all(|s| *s == TicketStatus::Completed) {
        return Some(TicketStatus::Completed);
    }
    if children.iter().any(|s| *s == TicketStatus::Failed) {
        return Some(TicketStatus::Failed);
    }
    if children
        .iter()
        .any(|s| matches!(s, TicketStatus::InProgress | TicketStatus::ReviewRequested))
    {
        return Some(TicketStatus::InProgress);
    }
    if children.iter().any(|s| *s == TicketStatus::Decomposing) {
        return Some(TicketStatus::Decomposing);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use TicketStatus::*;

    #[test]
    fn all_completed_propagates_completed() {
        assert_eq!(derive_parent_status(&[Completed, Completed]), Some(Completed));
    }

    #[test]
    fn any_failed_propagates_failed_even_with_completed_siblings() {
        assert_eq!(derive_parent_status(&[Completed, Failed]), Some(Failed));
    }

    #[test]
    fn in_progress_or_review_requested_propagates_in_progress() {
        assert_eq!(derive_parent_status(&[Pending, InProgress]), Some(InProgress));
        assert_eq!(
            derive_parent_status(&[Completed, ReviewRequested]),
            Some(InProgress)
        );
    }

    #[test]
    fn decomposing_propagates_when_nothing_higher_priority() {
        assert_eq!(derive_parent_status(&[Pending, Decomposing]), Some(Decomposing));
    }

    #[test]
    fn otherwise_no_change() {
        assert_eq!(derive_parent_status(&[Pending, Pending]), None);
        assert_eq!(derive_parent_status(&[]), None);
    }

    #[test]
    fn priority_order_failed_beats_in_progress_beats_decomposing() {
        assert_eq!(derive_parent_status(&[Failed, InProgress, Decomposing]), Some(Failed));
        assert_eq!(
            derive_parent_status(&[InProgress, Decomposing]),
            Some(InProgress)
        );
    }
}
