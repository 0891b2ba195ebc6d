//! WorkflowState — the phase/status pair a `WorkflowEngine` drives.

use crate::ids::{ProjectId, TaskId, TicketId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Proposal,
    Approval,
    Development,
    QualityAssurance,
    Delivery,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Running,
    WaitingApproval,
    Completed,
    Terminated,
    Failed,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubtaskProgress {
    pub ticket_id: TicketId,
    pub status: crate::ticket::TicketStatus,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Progress {
    pub subtasks: Vec<SubtaskProgress>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QualityResults {
    pub lint_passed: bool,
    pub test_passed: bool,
    pub overall: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Escalation {
    pub ticket_id: TicketId,
    pub failure_details: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowState {
    pub workflow_id: TaskId,
    pub project_id: ProjectId,
    pub instruction: String,
    pub current_phase: Phase,
    pub status: WorkflowStatus,
    pub progress: Progress,
    pub quality_results: Option<QualityResults>,
    pub escalation: Option<Escalation>,
}

impl WorkflowState {
    pub fn new(workflow_id: TaskId, project_id: ProjectId, instruction: impl Into<String>) -> Self {
        Self {
            workflow_id,
            project_id,
            instruction: instruction.into(),
            current_phase: Phase::Proposal,
            status: WorkflowStatus::Running,
            progress: Progress::default(),
            quality_results: None,
            escalation: None,
        }
    }
}

/// An approval decision submitted against a pending gate.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalAction {
    Approve,
    Reject,
    RequestChanges,
    Retry,
    Skip,
    Abort,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub action: ApprovalAction,
    pub decided_by: String,
    pub decided_at: chrono::DateTime<chrono::Utc>,
    pub reason: Option<String>,
}
