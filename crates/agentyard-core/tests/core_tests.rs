//! Integration tests for agentyard-core: error taxonomy, ids, and the
//! workflow/ticket types that cross crate boundaries as serialized state.

use agentyard_core::{
    ApprovalAction, Error, Phase, ProjectId, RecordedError, TaskId, TicketId, WorkflowState,
    WorkflowStatus,
};

#[test]
fn error_codes_are_stable() {
    assert_eq!(Error::invalid_input("x").code(), "INVALID_INPUT");
    assert_eq!(Error::not_found("x").code(), "NOT_FOUND");
    assert_eq!(Error::invalid_state("x").code(), "INVALID_STATE");
    assert_eq!(Error::disallowed_command("rm", "run,stop").code(), "DISALLOWED_COMMAND");
    assert_eq!(Error::Timeout(std::time::Duration::from_secs(1)).code(), "TIMEOUT");
    assert_eq!(Error::Cancelled.code(), "CANCELLED");
}

#[test]
fn recorded_error_carries_the_source_error_code() {
    let err = Error::invalid_state("bad transition");
    let recorded = RecordedError::from_error(&err, true);
    assert_eq!(recorded.code, "INVALID_STATE");
    assert_eq!(recorded.message, err.to_string());
    assert!(recorded.recoverable);
}

#[test]
fn id_types_round_trip_through_json() {
    let id = TaskId::new("task-42");
    let json = serde_json::to_string(&id).unwrap();
    let back: TaskId = serde_json::from_str(&json).unwrap();
    assert_eq!(id, back);
    assert_eq!(format!("{}", id), "task-42");
}

#[test]
fn workflow_state_starts_in_proposal_running() {
    let state = WorkflowState::new(TaskId::new("task-1"), ProjectId::new("proj-1"), "build a widget");
    assert_eq!(state.current_phase, Phase::Proposal);
    assert_eq!(state.status, WorkflowStatus::Running);
    assert!(state.escalation.is_none());
    assert!(state.quality_results.is_none());
}

#[test]
fn workflow_state_serializes_with_snake_case_phase_and_status() {
    let state = WorkflowState::new(TaskId::new("task-1"), ProjectId::new("proj-1"), "x");
    let json = serde_json::to_value(&state).unwrap();
    assert_eq!(json["current_phase"], "proposal");
    assert_eq!(json["status"], "running");
}

#[test]
fn approval_action_variants_round_trip() {
    for action in [
        ApprovalAction::Approve,
        ApprovalAction::Reject,
        ApprovalAction::RequestChanges,
        ApprovalAction::Retry,
        ApprovalAction::Skip,
        ApprovalAction::Abort,
    ] {
        let json = serde_json::to_string(&action).unwrap();
        let back: ApprovalAction = serde_json::from_str(&json).unwrap();
        assert_eq!(action, back);
    }
}

#[test]
fn ticket_id_from_str_and_string_agree() {
    let from_str: TicketId = "proj-0001".into();
    let from_string: TicketId = String::from("proj-0001").into();
    assert_eq!(from_str, from_string);
}
