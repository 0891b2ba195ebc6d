//! WorkflowEngine — the phase state machine one workflow is driven
//! through: proposal → approval → development → quality_assurance →
//! delivery, with an approval gate and an escalation re-entry path.
//!
//! The development phase spawns one execution task per worker and awaits
//! all of them with `futures::future::join_all` before finalizing —
//! finalization must not run until every per-ticket result has resolved.
//! Progress is checkpointed along the way: an `ExecutionState` is persisted
//! at the start of the run and again after each worker's result lands, so a
//! crash mid-run leaves `runs/<runId>/state.json` reflecting everything
//! that finished rather than nothing at all.

use agentyard_core::{
    ticket::GrandchildTicket, AgentId, ApprovalAction, ApprovalDecision, Error, Escalation,
    ExecutionState, Phase, ProjectId, QualityResults, Result, RunId, RunStatus, TaskId, TicketId,
    TicketStatus, WorkerId, WorkerState, WorkerStatus, WorkerType, WorkflowState, WorkflowStatus,
};
use agentyard_agent::{WorkerAgent, WorkerAgentConfig, WorkerOutcome, WorkerPool};
use agentyard_container::{ContainerRuntime, WorkerContainer, WorkerContainerConfig};
use agentyard_llm::LlmProvider;
use agentyard_store::{StateStore, TicketHierarchy};
use agentyard_tools::ToolRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::manager::Manager;
use crate::quality_gate::{QualityGate, QualityGateConfig, QualityGateResult};
use crate::reviewer::Reviewer;

/// One leaf unit of work handed to the development phase: a grandchild
/// ticket plus the worker type inherited from its parent child ticket.
#[derive(Clone, Debug)]
pub struct DevelopmentUnit {
    pub ticket_id: TicketId,
    pub title: String,
    pub acceptance_criteria: Vec<String>,
    pub worker_type: WorkerType,
}

pub struct WorkflowEngineConfig {
    pub worker_acquire_timeout: Duration,
    pub worker_agent: WorkerAgentConfig,
    /// Wrap each worker in an isolated container for the duration of its
    /// run. Tool calls still dispatch through the host-side `ToolRegistry`
    /// either way — routing tool execution into the container itself is
    /// out of scope here.
    pub use_containers: bool,
    pub container: WorkerContainerConfig,
}

impl Default for WorkflowEngineConfig {
    fn default() -> Self {
        Self {
            worker_acquire_timeout: Duration::from_secs(30),
            worker_agent: WorkerAgentConfig::default(),
            use_containers: false,
            container: WorkerContainerConfig::default(),
        }
    }
}

pub struct WorkflowEngine {
    store: StateStore,
    hierarchy: TicketHierarchy,
    pool: Arc<WorkerPool>,
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    reviewer: Arc<dyn Reviewer>,
    manager: Arc<dyn Manager>,
    runtime: Arc<dyn ContainerRuntime>,
    config: WorkflowEngineConfig,
}

impl WorkflowEngine {
    pub fn new(
        store: StateStore,
        hierarchy: TicketHierarchy,
        pool: Arc<WorkerPool>,
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        reviewer: Arc<dyn Reviewer>,
        manager: Arc<dyn Manager>,
        runtime: Arc<dyn ContainerRuntime>,
        config: WorkflowEngineConfig,
    ) -> Self {
        Self { store, hierarchy, pool, provider, tools, reviewer, manager, runtime, config }
    }

    async fn load(&self, workflow_id: &TaskId) -> Result<WorkflowState> {
        self.store
            .load_workflow_state(workflow_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("workflow {} not found", workflow_id)))
    }

    async fn persist(&self, state: &WorkflowState) -> Result<()> {
        self.store.save_workflow_state(state).await
    }

    /// Creates a fresh `WorkflowState` in the `proposal` phase and persists it.
    pub async fn start(&self, workflow_id: TaskId, project_id: ProjectId, instruction: &str) -> Result<WorkflowState> {
        let state = WorkflowState::new(workflow_id, project_id, instruction);
        self.persist(&state).await?;
        Ok(state)
    }

    /// proposal → approval: decompose via the `Manager`, create the ticket
    /// tree, record an approval entry.
    pub async fn propose(&self, workflow_id: &TaskId) -> Result<WorkflowState> {
        let mut state = self.load(workflow_id).await?;
        if state.current_phase != Phase::Proposal {
            return Err(Error::invalid_state(format!(
                "propose requires phase=proposal, found {:?}",
                state.current_phase
            )));
        }

        self.manager.receive_task(&state.instruction).await?;
        let subtasks = self.manager.decompose_task(&state.instruction).await?;

        let parent = self
            .hierarchy
            .create_parent(state.project_id.as_str(), &state.instruction, &state.instruction)
            .await?;

        for subtask in &subtasks {
            let child = self
                .hierarchy
                .create_child(state.project_id.as_str(), parent.id.as_str(), &subtask.title, subtask.worker_type)
                .await?;
            self.hierarchy
                .create_grandchild(
                    state.project_id.as_str(),
                    child.id.as_str(),
                    &subtask.title,
                    subtask.acceptance_criteria.clone(),
                )
                .await?;
            self.manager.assign_task(subtask).await?;
        }
        self.manager.start_progress_monitoring().await;

        state.current_phase = Phase::Approval;
        state.status = WorkflowStatus::WaitingApproval;
        self.persist(&state).await?;
        info!(workflow_id = %state.workflow_id, "workflow proposed, awaiting approval");
        Ok(state)
    }

    /// Handles an approval decision for whichever gate the workflow is
    /// currently sitting at: the approval-phase gate, the delivery-phase
    /// gate, or (when an escalation is pending) the retry/skip/abort
    /// decision on that escalation.
    pub async fn submit_approval_decision(&self, workflow_id: &TaskId, decision: ApprovalDecision) -> Result<WorkflowState> {
        let mut state = self.load(workflow_id).await?;

        if state.escalation.is_some() {
            return self.handle_escalation_inner(&mut state, decision.action).await;
        }

        match (state.current_phase, decision.action) {
            (Phase::Approval, ApprovalAction::Approve) => {
                state.current_phase = Phase::Development;
                state.status = WorkflowStatus::Running;
            }
            (Phase::Approval, ApprovalAction::Reject) => {
                state.status = WorkflowStatus::Terminated;
            }
            (Phase::Approval, ApprovalAction::RequestChanges) => {
                state.current_phase = Phase::Proposal;
                state.status = WorkflowStatus::Running;
            }
            (Phase::Delivery, ApprovalAction::Approve) => {
                state.status = WorkflowStatus::Completed;
            }
            (Phase::Delivery, ApprovalAction::Reject) => {
                state.status = WorkflowStatus::Terminated;
            }
            (phase, action) => {
                return Err(Error::invalid_state(format!(
                    "approval action {:?} is not valid in phase {:?}",
                    action, phase
                )));
            }
        }

        self.persist(&state).await?;
        Ok(state)
    }

    /// Resolves a pending escalation directly, for callers that already
    /// know one is pending.
    pub async fn handle_escalation(&self, workflow_id: &TaskId, action: ApprovalAction) -> Result<WorkflowState> {
        let mut state = self.load(workflow_id).await?;
        self.handle_escalation_inner(&mut state, action).await
    }

    async fn handle_escalation_inner(&self, state: &mut WorkflowState, action: ApprovalAction) -> Result<WorkflowState> {
        let escalation = state
            .escalation
            .clone()
            .ok_or_else(|| Error::invalid_state("no escalation pending on this workflow".to_string()))?;

        match action {
            ApprovalAction::Retry => {
                self.hierarchy
                    .update_ticket_status(state.project_id.as_str(), escalation.ticket_id.as_str(), TicketStatus::Pending)
                    .await?;
                state.escalation = None;
                state.status = WorkflowStatus::Running;
            }
            ApprovalAction::Skip => {
                self.hierarchy
                    .update_ticket_status(state.project_id.as_str(), escalation.ticket_id.as_str(), TicketStatus::Skipped)
                    .await?;
                self.hierarchy
                    .propagate_status_to_parent(state.project_id.as_str(), escalation.ticket_id.as_str())
                    .await?;
                state.escalation = None;
                state.status = WorkflowStatus::Running;
            }
            ApprovalAction::Abort => {
                state.status = WorkflowStatus::Terminated;
            }
            other => {
                return Err(Error::invalid_state(format!("{:?} is not a valid escalation action", other)));
            }
        }

        self.persist(state).await?;
        Ok(state.clone())
    }

    /// Development phase: acquire a worker per unit, run every conversation
    /// loop concurrently, and await all of them before advancing. A failed
    /// unit raises an escalation rather than aborting in-flight siblings.
    ///
    /// An `ExecutionState` is saved before any worker starts and re-saved
    /// after each one finishes, so `load_execution_state` /
    /// `find_in_progress_executions` can recover a run that crashes
    /// mid-flight instead of losing everything back to the last workflow
    /// checkpoint.
    pub async fn run_development(&self, workflow_id: &TaskId, run_id: &RunId, units: &[DevelopmentUnit]) -> Result<WorkflowState> {
        let mut state = self.load(workflow_id).await?;
        if state.current_phase != Phase::Development {
            return Err(Error::invalid_state(format!(
                "run_development requires phase=development, found {:?}",
                state.current_phase
            )));
        }

        let lead_ticket = units
            .first()
            .map(|u| u.ticket_id.clone())
            .unwrap_or_else(|| TicketId::new(state.project_id.as_str()));
        let mut execution = ExecutionState::new(run_id.clone(), lead_ticket);
        for unit in units {
            execution.worker_states.insert(
                WorkerId::new(unit.ticket_id.as_str()),
                WorkerState { worker_id: WorkerId::new(unit.ticket_id.as_str()), status: WorkerStatus::Working, current_ticket: Some(unit.ticket_id.clone()), iterations: 0 },
            );
        }
        self.store.save_execution_state(&execution).await?;

        let mut tasks = Vec::with_capacity(units.len());
        for unit in units {
            let unit = unit.clone();
            let pool = Arc::clone(&self.pool);
            let provider = Arc::clone(&self.provider);
            let tools = Arc::clone(&self.tools);
            let store = self.store.clone();
            let run_id = run_id.clone();
            let timeout = self.config.worker_acquire_timeout;
            let agent_config = WorkerAgentConfig {
                model: self.config.worker_agent.model.clone(),
                max_iterations: self.config.worker_agent.max_iterations,
                max_tokens: self.config.worker_agent.max_tokens,
            };
            let use_containers = self.config.use_containers;
            let container_config = WorkerContainerConfig {
                image: self.config.container.image.clone(),
                isolation: self.config.container.isolation.clone(),
                results_dir: self.config.container.results_dir.clone(),
                git: self.config.container.git.clone(),
                run_id: Some(run_id.clone()),
                extra_env: self.config.container.extra_env.clone(),
            };
            let runtime = Arc::clone(&self.runtime);

            tasks.push(tokio::spawn(async move {
                let worker_type = worker_type_name(unit.worker_type);
                let worker_id = pool.acquire_worker_by_type(worker_type, timeout).await?;
                let agent_id = AgentId::new(worker_id.as_str());

                let container = if use_containers {
                    let container = WorkerContainer::new(worker_id.clone(), agent_id.clone(), container_config, runtime);
                    container.create().await?;
                    container.start().await?;
                    Some(container)
                } else {
                    None
                };

                let system_prompt = format!(
                    "You are a {} agent working one ticket to completion. \
                     Use the available tools and call task_complete when finished.",
                    worker_type
                );
                let user_prompt = format!(
                    "Ticket: {}\nTitle: {}\nAcceptance criteria:\n{}",
                    unit.ticket_id,
                    unit.title,
                    unit.acceptance_criteria.iter().map(|c| format!("- {}", c)).collect::<Vec<_>>().join("\n")
                );

                let agent = WorkerAgent::new(provider, tools, agent_config);
                let worker_result = agent
                    .run(&system_prompt, &user_prompt, Default::default(), CancellationToken::new())
                    .await;

                // Persist the conversation immediately so a later failure
                // (container teardown, pool release) can never drop it.
                store.save_conversation(&run_id, &agent_id, &worker_result.history).await?;

                if let Some(container) = container {
                    if let Err(e) = container.stop().await {
                        warn!(worker_id = %worker_id, error = %e, "failed to stop worker container");
                    }
                    if let Err(e) = container.destroy(true).await {
                        warn!(worker_id = %worker_id, error = %e, "failed to destroy worker container");
                    }
                }

                pool.release_worker(&worker_id).await?;
                Result::Ok((unit, worker_id, worker_result))
            }));
        }

        let joined = futures::future::join_all(tasks).await;

        let mut any_failed = false;
        let mut failing_ticket: Option<TicketId> = None;
        let mut failure_details = String::new();

        for outcome in joined {
            let result = match outcome {
                Ok(inner) => inner,
                Err(join_err) => {
                    any_failed = true;
                    failure_details = format!("worker task panicked: {}", join_err);
                    continue;
                }
            };

            match result {
                Ok((unit, worker_id, worker_result)) => {
                    let agent_id = AgentId::new(worker_id.as_str());
                    execution.conversation_histories.insert(agent_id, worker_result.history.clone());

                    let new_status = match worker_result.outcome {
                        WorkerOutcome::Completed => TicketStatus::ReviewRequested,
                        WorkerOutcome::Partial => TicketStatus::Failed,
                    };
                    let worker_status = match worker_result.outcome {
                        WorkerOutcome::Completed => WorkerStatus::Completed,
                        WorkerOutcome::Partial => WorkerStatus::Partial,
                    };
                    if let Some(ws) = execution.worker_states.get_mut(&WorkerId::new(unit.ticket_id.as_str())) {
                        ws.status = worker_status;
                        ws.iterations = worker_result.iterations;
                    }

                    self.hierarchy
                        .update_ticket_status(state.project_id.as_str(), unit.ticket_id.as_str(), new_status)
                        .await?;
                    self.hierarchy
                        .propagate_status_to_parent(state.project_id.as_str(), unit.ticket_id.as_str())
                        .await?;

                    if matches!(worker_result.outcome, WorkerOutcome::Partial) {
                        any_failed = true;
                        failing_ticket.get_or_insert_with(|| unit.ticket_id.clone());
                        failure_details = format!(
                            "ticket {} did not complete within {} iterations",
                            unit.ticket_id, worker_result.iterations
                        );
                    }
                }
                Err(e) => {
                    any_failed = true;
                    failure_details = e.to_string();
                }
            }
        }

        execution.status = if any_failed { RunStatus::Failed } else { RunStatus::Completed };
        execution.touch();
        self.store.save_execution_state(&execution).await?;

        if any_failed {
            warn!(workflow_id = %state.workflow_id, "development phase raised an escalation");
            state.escalation = Some(Escalation {
                ticket_id: failing_ticket.unwrap_or_else(|| TicketId::new(state.project_id.as_str())),
                failure_details,
                created_at: chrono::Utc::now(),
            });
            state.status = WorkflowStatus::WaitingApproval;
        } else {
            state.current_phase = Phase::QualityAssurance;
            state.status = WorkflowStatus::Running;
        }

        self.persist(&state).await?;
        Ok(state)
    }

    /// Quality-assurance phase: run the gate per changed subtree; a lint
    /// failure routes the offending tickets back to development.
    pub async fn run_quality_assurance(
        &self,
        workflow_id: &TaskId,
        run_id: &RunId,
        gate_config: QualityGateConfig,
        tickets: &[GrandchildTicket],
    ) -> Result<(WorkflowState, Vec<QualityGateResult>)> {
        let mut state = self.load(workflow_id).await?;
        if state.current_phase != Phase::QualityAssurance {
            return Err(Error::invalid_state(format!(
                "run_quality_assurance requires phase=quality_assurance, found {:?}",
                state.current_phase
            )));
        }

        let gate = QualityGate::new(gate_config);
        let mut results = Vec::with_capacity(tickets.len());
        let mut lint_failed_tickets = Vec::new();

        for ticket in tickets {
            let result = gate.execute(run_id).await;
            self.store.save_quality_result(run_id, &result).await?;
            if result.lint.executed && !result.lint.passed {
                lint_failed_tickets.push(ticket.id.clone());
            }
            results.push(result);
        }

        if !lint_failed_tickets.is_empty() {
            for ticket_id in &lint_failed_tickets {
                self.hierarchy
                    .update_ticket_status(state.project_id.as_str(), ticket_id.as_str(), TicketStatus::RevisionRequired)
                    .await?;
            }
            state.current_phase = Phase::Development;
            state.status = WorkflowStatus::Running;
            state.quality_results = Some(aggregate_quality(&results));
            self.persist(&state).await?;
            return Ok((state, results));
        }

        let mut needs_revision = Vec::new();
        for ticket in tickets {
            let verdict = self.reviewer.review(&ticket.title, &ticket.artifacts).await;
            if matches!(verdict, agentyard_core::ReviewVerdict::NeedsRevision) {
                needs_revision.push(ticket.id.clone());
            }
        }

        state.quality_results = Some(aggregate_quality(&results));

        if let Some(ticket_id) = needs_revision.into_iter().next() {
            state.escalation = Some(Escalation {
                ticket_id,
                failure_details: "reviewer returned NEEDS_REVISION".to_string(),
                created_at: chrono::Utc::now(),
            });
            state.status = WorkflowStatus::WaitingApproval;
        } else {
            for ticket in tickets {
                self.hierarchy
                    .update_ticket_status(state.project_id.as_str(), ticket.id.as_str(), TicketStatus::Completed)
                    .await?;
                self.hierarchy
                    .propagate_status_to_parent(state.project_id.as_str(), ticket.id.as_str())
                    .await?;
            }
            state.current_phase = Phase::Delivery;
            state.status = WorkflowStatus::WaitingApproval;
        }

        self.persist(&state).await?;
        Ok((state, results))
    }
}

fn worker_type_name(worker_type: WorkerType) -> &'static str {
    match worker_type {
        WorkerType::Research => "research",
        WorkerType::Design => "design",
        WorkerType::Developer => "developer",
        WorkerType::Test => "test",
        WorkerType::Reviewer => "reviewer",
        WorkerType::Designer => "designer",
    }
}

fn aggregate_quality(results: &[QualityGateResult]) -> QualityResults {
    let lint_passed = results.iter().all(|r| !r.lint.executed || r.lint.passed);
    let test_passed = results.iter().all(|r| !r.test.executed || r.test.passed);
    QualityResults { lint_passed, test_passed, overall: results.iter().all(|r| r.success) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::SingleTaskManager;
    use crate::reviewer::AlwaysApprove;
    use agentyard_agent::WorkerPoolConfig;
    use agentyard_llm::{ScriptedProvider, ScriptedTurn};

    fn engine(dir: &std::path::Path, provider: Arc<dyn LlmProvider>) -> WorkflowEngine {
        let store = StateStore::new(dir);
        let hierarchy = TicketHierarchy::new(store.clone());
        let pool = Arc::new(WorkerPool::new(WorkerPoolConfig::default()));
        let tools = Arc::new(agentyard_tools::create_default_registry(dir));
        let runtime = Arc::new(agentyard_container::BypassValidationRuntime::new(
            agentyard_core::config::ContainerRuntimeMode::Rootless,
        ));
        WorkflowEngine::new(
            store,
            hierarchy,
            pool,
            provider,
            tools,
            Arc::new(AlwaysApprove),
            Arc::new(SingleTaskManager),
            runtime,
            WorkflowEngineConfig::default(),
        )
    }

    fn completing_provider() -> Arc<dyn LlmProvider> {
        Arc::new(ScriptedProvider::new(vec![ScriptedTurn::ToolCall {
            id: "t1".to_string(),
            name: "task_complete".to_string(),
            arguments: r#"{"summary":"done"}"#.to_string(),
        }]))
    }

    #[tokio::test]
    async fn propose_creates_ticket_tree_and_waits_for_approval() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path(), completing_provider());
        engine
            .start(TaskId::new("task-1"), ProjectId::new("proj-001"), "build feature X")
            .await
            .unwrap();

        let state = engine.propose(&TaskId::new("task-1")).await.unwrap();
        assert_eq!(state.current_phase, Phase::Approval);
        assert_eq!(state.status, WorkflowStatus::WaitingApproval);
    }

    #[tokio::test]
    async fn approve_advances_to_development_reject_terminates() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path(), completing_provider());
        engine.start(TaskId::new("task-1"), ProjectId::new("proj"), "x").await.unwrap();
        engine.propose(&TaskId::new("task-1")).await.unwrap();

        let approved = engine
            .submit_approval_decision(
                &TaskId::new("task-1"),
                ApprovalDecision { action: ApprovalAction::Approve, decided_by: "qa".to_string(), decided_at: chrono::Utc::now(), reason: None },
            )
            .await
            .unwrap();
        assert_eq!(approved.current_phase, Phase::Development);
        assert_eq!(approved.status, WorkflowStatus::Running);
    }

    #[tokio::test]
    async fn reject_during_approval_terminates_workflow() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path(), completing_provider());
        engine.start(TaskId::new("task-2"), ProjectId::new("proj"), "x").await.unwrap();
        engine.propose(&TaskId::new("task-2")).await.unwrap();

        let rejected = engine
            .submit_approval_decision(
                &TaskId::new("task-2"),
                ApprovalDecision { action: ApprovalAction::Reject, decided_by: "qa".to_string(), decided_at: chrono::Utc::now(), reason: None },
            )
            .await
            .unwrap();
        assert_eq!(rejected.status, WorkflowStatus::Terminated);
    }

    #[tokio::test]
    async fn request_changes_returns_to_proposal() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path(), completing_provider());
        engine.start(TaskId::new("task-3"), ProjectId::new("proj"), "x").await.unwrap();
        engine.propose(&TaskId::new("task-3")).await.unwrap();

        let state = engine
            .submit_approval_decision(
                &TaskId::new("task-3"),
                ApprovalDecision { action: ApprovalAction::RequestChanges, decided_by: "qa".to_string(), decided_at: chrono::Utc::now(), reason: None },
            )
            .await
            .unwrap();
        assert_eq!(state.current_phase, Phase::Proposal);
        assert_eq!(state.status, WorkflowStatus::Running);
    }

    #[tokio::test]
    async fn development_completes_all_units_and_advances_to_quality_assurance() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path(), completing_provider());
        let workflow_id = TaskId::new("task-4");
        engine.start(workflow_id.clone(), ProjectId::new("proj"), "x").await.unwrap();
        engine.propose(&workflow_id).await.unwrap();
        engine
            .submit_approval_decision(
                &workflow_id,
                ApprovalDecision { action: ApprovalAction::Approve, decided_by: "qa".to_string(), decided_at: chrono::Utc::now(), reason: None },
            )
            .await
            .unwrap();

        let units = vec![DevelopmentUnit {
            ticket_id: TicketId::new("proj-0001-01-001"),
            title: "do it".to_string(),
            acceptance_criteria: vec!["works".to_string()],
            worker_type: WorkerType::Developer,
        }];

        let state = engine.run_development(&workflow_id, &RunId::new("run-4"), &units).await.unwrap();
        assert_eq!(state.current_phase, Phase::QualityAssurance);
        assert_eq!(state.status, WorkflowStatus::Running);
        assert!(state.escalation.is_none());
    }

    #[tokio::test]
    async fn development_iteration_cap_raises_escalation() {
        let dir = tempfile::tempdir().unwrap();
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![ScriptedTurn::ToolCall {
            id: "t1".to_string(),
            name: "git_status".to_string(),
            arguments: "{}".to_string(),
        }]));
        let mut engine = engine(dir.path(), provider);
        engine.config.worker_agent.max_iterations = 1;

        let workflow_id = TaskId::new("task-5");
        engine.start(workflow_id.clone(), ProjectId::new("proj"), "x").await.unwrap();
        engine.propose(&workflow_id).await.unwrap();
        engine
            .submit_approval_decision(
                &workflow_id,
                ApprovalDecision { action: ApprovalAction::Approve, decided_by: "qa".to_string(), decided_at: chrono::Utc::now(), reason: None },
            )
            .await
            .unwrap();

        let units = vec![DevelopmentUnit {
            ticket_id: TicketId::new("proj-0001-01-001"),
            title: "do it".to_string(),
            acceptance_criteria: vec![],
            worker_type: WorkerType::Developer,
        }];

        let state = engine.run_development(&workflow_id, &RunId::new("run-5"), &units).await.unwrap();
        assert!(state.escalation.is_some());
        assert_eq!(state.status, WorkflowStatus::WaitingApproval);
    }

    #[tokio::test]
    async fn escalation_retry_clears_escalation_and_resumes_running() {
        let dir = tempfile::tempdir().unwrap();
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![ScriptedTurn::ToolCall {
            id: "t1".to_string(),
            name: "git_status".to_string(),
            arguments: "{}".to_string(),
        }]));
        let mut engine = engine(dir.path(), provider);
        engine.config.worker_agent.max_iterations = 1;

        let workflow_id = TaskId::new("task-6");
        engine.start(workflow_id.clone(), ProjectId::new("proj"), "x").await.unwrap();
        engine.propose(&workflow_id).await.unwrap();
        engine
            .submit_approval_decision(
                &workflow_id,
                ApprovalDecision { action: ApprovalAction::Approve, decided_by: "qa".to_string(), decided_at: chrono::Utc::now(), reason: None },
            )
            .await
            .unwrap();
        let units = vec![DevelopmentUnit {
            ticket_id: TicketId::new("proj-0001-01-001"),
            title: "do it".to_string(),
            acceptance_criteria: vec![],
            worker_type: WorkerType::Developer,
        }];
        engine.run_development(&workflow_id, &RunId::new("run-6"), &units).await.unwrap();

        let state = engine.handle_escalation(&workflow_id, ApprovalAction::Retry).await.unwrap();
        assert!(state.escalation.is_none());
        assert_eq!(state.status, WorkflowStatus::Running);
    }

    #[tokio::test]
    async fn escalation_abort_terminates_workflow() {
        let dir = tempfile::tempdir().unwrap();
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![ScriptedTurn::ToolCall {
            id: "t1".to_string(),
            name: "git_status".to_string(),
            arguments: "{}".to_string(),
        }]));
        let mut engine = engine(dir.path(), provider);
        engine.config.worker_agent.max_iterations = 1;

        let workflow_id = TaskId::new("task-7");
        engine.start(workflow_id.clone(), ProjectId::new("proj"), "x").await.unwrap();
        engine.propose(&workflow_id).await.unwrap();
        engine
            .submit_approval_decision(
                &workflow_id,
                ApprovalDecision { action: ApprovalAction::Approve, decided_by: "qa".to_string(), decided_at: chrono::Utc::now(), reason: None },
            )
            .await
            .unwrap();
        let units = vec![DevelopmentUnit {
            ticket_id: TicketId::new("proj-0001-01-001"),
            title: "do it".to_string(),
            acceptance_criteria: vec![],
            worker_type: WorkerType::Developer,
        }];
        engine.run_development(&workflow_id, &RunId::new("run-7"), &units).await.unwrap();

        let state = engine.handle_escalation(&workflow_id, ApprovalAction::Abort).await.unwrap();
        assert_eq!(state.status, WorkflowStatus::Terminated);
    }
}
