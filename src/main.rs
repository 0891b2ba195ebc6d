//! agentyard — autonomous agent orchestration engine CLI.
//!
//! Each subcommand performs one step of a workflow's phase state machine
//! and exits; the workflow's state lives on disk under `--base`, so a
//! long-running deployment is just repeated invocations (or a thin service
//! wrapping the same `agentyard-workflow` types).
//!
//! Usage:
//!   agentyard submit --project P --instruction "..."   → proposes and returns a workflow id
//!   agentyard approve --workflow T --action approve     → advance the approval/delivery gate
//!   agentyard develop --workflow T --run R              → drive the development phase
//!   agentyard qa --workflow T --run R                   → run the quality-assurance phase
//!   agentyard status --workflow T                       → print the current WorkflowState
//!   agentyard pause | resume | emergency-stop           → global control

use agentyard_agent::{WorkerPool, WorkerPoolConfig};
use agentyard_core::{ApprovalAction, ApprovalDecision, ProjectId, TaskId, TicketStatus};
use agentyard_llm::{AnthropicProvider, LlmProvider, ScriptedProvider, ScriptedTurn};
use agentyard_store::{StateStore, TicketHierarchy};
use agentyard_workflow::{
    AlwaysApprove, DevelopmentUnit, Orchestrator, SingleTaskManager, WorkflowEngine, WorkflowEngineConfig,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "agentyard", about = "Autonomous agent orchestration engine", version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Root directory for persisted state (tickets/, runs/, config.json)
    #[arg(long, default_value = "runtime/state", global = true)]
    base: PathBuf,

    /// Use the scripted (non-network) LLM provider instead of Anthropic.
    /// Useful offline and in CI; a real deployment omits this.
    #[arg(long, global = true, default_value_t = false)]
    scripted: bool,

    /// Write logs to a file in addition to stderr.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Wrap each worker in a container for the duration of its run.
    #[arg(long, global = true, default_value_t = false)]
    use_containers: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Submit {
        #[arg(long)]
        project: String,
        #[arg(long)]
        instruction: String,
    },
    Approve {
        #[arg(long)]
        workflow: String,
        #[arg(long, value_enum)]
        action: CliApprovalAction,
        #[arg(long, default_value = "cli")]
        by: String,
        #[arg(long)]
        reason: Option<String>,
    },
    Develop {
        #[arg(long)]
        workflow: String,
        #[arg(long)]
        run: String,
    },
    Qa {
        #[arg(long)]
        workflow: String,
        #[arg(long)]
        run: String,
    },
    Status {
        #[arg(long)]
        workflow: String,
    },
    Pause,
    Resume,
    EmergencyStop,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum CliApprovalAction {
    Approve,
    Reject,
    RequestChanges,
    Retry,
    Skip,
    Abort,
}

impl From<CliApprovalAction> for ApprovalAction {
    fn from(a: CliApprovalAction) -> Self {
        match a {
            CliApprovalAction::Approve => ApprovalAction::Approve,
            CliApprovalAction::Reject => ApprovalAction::Reject,
            CliApprovalAction::RequestChanges => ApprovalAction::RequestChanges,
            CliApprovalAction::Retry => ApprovalAction::Retry,
            CliApprovalAction::Skip => ApprovalAction::Skip,
            CliApprovalAction::Abort => ApprovalAction::Abort,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_file.as_deref());

    let store = StateStore::new(&cli.base);
    let hierarchy = TicketHierarchy::new(store.clone());
    let config = store.load_config().await?;
    if let Err(msg) = config.validate() {
        anyhow::bail!("invalid config.json: {msg}");
    }

    let pool = Arc::new(WorkerPool::new(WorkerPoolConfig {
        max_workers: config.max_concurrent_workers,
        use_containers: cli.use_containers,
        ..Default::default()
    }));
    let tools = Arc::new(agentyard_tools::create_default_registry(&cli.base));
    let container_runtime: Arc<dyn agentyard_container::ContainerRuntime> =
        agentyard_container::build_runtime(config.container_runtime, config.allowed_docker_commands.clone()).into();
    let provider: Arc<dyn LlmProvider> = if cli.scripted {
        Arc::new(ScriptedProvider::new(vec![ScriptedTurn::ToolCall {
            id: "scripted-1".to_string(),
            name: "task_complete".to_string(),
            arguments: r#"{"summary":"done"}"#.to_string(),
        }]))
    } else {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| anyhow::anyhow!("ANTHROPIC_API_KEY not set (or pass --scripted)"))?;
        Arc::new(AnthropicProvider::new(api_key))
    };

    let engine = Arc::new(WorkflowEngine::new(
        store.clone(),
        hierarchy.clone(),
        Arc::clone(&pool),
        provider,
        tools,
        Arc::new(AlwaysApprove),
        Arc::new(SingleTaskManager),
        container_runtime,
        WorkflowEngineConfig { use_containers: cli.use_containers, ..Default::default() },
    ));
    let orchestrator = Orchestrator::new(store.clone(), Arc::clone(&engine));

    match cli.command {
        Commands::Submit { project, instruction } => {
            let workflow_id = orchestrator.submit_task(&instruction, ProjectId::new(project)).await?;
            println!("{workflow_id}");
        }
        Commands::Approve { workflow, action, by, reason } => {
            let decision = ApprovalDecision { action: action.into(), decided_by: by, decided_at: chrono::Utc::now(), reason };
            let state = engine.submit_approval_decision(&TaskId::new(workflow), decision).await?;
            print_state(&state);
        }
        Commands::Develop { workflow, run } => {
            let units = collect_development_units(&hierarchy, &store, &TaskId::new(workflow.clone())).await?;
            let state = engine.run_development(&TaskId::new(workflow), &agentyard_core::RunId::new(run), &units).await?;
            print_state(&state);
        }
        Commands::Qa { workflow, run } => {
            let tickets = collect_review_ready(&hierarchy, &store, &TaskId::new(workflow.clone())).await?;
            let gate_config = agentyard_workflow::QualityGateConfig { workspace_root: cli.base.clone(), ..Default::default() };
            let (state, results) = engine
                .run_quality_assurance(&TaskId::new(workflow), &agentyard_core::RunId::new(run), gate_config, &tickets)
                .await?;
            print_state(&state);
            for r in results {
                println!("  lint={} test={} overall={}", r.lint.passed, r.test.passed, r.success);
            }
        }
        Commands::Status { workflow } => {
            let state = store
                .load_workflow_state(&TaskId::new(workflow))
                .await?
                .ok_or_else(|| anyhow::anyhow!("workflow not found"))?;
            print_state(&state);
        }
        Commands::Pause => {
            orchestrator.pause_all_agents().await?;
            println!("paused");
        }
        Commands::Resume => {
            orchestrator.resume_all_agents().await?;
            println!("resumed");
        }
        Commands::EmergencyStop => {
            orchestrator.emergency_stop().await?;
            println!("emergency stopped");
        }
    }

    Ok(())
}

fn print_state(state: &agentyard_core::WorkflowState) {
    println!("phase={:?} status={:?}", state.current_phase, state.status);
    if let Some(escalation) = &state.escalation {
        println!("escalation: ticket={} details={}", escalation.ticket_id, escalation.failure_details);
    }
}

/// The workflow only records its project id on disk; the ticket tree is
/// the source of truth for which grandchildren are ready for work.
async fn collect_development_units(
    hierarchy: &TicketHierarchy,
    store: &StateStore,
    workflow_id: &TaskId,
) -> anyhow::Result<Vec<DevelopmentUnit>> {
    let state = store
        .load_workflow_state(workflow_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("workflow not found"))?;

    let mut units = Vec::new();
    for parent in hierarchy.list_parents(state.project_id.as_str()).await? {
        for child in hierarchy.list_children(state.project_id.as_str(), parent.id.as_str()).await? {
            for grandchild in hierarchy.list_grandchildren(state.project_id.as_str(), child.id.as_str()).await? {
                if matches!(grandchild.status, TicketStatus::Pending | TicketStatus::RevisionRequired) {
                    units.push(DevelopmentUnit {
                        ticket_id: grandchild.id,
                        title: grandchild.title,
                        acceptance_criteria: grandchild.acceptance_criteria,
                        worker_type: child.worker_type,
                    });
                }
            }
        }
    }
    Ok(units)
}

async fn collect_review_ready(
    hierarchy: &TicketHierarchy,
    store: &StateStore,
    workflow_id: &TaskId,
) -> anyhow::Result<Vec<agentyard_core::ticket::GrandchildTicket>> {
    let state = store
        .load_workflow_state(workflow_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("workflow not found"))?;

    let mut tickets = Vec::new();
    for parent in hierarchy.list_parents(state.project_id.as_str()).await? {
        for child in hierarchy.list_children(state.project_id.as_str(), parent.id.as_str()).await? {
            for grandchild in hierarchy.list_grandchildren(state.project_id.as_str(), child.id.as_str()).await? {
                if grandchild.status == TicketStatus::ReviewRequested {
                    tickets.push(grandchild);
                }
            }
        }
    }
    Ok(tickets)
}

fn init_tracing(log_file: Option<&std::path::Path>) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "agentyard=info".into());

    if let Some(path) = log_file {
        let file = std::fs::OpenOptions::new().create(true).append(true).open(path).expect("open log file");
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(file))
            .init();
    } else {
        tracing_subscriber::registry().with(env_filter).with(tracing_subscriber::fmt::layer()).init();
    }
}
