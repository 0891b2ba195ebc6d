//! agentyard-container — ContainerRuntime and WorkerContainer:
//! the isolation substrate one WorkerAgent runs inside of.

pub mod command;
pub mod isolation;
pub mod runtime;
pub mod worker_container;

pub use command::{validate_command, validate_default, CommandValidation, DEFAULT_ALLOW, DENY_ALWAYS};
pub use isolation::{
    verify_container_isolation, verify_isolation, ContainerIsolationComparison, IsolationConfig,
    IsolationReport,
};
pub use runtime::{build_runtime, default_allow_set, BypassValidationRuntime, CommandOutput, ContainerRuntime, CreateOptions, HostSocketRuntime};
pub use worker_container::{extract_worker_id, ContainerState, GitConfig, WorkerContainer, WorkerContainerConfig};
