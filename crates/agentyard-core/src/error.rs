//! Error taxonomy shared by every crate in the workspace.
//!
//! Each variant corresponds to one of the stable error codes the design
//! assigns recoverable failures. Operations that a caller can recover from
//! return `Result<T>`; only programmer errors (unknown ids passed to a
//! lookup API) panic.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("disallowed command: {detected} (allowed: {allowed})")]
    DisallowedCommand { detected: String, allowed: String },

    #[error("lint failed: {0}")]
    LintFailed(String),

    #[error("test failed: {0}")]
    TestFailed(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("AI backend unavailable: {0}")]
    AiUnavailable(String),

    #[error("container error: {0}")]
    ContainerError(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn disallowed_command(detected: impl Into<String>, allowed: impl Into<String>) -> Self {
        Self::DisallowedCommand {
            detected: detected.into(),
            allowed: allowed.into(),
        }
    }

    /// The stable code for this variant, as used in structured error records
    /// (`ExecutionResult.errors[].code`, `QualityGateResult.errors[].code`).
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::DisallowedCommand { .. } => "DISALLOWED_COMMAND",
            Self::LintFailed(_) => "LINT_FAILED",
            Self::TestFailed(_) => "TEST_FAILED",
            Self::Timeout(_) => "TIMEOUT",
            Self::AiUnavailable(_) => "AI_UNAVAILABLE",
            Self::ContainerError(_) => "CONTAINER_ERROR",
            Self::Cancelled => "CANCELLED",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

/// A recoverable error as persisted on an `ExecutionResult` or gate result.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RecordedError {
    pub code: String,
    pub message: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub recoverable: bool,
}

impl RecordedError {
    pub fn new(code: impl Into<String>, message: impl Into<String>, recoverable: bool) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            timestamp: chrono::Utc::now(),
            recoverable,
        }
    }

    pub fn from_error(err: &Error, recoverable: bool) -> Self {
        Self::new(err.code(), err.to_string(), recoverable)
    }
}
