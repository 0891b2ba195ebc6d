//! QualityGate — strictly sequences lint → test. Test is skipped
//! iff lint failed or test files are absent. Runs checks as timed,
//! kill-on-drop child processes.

use agentyard_core::{RecordedError, RunId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{info, warn};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckResult {
    pub executed: bool,
    pub passed: bool,
    pub output: String,
    pub skip_reason: Option<String>,
    pub duration_ms: u64,
}

impl CheckResult {
    fn skipped(reason: impl Into<String>) -> Self {
        Self { executed: false, passed: false, output: String::new(), skip_reason: Some(reason.into()), duration_ms: 0 }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QualityGateResult {
    pub run_id: RunId,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub lint: CheckResult,
    pub test: CheckResult,
    pub success: bool,
    pub errors: Vec<RecordedError>,
    pub duration_ms: u64,
}

pub struct QualityGateConfig {
    pub workspace_root: PathBuf,
    pub lint_command: Option<String>,
    pub test_command: Option<String>,
    pub skip_lint: bool,
    pub skip_test: bool,
    pub timeout: Duration,
}

impl Default for QualityGateConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("."),
            lint_command: Some("cargo clippy --quiet -- -D warnings".to_string()),
            test_command: Some("cargo test --quiet".to_string()),
            skip_lint: false,
            skip_test: false,
            timeout: Duration::from_secs(300),
        }
    }
}

pub struct QualityGate {
    config: QualityGateConfig,
}

impl QualityGate {
    pub fn new(config: QualityGateConfig) -> Self {
        Self { config }
    }

    /// Runs lint, then (conditionally) test, in that order.
    pub async fn execute(&self, run_id: &RunId) -> QualityGateResult {
        let started = Instant::now();
        let mut errors = Vec::new();

        let lint = self.run_lint().await;
        if let Some(err) = lint_error(&lint) {
            errors.push(err);
        }

        let test = self.run_test(&lint).await;
        if let Some(err) = test_error(&test) {
            errors.push(err);
        }

        let success = check_counts_as_passed(&lint) && check_counts_as_passed(&test);

        info!(%run_id, lint_passed = lint.passed, test_passed = test.passed, success, "quality gate finished");

        QualityGateResult {
            run_id: run_id.clone(),
            timestamp: chrono::Utc::now(),
            lint,
            test,
            success,
            errors,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    async fn run_lint(&self) -> CheckResult {
        if self.config.skip_lint {
            return CheckResult::skipped("config skip");
        }
        let Some(command) = self.config.lint_command.clone() else {
            return CheckResult::skipped("config skip");
        };
        run_check(&command, &self.config.workspace_root, self.config.timeout).await
    }

    async fn run_test(&self, lint: &CheckResult) -> CheckResult {
        if self.config.skip_test {
            return CheckResult::skipped("config skip");
        }
        // Test never runs when lint was executed and failed.
        if lint.executed && !lint.passed {
            return CheckResult::skipped("lint failed");
        }
        if !has_test_files(&self.config.workspace_root) {
            return CheckResult::skipped("no test files");
        }
        let Some(command) = self.config.test_command.clone() else {
            return CheckResult::skipped("no test files");
        };
        run_check(&command, &self.config.workspace_root, self.config.timeout).await
    }
}

/// A skipped check counts as passed only when the skip is a config skip or
/// a no-test-files skip; a lint-failure skip never yields success.
fn check_counts_as_passed(check: &CheckResult) -> bool {
    if check.executed {
        return check.passed;
    }
    matches!(check.skip_reason.as_deref(), Some("config skip") | Some("no test files"))
}

fn lint_error(lint: &CheckResult) -> Option<RecordedError> {
    if lint.executed && !lint.passed {
        Some(RecordedError::new("LINT_FAILED", lint.output.clone(), true))
    } else {
        None
    }
}

fn test_error(test: &CheckResult) -> Option<RecordedError> {
    if test.executed && !test.passed {
        Some(RecordedError::new("TEST_FAILED", test.output.clone(), true))
    } else {
        None
    }
}

/// Crude but effective presence check: a `tests/` directory, or any file
/// whose name contains `test` under the workspace.
fn has_test_files(root: &Path) -> bool {
    if root.join("tests").is_dir() {
        return true;
    }
    walk_for_test_file(root, 0)
}

fn walk_for_test_file(dir: &Path, depth: usize) -> bool {
    if depth > 4 {
        return false;
    }
    let Ok(entries) = std::fs::read_dir(dir) else { return false };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if path.file_name().and_then(|n| n.to_str()) == Some("target") {
                continue;
            }
            if walk_for_test_file(&path, depth + 1) {
                return true;
            }
        } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.contains("test") {
                return true;
            }
        }
    }
    false
}

async fn run_check(command: &str, workspace_root: &Path, timeout: Duration) -> CheckResult {
    let started = Instant::now();

    let mut child = match Command::new("bash")
        .arg("-c")
        .arg(command)
        .current_dir(workspace_root)
        .kill_on_drop(true)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            return CheckResult {
                executed: true,
                passed: false,
                output: format!("failed to spawn '{}': {}", command, e),
                skip_reason: None,
                duration_ms: started.elapsed().as_millis() as u64,
            };
        }
    };

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => {
            let mut stdout = String::new();
            let mut stderr = String::new();
            if let Some(mut p) = child.stdout.take() {
                let _ = p.read_to_string(&mut stdout).await;
            }
            if let Some(mut p) = child.stderr.take() {
                let _ = p.read_to_string(&mut stderr).await;
            }
            CheckResult {
                executed: true,
                passed: status.success(),
                output: format!("{}{}", stdout, stderr),
                skip_reason: None,
                duration_ms: started.elapsed().as_millis() as u64,
            }
        }
        Ok(Err(e)) => CheckResult {
            executed: true,
            passed: false,
            output: format!("failed to wait on '{}': {}", command, e),
            skip_reason: None,
            duration_ms: started.elapsed().as_millis() as u64,
        },
        Err(_) => {
            warn!(command, "quality gate check timed out");
            let _ = child.kill().await;
            CheckResult {
                executed: true,
                passed: false,
                output: format!("'{}' timed out after {:?}", command, timeout),
                skip_reason: None,
                duration_ms: started.elapsed().as_millis() as u64,
            }
        }
    }
}
