// Build phase: runs a profile's compile command once per request under a hard ceiling

use crate::sandbox::{ProviderError, Sandbox};
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// Result of the build step. A timeout is a failed build, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOutcome {
    /// `None` when the compiler was stopped by the timeout
    pub exit_code: Option<i64>,
    pub stderr: String,
}

impl CompileOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn timed_out(&self) -> bool {
        self.exit_code.is_none()
    }

    /// Text reported as the output of every test case when the build fails
    pub fn diagnostic(&self) -> String {
        self.stderr.trim().to_string()
    }
}

fn timeout_outcome(limit: Duration) -> CompileOutcome {
    CompileOutcome {
        exit_code: None,
        stderr: format!("Compilation timed out after {} ms", limit.as_millis()),
    }
}

/// Run `command` in the environment. Only a failure to issue the command at
/// all is returned as an error.
#[instrument(skip(sandbox), fields(environment_id = %sandbox.id()))]
pub async fn compile(
    sandbox: &dyn Sandbox,
    command: &str,
    limit: Duration,
) -> Result<CompileOutcome, ProviderError> {
    let start = Instant::now();

    let outcome = match tokio::time::timeout(limit, sandbox.run(command, Some(limit))).await {
        Ok(Ok(output)) => CompileOutcome {
            exit_code: Some(output.exit_code),
            stderr: output.stderr,
        },
        Ok(Err(ProviderError::Timeout(_))) | Err(_) => timeout_outcome(limit),
        Ok(Err(e)) => return Err(e),
    };

    let compilation_time_ms = start.elapsed().as_millis() as u64;
    if outcome.succeeded() {
        info!(compilation_time_ms, "Compilation succeeded");
    } else if outcome.timed_out() {
        warn!(
            compilation_time_ms,
            limit_ms = limit.as_millis() as u64,
            "Compilation timed out"
        );
    } else {
        warn!(
            compilation_time_ms,
            exit_code = ?outcome.exit_code,
            error_preview = outcome.stderr.lines().next().unwrap_or(""),
            "Compilation failed"
        );
    }

    Ok(outcome)
}
