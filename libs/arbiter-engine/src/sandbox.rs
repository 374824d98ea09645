/// Environment provider contract
///
/// The orchestrator never talks to Docker (or any other backend) directly.
/// It only needs four operations from the outside world:
/// - create an environment from a template
/// - write a file into it
/// - run a shell command in it, optionally bounded by a timeout
/// - release it
///
/// A `Sandbox` is shared by reference between the concurrent test runs of a
/// single request. Only the lifecycle guard creates or releases one.
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("failed to provision environment: {0}")]
    Provisioning(String),

    #[error("environment I/O failed: {0}")]
    Io(String),

    #[error("command timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("command could not be executed: {0}")]
    Command(String),
}

/// Captured result of one command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[async_trait]
pub trait SandboxProvider: Send + Sync {
    /// Create and start one environment from `template`
    async fn create(&self, template: &str) -> Result<Arc<dyn Sandbox>, ProviderError>;
}

#[async_trait]
pub trait Sandbox: Send + Sync {
    fn id(&self) -> &str;

    /// Write `content` to `name`, relative to the environment's working directory
    async fn write_file(&self, name: &str, content: &[u8]) -> Result<(), ProviderError>;

    /// Run `command` through a shell in the working directory
    async fn run(
        &self,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, ProviderError>;

    /// Tear the environment down. Must tolerate being called on an
    /// environment that is already gone.
    async fn release(&self) -> Result<(), ProviderError>;
}
