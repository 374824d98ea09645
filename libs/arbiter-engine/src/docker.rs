/// Docker-backed environment provider
///
/// **Environment Rules:**
/// 1. Pulls the template image if it is not cached locally
/// 2. Creates one long-lived container per request:
///    - Network disabled unless configured otherwise
///    - CPU/memory limits enforced
///    - Kept alive by a bounded `sleep`, so a leaked container still exits
/// 3. Files are streamed in over an exec's stdin; content never touches a
///    shell command line
/// 4. Commands run as `sh -c <command>` in the working directory
/// 5. Release force-removes the container
use crate::sandbox::{CommandOutput, ProviderError, Sandbox, SandboxProvider};
use arbiter_common::config::SandboxSettings;
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, RemoveContainerOptions, StartContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::Docker;
use futures_util::stream::StreamExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

pub struct DockerProvider {
    docker: Docker,
    settings: SandboxSettings,
}

impl DockerProvider {
    pub fn connect(settings: SandboxSettings) -> Result<Self, ProviderError> {
        let docker = Docker::connect_with_local_defaults().map_err(|e| {
            ProviderError::Provisioning(format!("Failed to connect to Docker daemon: {}", e))
        })?;
        Ok(Self { docker, settings })
    }

    /// Ensure the template image is available (pull if needed)
    async fn ensure_image(&self, image: &str) -> Result<(), ProviderError> {
        if self.docker.inspect_image(image).await.is_ok() {
            debug!("Image cache hit: {}", image);
            return Ok(());
        }

        warn!("Image cache miss: {} (pulling now)", image);

        let options = Some(CreateImageOptions {
            from_image: image,
            ..Default::default()
        });

        let mut stream = self.docker.create_image(options, None, None);
        while let Some(result) = stream.next().await {
            result.map_err(|e| {
                ProviderError::Provisioning(format!("Failed to pull image '{}': {}", image, e))
            })?;
        }

        info!("Image pulled successfully: {}", image);
        Ok(())
    }
}

/// Container that idles until released. `auto_remove` deletes it once its
/// `sleep` ends, covering a request dropped before a guard owned it.
fn container_config(settings: &SandboxSettings, image: &str) -> Config<String> {
    let memory = (settings.memory_limit_mb as i64) * 1024 * 1024;
    let nano_cpus = (settings.cpu_limit as f64 * 1_000_000_000.0) as i64;

    Config {
        image: Some(image.to_string()),
        cmd: Some(vec!["sleep".to_string(), settings.lifetime_secs.to_string()]),
        entrypoint: Some(vec![]),
        working_dir: Some(settings.workdir.clone()),
        network_disabled: Some(!settings.network_enabled),
        host_config: Some(bollard::models::HostConfig {
            memory: Some(memory),
            nano_cpus: Some(nano_cpus),
            auto_remove: Some(true),
            readonly_rootfs: Some(false),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[async_trait]
impl SandboxProvider for DockerProvider {
    async fn create(&self, template: &str) -> Result<Arc<dyn Sandbox>, ProviderError> {
        self.ensure_image(template).await?;

        let name = format!("arbiter-{}", uuid::Uuid::new_v4());
        let create_options = CreateContainerOptions {
            name: name.as_str(),
            platform: None,
        };

        let container = self
            .docker
            .create_container(Some(create_options), container_config(&self.settings, template))
            .await
            .map_err(|e| {
                ProviderError::Provisioning(format!("Failed to create container: {}", e))
            })?;

        let sandbox = DockerSandbox {
            docker: self.docker.clone(),
            container_id: container.id,
            workdir: self.settings.workdir.clone(),
        };

        if let Err(e) = self
            .docker
            .start_container(&sandbox.container_id, None::<StartContainerOptions<String>>)
            .await
        {
            // Created but never started: remove it before reporting
            if let Err(cleanup) = sandbox.release().await {
                warn!(container_id = %sandbox.container_id, error = %cleanup, "Failed to remove unstarted container");
            }
            return Err(ProviderError::Provisioning(format!(
                "Failed to start container: {}",
                e
            )));
        }

        Ok(Arc::new(sandbox))
    }
}

pub struct DockerSandbox {
    docker: Docker,
    container_id: String,
    workdir: String,
}

impl DockerSandbox {
    /// Create an exec in the container and return its id
    async fn create_exec(&self, cmd: Vec<String>, attach_stdin: bool) -> Result<String, DockerError> {
        let exec_config = CreateExecOptions {
            cmd: Some(cmd),
            attach_stdin: Some(attach_stdin),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            working_dir: Some(self.workdir.clone()),
            ..Default::default()
        };

        let exec = self
            .docker
            .create_exec(&self.container_id, exec_config)
            .await?;
        Ok(exec.id)
    }

    /// Start an exec, optionally feed `stdin`, and collect its output
    async fn drive_exec(
        &self,
        exec_id: &str,
        stdin: Option<&[u8]>,
    ) -> Result<CommandOutput, ProviderError> {
        let start_config = StartExecOptions {
            detach: false,
            ..Default::default()
        };

        let started = self
            .docker
            .start_exec(exec_id, Some(start_config))
            .await
            .map_err(|e| ProviderError::Command(format!("Failed to start exec: {}", e)))?;

        let mut stdout = String::new();
        let mut stderr = String::new();

        match started {
            StartExecResults::Attached {
                mut output,
                mut input,
            } => {
                if let Some(bytes) = stdin {
                    input
                        .write_all(bytes)
                        .await
                        .map_err(|e| ProviderError::Io(format!("Failed to stream file: {}", e)))?;
                    input
                        .shutdown()
                        .await
                        .map_err(|e| ProviderError::Io(format!("Failed to close stream: {}", e)))?;
                }

                while let Some(msg) = output.next().await {
                    match msg {
                        Ok(LogOutput::StdOut { message }) => {
                            stdout.push_str(&String::from_utf8_lossy(&message));
                        }
                        Ok(LogOutput::StdErr { message }) => {
                            stderr.push_str(&String::from_utf8_lossy(&message));
                        }
                        Ok(_) => {}
                        Err(e) => {
                            return Err(ProviderError::Command(format!(
                                "Failed to read exec output: {}",
                                e
                            )));
                        }
                    }
                }
            }
            StartExecResults::Detached => {
                return Err(ProviderError::Command(
                    "Failed to attach to exec".to_string(),
                ));
            }
        }

        let exit_code = wait_for_exit_code(
            || async move {
                let inspect = self.docker.inspect_exec(exec_id).await.map_err(|e| {
                    ProviderError::Command(format!("Failed to inspect exec: {}", e))
                })?;
                Ok((inspect.running, inspect.exit_code))
            },
            EXIT_POLL_ATTEMPTS,
            EXIT_POLL_INTERVAL,
        )
        .await?;

        Ok(CommandOutput {
            exit_code,
            stdout,
            stderr,
        })
    }
}

/// Docker may still report an exec as running for a moment after its
/// output stream has closed.
const EXIT_POLL_ATTEMPTS: u32 = 40;
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Poll `inspect` (yielding `(running, exit_code)`) until the exec has
/// stopped and reports an exit code.
async fn wait_for_exit_code<F, Fut>(
    mut inspect: F,
    attempts: u32,
    interval: Duration,
) -> Result<i64, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(Option<bool>, Option<i64>), ProviderError>>,
{
    for attempt in 1..=attempts {
        match inspect().await? {
            (Some(true), _) | (_, None) => {
                if attempt < attempts {
                    tokio::time::sleep(interval).await;
                }
            }
            (_, Some(code)) => return Ok(code),
        }
    }

    Err(ProviderError::Command(format!(
        "exec reported no exit code after {} checks",
        attempts
    )))
}

#[async_trait]
impl Sandbox for DockerSandbox {
    fn id(&self) -> &str {
        &self.container_id
    }

    async fn write_file(&self, name: &str, content: &[u8]) -> Result<(), ProviderError> {
        // The path travels as a positional argument, not as shell text
        let cmd = vec![
            "sh".to_string(),
            "-c".to_string(),
            "cat > \"$0\"".to_string(),
            name.to_string(),
        ];

        let exec_id = self
            .create_exec(cmd, true)
            .await
            .map_err(|e| ProviderError::Io(format!("Failed to create exec for {}: {}", name, e)))?;

        let output = self.drive_exec(&exec_id, Some(content)).await?;
        if !output.success() {
            return Err(ProviderError::Io(format!(
                "Failed to write {}: {}",
                name,
                output.stderr.trim()
            )));
        }

        debug!(container_id = %self.container_id, file = name, bytes = content.len(), "File written");
        Ok(())
    }

    async fn run(
        &self,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, ProviderError> {
        let cmd = vec!["sh".to_string(), "-c".to_string(), command.to_string()];

        let execution = async {
            let exec_id = self
                .create_exec(cmd, false)
                .await
                .map_err(|e| ProviderError::Command(format!("Failed to create exec: {}", e)))?;
            self.drive_exec(&exec_id, None).await
        };

        match timeout {
            Some(limit) => tokio::time::timeout(limit, execution)
                .await
                .map_err(|_| ProviderError::Timeout(limit))?,
            None => execution.await,
        }
    }

    async fn release(&self) -> Result<(), ProviderError> {
        let remove_options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };

        match self
            .docker
            .remove_container(&self.container_id, Some(remove_options))
            .await
        {
            Ok(()) => Ok(()),
            // Already gone, or auto-removal got there first
            Err(DockerError::DockerResponseServerError {
                status_code: 404 | 409,
                ..
            }) => Ok(()),
            Err(e) => Err(ProviderError::Io(format!(
                "Failed to remove container {}: {}",
                self.container_id, e
            ))),
        }
    }
}
