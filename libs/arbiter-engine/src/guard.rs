/// Environment lifecycle guard
///
/// Owns the one environment a request runs in. Release is explicit and
/// awaited on every normal path (`release`). If the owning future is dropped
/// before that happens (cancelled request, aborted task), `Drop` schedules the
/// release on the current runtime instead, so the environment is still
/// released exactly once.
use crate::sandbox::{ProviderError, Sandbox, SandboxProvider};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct EnvironmentGuard {
    sandbox: Arc<dyn Sandbox>,
    armed: bool,
}

impl EnvironmentGuard {
    /// Create one environment from `template`. Nothing needs releasing when
    /// this fails; the provider cleans up partial creations itself.
    pub async fn acquire(
        provider: &dyn SandboxProvider,
        template: &str,
    ) -> Result<Self, ProviderError> {
        let start = Instant::now();
        let sandbox = provider.create(template).await?;

        info!(
            environment_id = %sandbox.id(),
            template = template,
            acquire_ms = start.elapsed().as_millis() as u64,
            "Environment acquired"
        );

        Ok(Self {
            sandbox,
            armed: true,
        })
    }

    pub fn sandbox(&self) -> &dyn Sandbox {
        self.sandbox.as_ref()
    }

    /// Release the environment. Failures are logged, never returned, so they
    /// cannot mask the outcome of the request.
    pub async fn release(mut self) {
        self.armed = false;
        let id = self.sandbox.id().to_string();

        match self.sandbox.release().await {
            Ok(()) => info!(environment_id = %id, "Environment released"),
            Err(e) => warn!(environment_id = %id, error = %e, "Failed to release environment"),
        }
    }
}

impl Drop for EnvironmentGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let sandbox = Arc::clone(&self.sandbox);
        let id = sandbox.id().to_string();
        debug!(environment_id = %id, "Guard dropped before release; releasing in background");

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = sandbox.release().await {
                        warn!(environment_id = %id, error = %e, "Background release failed");
                    }
                });
            }
            Err(_) => {
                warn!(environment_id = %id, "No runtime available; environment leaked");
            }
        }
    }
}
