/// Execution Orchestrator - High-Level Pipeline
///
/// **Pipeline:**
/// 1. Validate the request and resolve its language profile (no environment yet)
/// 2. Acquire one environment through the lifecycle guard
/// 3. Stage source and inputs
/// 4. Compile when the profile requires it; a failed build short-circuits
/// 5. Run every test case in parallel
/// 6. Evaluate outcomes into an ordered result set
/// 7. Release the environment, on every path
///
/// This module is the glue layer. It knows nothing about:
/// - How an environment is implemented (provider's job)
/// - How outputs are compared (evaluator's job)
use crate::compile;
use crate::error::OrchestratorError;
use crate::evaluator;
use crate::guard::EnvironmentGuard;
use crate::language::{LanguageProfile, LanguageRegistry};
use crate::runner;
use crate::sandbox::{Sandbox, SandboxProvider};
use crate::stager;
use arbiter_common::config::RunnerConfig;
use arbiter_common::types::{ExecutionRequest, Summary, TestResult, ValidationError};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};

#[derive(Clone)]
pub struct Orchestrator {
    provider: Arc<dyn SandboxProvider>,
    registry: Arc<LanguageRegistry>,
    config: Arc<RunnerConfig>,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn SandboxProvider>,
        registry: Arc<LanguageRegistry>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            provider,
            registry,
            config: Arc::new(config),
        }
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Grade `request`. Returns one result per test case, in request order,
    /// or a top-level error when no per-test result can be produced.
    #[instrument(
        skip(self, request),
        fields(
            language = request.language.as_deref().unwrap_or("<default>"),
            test_count = request.test_cases.len()
        )
    )]
    pub async fn execute(
        &self,
        request: &ExecutionRequest,
    ) -> Result<Vec<TestResult>, OrchestratorError> {
        let start = Instant::now();

        request.check_limits(self.config.max_source_bytes, self.config.max_input_bytes)?;
        let run_timeout = self.run_timeout(request)?;
        let profile = self.registry.resolve(request.language.as_deref())?;

        let guard = EnvironmentGuard::acquire(self.provider.as_ref(), &self.config.template_id)
            .await
            .map_err(|e| {
                error!(error = %e, template = %self.config.template_id, "Environment provisioning failed");
                OrchestratorError::Provisioning(e)
            })?;

        let outcome = AssertUnwindSafe(self.run_pipeline(
            guard.sandbox(),
            &profile,
            request,
            run_timeout,
        ))
        .catch_unwind()
        .await;

        guard.release().await;

        let results = match outcome {
            Ok(results) => results?,
            Err(panic) => std::panic::resume_unwind(panic),
        };

        let summary = Summary::of(&results);
        info!(
            language = %profile.name,
            passed = summary.passed,
            total = summary.total,
            execution_ms = start.elapsed().as_millis() as u64,
            "Execution completed"
        );

        Ok(results)
    }

    fn run_timeout(&self, request: &ExecutionRequest) -> Result<Duration, ValidationError> {
        match request.timeout_ms {
            None => Ok(self.config.run_timeout),
            Some(ms) => {
                let max = self.config.max_run_timeout.as_millis() as u64;
                if ms == 0 || ms > max {
                    return Err(ValidationError::InvalidTimeout { max });
                }
                Ok(Duration::from_millis(ms))
            }
        }
    }

    async fn run_pipeline(
        &self,
        sandbox: &dyn Sandbox,
        profile: &LanguageProfile,
        request: &ExecutionRequest,
        run_timeout: Duration,
    ) -> Result<Vec<TestResult>, OrchestratorError> {
        stager::stage(sandbox, profile, &request.code, &request.test_cases)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to stage submission");
                OrchestratorError::Environment(e)
            })?;

        if let Some(command) = &profile.compile_command {
            let outcome = compile::compile(sandbox, command, self.config.compile_timeout)
                .await
                .map_err(|e| {
                    error!(error = %e, "Compile command could not be issued");
                    OrchestratorError::Environment(e)
                })?;

            if !outcome.succeeded() {
                warn!(
                    tests = request.test_cases.len(),
                    "Compilation failed; all tests marked as failed"
                );
                return Ok(evaluator::compile_failure(
                    &request.test_cases,
                    &outcome.diagnostic(),
                ));
            }
        }

        let outcomes =
            runner::run_all(sandbox, profile, request.test_cases.len(), run_timeout).await;

        Ok(evaluator::aggregate(&request.test_cases, outcomes))
    }
}
