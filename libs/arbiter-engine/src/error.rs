use crate::language::UnsupportedLanguage;
use crate::sandbox::ProviderError;
use arbiter_common::types::ValidationError;
use thiserror::Error;

/// Top-level failures: no per-test results can be produced.
///
/// Compile errors, runtime errors and mismatches are not here; they are
/// reported inside the result set.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    UnsupportedLanguage(#[from] UnsupportedLanguage),

    #[error("environment provisioning failed: {0}")]
    Provisioning(#[source] ProviderError),

    #[error("execution environment failed: {0}")]
    Environment(#[source] ProviderError),
}

impl OrchestratorError {
    /// True when the grader itself broke, false when the request was at fault
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            OrchestratorError::Provisioning(_) | OrchestratorError::Environment(_)
        )
    }

    /// Stable machine-readable classification
    pub fn kind(&self) -> &'static str {
        match self {
            OrchestratorError::Validation(_) => "validationError",
            OrchestratorError::UnsupportedLanguage(_) => "unsupportedLanguage",
            OrchestratorError::Provisioning(_) => "provisioningError",
            OrchestratorError::Environment(_) => "environmentError",
        }
    }
}
