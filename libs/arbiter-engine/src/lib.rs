pub mod compile;
pub mod docker;
pub mod error;
pub mod evaluator;
pub mod guard;
pub mod language;
pub mod orchestrator;
pub mod runner;
pub mod sandbox;
pub mod stager;


pub use error::OrchestratorError;
pub use language::{LanguageProfile, LanguageRegistry, UnsupportedLanguage};
pub use orchestrator::Orchestrator;
pub use sandbox::{CommandOutput, ProviderError, Sandbox, SandboxProvider};
