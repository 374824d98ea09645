// CLI commands for grading submissions locally
use anyhow::{Context, Result};
use arbiter_common::config::RunnerConfig;
use arbiter_common::types::{ExecutionRequest, Summary, TestCase, TestResult};
use arbiter_engine::docker::DockerProvider;
use arbiter_engine::{LanguageRegistry, Orchestrator};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Parse a test file: a JSON array of `{"input", "expected"}` objects.
/// An empty array is valid and grades nothing.
pub fn parse_test_cases(content: &str) -> Result<Vec<TestCase>> {
    serde_json::from_str(content).context("Test file must be a JSON array of {input, expected}")
}

/// Exit status of `run`: success unless some test failed
pub fn no_failures(summary: &Summary) -> bool {
    summary.passed == summary.total
}

/// One line per test, as printed by `run`
pub fn format_result(index: usize, result: &TestResult) -> String {
    match result.failure_kind {
        None => format!("✓ Test {}: passed", index + 1),
        Some(kind) => format!(
            "✗ Test {}: {} (expected {:?}, got {:?})",
            index + 1,
            kind,
            result.expected.trim(),
            result.output
        ),
    }
}

/// Grade `source` against the tests in `tests_path`. Returns false when any test failed.
pub async fn run_submission(
    language: Option<&str>,
    source: &Path,
    tests_path: &Path,
    template: Option<&str>,
    timeout_ms: Option<u64>,
) -> Result<bool> {
    let mut config = RunnerConfig::from_env().context("Invalid configuration")?;
    if let Some(template) = template {
        config.template_id = template.to_string();
    }

    let code = fs::read_to_string(source)
        .with_context(|| format!("Failed to read source file {}", source.display()))?;
    let content = fs::read_to_string(tests_path)
        .with_context(|| format!("Failed to read test file {}", tests_path.display()))?;
    let test_cases = parse_test_cases(&content)?;

    let registry = LanguageRegistry::from_config(&config)?;
    let provider = DockerProvider::connect(config.sandbox.clone())?;
    let orchestrator = Orchestrator::new(Arc::new(provider), Arc::new(registry), config);

    let request = ExecutionRequest {
        code,
        language: language.map(str::to_string),
        test_cases,
        timeout_ms,
    };

    println!("🚀 Grading {} ({} tests)", source.display(), request.test_cases.len());

    let results = orchestrator.execute(&request).await?;
    for (i, result) in results.iter().enumerate() {
        println!("  {}", format_result(i, result));
    }

    let summary = Summary::of(&results);
    println!("\n📊 {}/{} tests passed", summary.passed, summary.total);

    Ok(no_failures(&summary))
}

pub fn list_languages(config_path: Option<&Path>) -> Result<()> {
    let mut config = RunnerConfig::from_env().context("Invalid configuration")?;
    if let Some(path) = config_path {
        config.languages_config = Some(path.to_path_buf());
    }
    let registry = LanguageRegistry::from_config(&config)?;

    println!("📋 Supported languages (default: {}):", registry.default_language());
    for profile in registry.profiles() {
        let aliases = if profile.aliases.is_empty() {
            String::new()
        } else {
            format!(" [aliases: {}]", profile.aliases.join(", "))
        };
        println!("  - {} ({}){}", profile.name, profile.source_filename, aliases);
        if let Some(compile) = &profile.compile_command {
            println!("      compile: {}", compile);
        }
        println!("      run:     {}", profile.run_command);
    }

    Ok(())
}
