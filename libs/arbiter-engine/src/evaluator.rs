/// Result Evaluator - Output Comparison and Aggregation
///
/// **Core Responsibility:**
/// Turn raw run outcomes into ordered `TestResult`s.
///
/// **Critical Properties:**
/// - Knows nothing about environments or providers
/// - Knows nothing about language runtimes
/// - Pure functions, no I/O
///
/// **Normalization Rules (Applied to All Languages):**
/// - Trim leading and trailing whitespace on both sides: YES
/// - Internal whitespace preserved: YES
/// - Case sensitivity: YES (exact match required)
use arbiter_common::types::{FailureKind, TestCase, TestResult};
use std::time::Duration;
use tracing::debug;

/// Raw outcome of one test case's run command.
/// Produced by the runner, consumed by the evaluator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The command finished; exit code decides between runtime error and comparison
    Exited {
        exit_code: i64,
        stdout: String,
        stderr: String,
    },
    /// The command exceeded its time limit
    TimedOut { limit: Duration },
    /// The command could not be executed at all
    Failed { message: String },
}

fn normalize_output(output: &str) -> &str {
    output.trim()
}

/// Evaluate a single run against its test case
pub fn evaluate_test(test_case: &TestCase, outcome: &RunOutcome) -> TestResult {
    match outcome {
        RunOutcome::Exited {
            exit_code,
            stdout,
            stderr,
        } => {
            if *exit_code != 0 {
                return TestResult::failed(
                    test_case,
                    normalize_output(stderr).to_string(),
                    FailureKind::RuntimeError,
                );
            }

            let actual = normalize_output(stdout);
            if actual == normalize_output(&test_case.expected) {
                TestResult::passed(test_case, actual.to_string())
            } else {
                TestResult::failed(test_case, actual.to_string(), FailureKind::Mismatch)
            }
        }
        RunOutcome::TimedOut { limit } => TestResult::failed(
            test_case,
            format!("Time limit exceeded ({} ms)", limit.as_millis()),
            FailureKind::RuntimeError,
        ),
        RunOutcome::Failed { message } => {
            TestResult::failed(test_case, message.clone(), FailureKind::RuntimeError)
        }
    }
}

/// Pair outcomes with test cases by index.
///
/// The result always has one entry per test case: a missing outcome becomes a
/// runtime-error placeholder rather than being dropped.
pub fn aggregate(test_cases: &[TestCase], outcomes: Vec<RunOutcome>) -> Vec<TestResult> {
    let mut outcomes = outcomes.into_iter();

    test_cases
        .iter()
        .enumerate()
        .map(|(index, test_case)| {
            let result = match outcomes.next() {
                Some(outcome) => evaluate_test(test_case, &outcome),
                None => TestResult::failed(
                    test_case,
                    "No result produced for this test case".to_string(),
                    FailureKind::RuntimeError,
                ),
            };
            debug!(
                test_index = index,
                passed = result.passed,
                failure_kind = ?result.failure_kind,
                "Test evaluated"
            );
            result
        })
        .collect()
}

/// Uniform result set for a failed build: every test fails with the same diagnostic
pub fn compile_failure(test_cases: &[TestCase], diagnostic: &str) -> Vec<TestResult> {
    test_cases
        .iter()
        .map(|tc| TestResult::failed(tc, diagnostic.to_string(), FailureKind::CompileError))
        .collect()
}
