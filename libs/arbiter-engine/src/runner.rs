/// Parallel Test Runner
///
/// Dispatches every test case's run command at once against the single
/// environment of the request and collects the outcomes by index.
///
/// **Guarantees:**
/// - Test `i` only ever reads `input_i.txt`
/// - One failing, crashing or hanging test never affects its siblings
/// - The returned vector is in request order whatever the completion order
use crate::evaluator::RunOutcome;
use crate::language::LanguageProfile;
use crate::sandbox::{ProviderError, Sandbox};
use crate::stager::input_file_name;
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

async fn run_one(
    sandbox: &dyn Sandbox,
    index: usize,
    command: String,
    limit: Duration,
) -> (usize, RunOutcome) {
    let result = tokio::time::timeout(limit, sandbox.run(&command, Some(limit))).await;

    let outcome = match result {
        Ok(Ok(output)) => RunOutcome::Exited {
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
        },
        Ok(Err(ProviderError::Timeout(_))) | Err(_) => {
            warn!(test_index = index, limit_ms = limit.as_millis() as u64, "Test timed out");
            RunOutcome::TimedOut { limit }
        }
        Ok(Err(e)) => {
            warn!(test_index = index, error = %e, "Test could not be executed");
            RunOutcome::Failed {
                message: e.to_string(),
            }
        }
    };

    (index, outcome)
}

/// Run `count` test cases concurrently. Input files must already be staged.
#[instrument(skip(sandbox, profile), fields(environment_id = %sandbox.id(), language = %profile.name))]
pub async fn run_all(
    sandbox: &dyn Sandbox,
    profile: &LanguageProfile,
    count: usize,
    limit: Duration,
) -> Vec<RunOutcome> {
    let start = Instant::now();
    info!(tests = count, "Starting parallel test run");

    let mut pending: FuturesUnordered<_> = (0..count)
        .map(|index| {
            let command = profile.run_command_for(&input_file_name(index));
            run_one(sandbox, index, command, limit)
        })
        .collect();

    let mut slots: Vec<Option<RunOutcome>> = vec![None; count];
    while let Some((index, outcome)) = pending.next().await {
        debug!(
            test_index = index,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Test completed"
        );
        if let Some(slot) = slots.get_mut(index) {
            *slot = Some(outcome);
        }
    }

    info!(
        tests = count,
        total_ms = start.elapsed().as_millis() as u64,
        "All tests completed"
    );

    slots
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| RunOutcome::Failed {
                message: "Test was not executed".to_string(),
            })
        })
        .collect()
}
