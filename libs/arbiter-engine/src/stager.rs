// Writes the submission and every test input into the environment.
// All writes complete before any build or run command is issued.

use crate::language::LanguageProfile;
use crate::sandbox::{ProviderError, Sandbox};
use arbiter_common::types::TestCase;
use futures_util::future::try_join_all;
use tracing::debug;

/// File holding the input of the test case at `index`
pub fn input_file_name(index: usize) -> String {
    format!("input_{}.txt", index)
}

pub async fn stage(
    sandbox: &dyn Sandbox,
    profile: &LanguageProfile,
    code: &str,
    test_cases: &[TestCase],
) -> Result<(), ProviderError> {
    sandbox
        .write_file(&profile.source_filename, code.as_bytes())
        .await?;

    // Inputs are independent files, so they can be written concurrently
    let names: Vec<String> = (0..test_cases.len()).map(input_file_name).collect();
    try_join_all(
        names
            .iter()
            .zip(test_cases)
            .map(|(name, tc)| sandbox.write_file(name, tc.input.as_bytes())),
    )
    .await?;

    debug!(
        environment_id = %sandbox.id(),
        source = %profile.source_filename,
        inputs = test_cases.len(),
        "Submission staged"
    );

    Ok(())
}
