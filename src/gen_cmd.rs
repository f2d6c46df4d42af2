use anyhow::{bail, Result};

use crate::config::Config;
use crate::driver::{generate_constrained, DriverOptions};
use crate::models::GenerationStatus;
use crate::provider::create_source;

/// Run one constrained generation request from the CLI.
///
/// The generated text goes to stdout; progress and warnings go to stderr so
/// the output stays pipeable. Non-complete statuses exit through an error
/// after printing whatever partial text was produced.
pub async fn run_generate(
    config: &Config,
    prompt: &str,
    max_tokens: Option<usize>,
) -> Result<()> {
    if prompt.trim().is_empty() {
        bail!("Prompt must not be empty.");
    }

    if !config.provider.is_enabled() {
        bail!("Token provider is disabled. Set [provider] provider in config.");
    }

    let source = create_source(&config.provider)?;

    if atty::is(atty::Stream::Stderr) {
        eprintln!("Generating with {}...", source.model_name());
    }

    let opts = DriverOptions::from_config(config, max_tokens);
    let generation = generate_constrained(source.as_ref(), prompt, &opts).await?;

    println!("{}", generation.text);

    match generation.status {
        GenerationStatus::Complete => {
            if atty::is(atty::Stream::Stderr) {
                eprintln!("Complete after {} tokens.", generation.steps);
            }
            Ok(())
        }
        GenerationStatus::Exhausted => bail!(
            "Token budget exhausted after {} tokens; output above is incomplete.",
            generation.steps
        ),
        GenerationStatus::Failed => bail!(
            "No valid continuation available after {} tokens; output above is incomplete.",
            generation.steps
        ),
    }
}
