//! Generation driver: the loop that steers a token source toward a
//! complete JSON value.
//!
//! Each step sends `prompt + output-so-far` to the [`TokenSource`], filters
//! the returned candidates through the grammar, commits the best surviving
//! token, and checks for completion. Steps are inherently sequential — each
//! depends on all previous output — but independent requests run
//! concurrently, each owning its own [`GrammarState`] and output buffer.
//!
//! The source call is the only await point. It runs under a per-step
//! timeout; a timeout or source error counts as an empty candidate set and
//! feeds the normal fallback path, and consecutive failures past the
//! configured limit promote the request to `Failed` instead of looping.
//! Every terminal status returns the partial text accumulated so far.

use std::time::Duration;

use anyhow::Result;
use tokio::time::timeout;

use crate::config::Config;
use crate::filter::{filter_candidates, FallbackPolicy};
use crate::grammar::GrammarState;
use crate::models::{CandidateToken, Generation, GenerationStatus};
use crate::provider::TokenSource;

/// Per-request generation settings.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Accepted-token budget.
    pub max_tokens: usize,
    pub fallback: FallbackPolicy,
    /// Backstop timeout around each source call (the source applies its
    /// own HTTP timeout and retries underneath).
    pub step_timeout: Duration,
    /// Consecutive source failures tolerated before the request fails.
    pub max_source_failures: u32,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            max_tokens: 100,
            fallback: FallbackPolicy::default(),
            step_timeout: Duration::from_secs(120),
            max_source_failures: 2,
        }
    }
}

impl DriverOptions {
    pub fn from_config(config: &Config, max_tokens_override: Option<usize>) -> Self {
        Self {
            max_tokens: max_tokens_override.unwrap_or(config.generation.max_tokens),
            fallback: FallbackPolicy {
                forced_close_logprob: config.generation.forced_close_logprob,
                seed_logprob: config.generation.seed_logprob,
            },
            step_timeout: Duration::from_secs(config.generation.step_timeout_secs),
            max_source_failures: config.generation.max_source_failures,
        }
    }
}

/// Generate a JSON value constrained by the grammar.
///
/// Returns `Ok` for all three terminal statuses — `Complete` when the
/// output is a parseable JSON value, `Exhausted` when the token budget ran
/// out first, `Failed` when no continuation (model-offered or synthesized)
/// was available. `Err` is reserved for programmer/config errors.
pub async fn generate_constrained(
    source: &dyn TokenSource,
    prompt: &str,
    opts: &DriverOptions,
) -> Result<Generation> {
    let mut state = GrammarState::new();
    let mut output = String::new();
    let mut steps = 0usize;
    let mut source_failures = 0u32;

    loop {
        if state.is_complete() {
            return Ok(Generation {
                text: output,
                status: GenerationStatus::Complete,
                steps,
            });
        }
        if steps >= opts.max_tokens {
            return Ok(Generation {
                text: output,
                status: GenerationStatus::Exhausted,
                steps,
            });
        }

        let prefix = format!("{}{}", prompt, output);
        let candidates = match timeout(opts.step_timeout, source.next_candidates(&prefix)).await {
            Ok(Ok(candidates)) => {
                source_failures = 0;
                candidates
            }
            // Source error or step timeout: both count as an empty
            // candidate set for this step.
            Ok(Err(_)) | Err(_) => {
                source_failures += 1;
                if source_failures > opts.max_source_failures {
                    return Ok(Generation {
                        text: output,
                        status: GenerationStatus::Failed,
                        steps,
                    });
                }
                Vec::new()
            }
        };

        let filtered = filter_candidates(&state, &candidates, &opts.fallback);
        let Some(winner) = pick_winner(&filtered) else {
            return Ok(Generation {
                text: output,
                status: GenerationStatus::Failed,
                steps,
            });
        };
        let text = winner.text.clone();

        // The filter only emits probed tokens, so the commit must succeed.
        if !state.commit(&text) {
            return Ok(Generation {
                text: output,
                status: GenerationStatus::Failed,
                steps,
            });
        }
        output.push_str(&text);
        steps += 1;
    }
}

/// Highest-probability candidate; ties go to the earliest in the original
/// candidate order.
fn pick_winner(candidates: &[CandidateToken]) -> Option<&CandidateToken> {
    let mut best: Option<&CandidateToken> = None;
    for c in candidates {
        match best {
            Some(b) if c.logprob <= b.logprob => {}
            _ => best = Some(c),
        }
    }
    best
}
