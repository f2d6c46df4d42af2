//! Candidate filtering, renormalization, and the fallback policy.
//!
//! [`filter_candidates`] is the bridge between the raw model distribution
//! and the grammar: candidates that would break the JSON grammar are
//! dropped, and the surviving log-probabilities are renormalized so they
//! describe a proper distribution over the valid subset. The model's
//! relative ranking among valid tokens is preserved; only the mass it
//! assigned to invalid tokens is discarded. Candidate order is preserved.
//!
//! When nothing survives, the [`FallbackPolicy`] synthesizes tokens that
//! guarantee forward progress: the innermost expected closer while
//! containers are open, or the `{` / `[` seeds when generation has not
//! started. Both carry deliberately low configured weights — a last-resort
//! signal, not a model preference. An empty return from the policy tells
//! the driver to stop.

use crate::grammar::GrammarState;
use crate::models::CandidateToken;

/// Weights for synthesized tokens, as log-probabilities.
///
/// Both values are tunables surfaced through `[generation]` config; the
/// defaults reproduce the behavior this decoder was tuned with but encode
/// no particular calibration.
#[derive(Debug, Clone, Copy)]
pub struct FallbackPolicy {
    /// Weight of a forced closing delimiter.
    pub forced_close_logprob: f64,
    /// Weight of each of the `{` / `[` seed candidates.
    pub seed_logprob: f64,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            forced_close_logprob: -10.0,
            seed_logprob: -1.0,
        }
    }
}

/// Filter `candidates` down to the grammar-valid subset and renormalize.
///
/// Each candidate is checked with a non-mutating probe; `state` itself is
/// never advanced here — the driver commits only the finally chosen token.
/// If no candidate survives, the fallback policy supplies forced tokens;
/// an empty result means generation cannot continue.
pub fn filter_candidates(
    state: &GrammarState,
    candidates: &[CandidateToken],
    policy: &FallbackPolicy,
) -> Vec<CandidateToken> {
    let mut valid: Vec<CandidateToken> = candidates
        .iter()
        .filter(|c| state.probe(&c.text).is_some())
        .cloned()
        .collect();

    if valid.is_empty() {
        valid = fallback_candidates(state, policy);
    }

    renormalize(valid)
}

/// Synthesize forced candidates when the model offered no valid token.
fn fallback_candidates(state: &GrammarState, policy: &FallbackPolicy) -> Vec<CandidateToken> {
    if let Some(closer) = state.frontier_top() {
        // The closer is not valid everywhere (e.g. a key awaiting its
        // colon); offer it only where the grammar accepts it.
        if state.probe(closer.token()).is_some() {
            return vec![CandidateToken::new(
                closer.token(),
                policy.forced_close_logprob,
            )];
        }
        return Vec::new();
    }

    if !state.has_content() {
        return vec![
            CandidateToken::new("{", policy.seed_logprob),
            CandidateToken::new("[", policy.seed_logprob),
        ];
    }

    Vec::new()
}

/// Rescale the set so linear probabilities sum to 1, storing each back as
/// `ln(p)`. Renormalizing an already-normalized set is the identity.
fn renormalize(mut candidates: Vec<CandidateToken>) -> Vec<CandidateToken> {
    let total: f64 = candidates.iter().map(|c| c.prob()).sum();
    if total <= 0.0 {
        return candidates;
    }
    for c in candidates.iter_mut() {
        c.logprob = (c.logprob.exp() / total).ln();
    }
    candidates
}
