//! Core data types for constrained generation.

use serde::Serialize;

/// A candidate next token offered by the token source.
///
/// On input to the filter, `logprob` is the raw model log-probability. After
/// filtering, it holds the log of the probability renormalized over the
/// grammar-valid subset, so filter output feeds back into the filter
/// unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateToken {
    pub text: String,
    pub logprob: f64,
}

impl CandidateToken {
    pub fn new(text: impl Into<String>, logprob: f64) -> Self {
        Self {
            text: text.into(),
            logprob,
        }
    }

    /// Linear probability.
    pub fn prob(&self) -> f64 {
        self.logprob.exp()
    }
}

/// Terminal status of a generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    /// The output is a syntactically complete JSON value.
    Complete,
    /// The accepted-token budget was reached first.
    Exhausted,
    /// A step produced no candidates and no fallback applied.
    Failed,
}

/// Outcome of a generation request.
///
/// `text` holds whatever was accumulated; `Exhausted` and `Failed` return
/// the partial output rather than discarding it.
#[derive(Debug, Clone, Serialize)]
pub struct Generation {
    pub text: String,
    pub status: GenerationStatus,
    /// Number of accepted tokens.
    pub steps: usize,
}
