//! # Guardrail
//!
//! Grammar-constrained JSON generation for language models.
//!
//! Guardrail steers a token-prediction source (an OpenAI-compatible chat
//! completions endpoint) toward syntactically valid JSON: at every step the
//! model's candidate tokens are filtered through an incremental JSON
//! grammar, the surviving probabilities are renormalized, and the best
//! valid token is committed — so a completed output always parses.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐ prompt+output ┌─────────────┐
//! │  Driver  │──────────────▶│ TokenSource │
//! │  (loop)  │◀──────────────│ (HTTP)      │
//! └─┬────▲───┘  candidates   └─────────────┘
//!   │    │
//!   │    │ filtered, renormalized (fallback on empty)
//!   │  ┌─┴────────────────────┐
//!   │  │ Filter + Fallback    │
//!   │  └─┬────────────────────┘
//!   │    │ probe
//!   ▼    ▼
//! ┌──────────────┐
//! │ GrammarState │  frontier stack + mode
//! └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rail check '{' '"name"' ':' '"Ada"' '}'    # offline grammar validation
//! rail generate "Describe a person as JSON"  # constrained generation
//! rail serve                                 # HTTP adapter
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`grammar`] | Incremental JSON grammar state machine |
//! | [`filter`] | Candidate filtering, renormalization, fallback policy |
//! | [`driver`] | Generation loop over a token source |
//! | [`provider`] | Token source abstraction (OpenAI-compatible client) |
//! | [`server`] | HTTP adapter |

pub mod config;
pub mod driver;
pub mod filter;
pub mod grammar;
pub mod models;
pub mod provider;
pub mod server;
