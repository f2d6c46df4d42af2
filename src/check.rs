use std::io::Read;

use anyhow::{bail, Result};

use crate::grammar::GrammarState;

/// Validate a token sequence against the JSON grammar.
///
/// Feeds each token through a fresh grammar state, printing an accept or
/// reject verdict per token; rejected tokens are skipped, matching how the
/// candidate filter treats them during generation. Exits with an error when
/// any token was rejected or the sequence leaves the document incomplete.
pub fn run_check(tokens: &[String]) -> Result<()> {
    let tokens = if tokens.is_empty() {
        if atty::is(atty::Stream::Stdin) {
            bail!("No tokens given. Pass tokens as arguments or pipe them on stdin.");
        }
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf.split_whitespace().map(|t| t.to_string()).collect()
    } else {
        tokens.to_vec()
    };

    if tokens.is_empty() {
        bail!("No tokens given. Pass tokens as arguments or pipe them on stdin.");
    }

    let mut state = GrammarState::new();
    let mut rejected = 0usize;

    println!("{:<16} {:<8} DEPTH", "TOKEN", "RESULT");
    for token in &tokens {
        if state.commit(token) {
            println!("{:<16} {:<8} {}", token, "accept", state.depth());
        } else {
            println!("{:<16} {:<8} {}", token, "reject", state.depth());
            rejected += 1;
        }
    }

    if rejected > 0 {
        bail!("{} token(s) rejected.", rejected);
    }
    if !state.is_complete() {
        bail!(
            "Incomplete JSON value ({} container(s) still open).",
            state.depth()
        );
    }

    println!("Complete JSON value.");
    Ok(())
}
