//! Confirmation seam for soft-gate overrides.
//!
//! The gate reports which soft checks need accepting; how the acceptance is
//! obtained is this trait's problem, so closure logic stays testable without
//! a terminal attached.

use anyhow::{Context, Result};
use std::io::{BufRead, Write};

pub trait Confirm {
    /// Ask the user an accept/decline question. `Ok(false)` is a decline,
    /// not an error.
    fn confirm(&mut self, question: &str) -> Result<bool>;
}

/// Interactive prompt on stdin/stdout.
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&mut self, question: &str) -> Result<bool> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        write!(out, "{question} [y/N] ").context("write prompt")?;
        out.flush().context("flush prompt")?;

        let stdin = std::io::stdin();
        let mut answer = String::new();
        stdin
            .lock()
            .read_line(&mut answer)
            .context("read confirmation")?;
        let answer = answer.trim().to_ascii_lowercase();
        Ok(answer == "y" || answer == "yes" || answer == "s" || answer == "si")
    }
}

/// Accept everything; used by `--yes`.
pub struct AutoAccept;

impl Confirm for AutoAccept {
    fn confirm(&mut self, _question: &str) -> Result<bool> {
        Ok(true)
    }
}
