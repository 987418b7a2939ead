//! Status inference from captured session output.
//!
//! Agent CLIs don't report their state; the daemon infers it from what
//! they print. Only the recent tail matters, and the checks are ordered:
//! an error trumps a pending question, a question trumps a spinner.

use once_cell::sync::Lazy;
use regex::Regex;

use helmsman_control::TerminalStatus;

/// How many trailing lines of output are considered.
const TAIL_LINES: usize = 20;

static RE_ERROR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)(^error[:!]|^fatal:|panicked at|traceback \(most recent)").unwrap());

static RE_NEEDS_INPUT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?mi)(\[y/n\]|\(y/N\)|\(Y/n\)|press enter|waiting for (your )?input|\?\s*$)")
        .unwrap()
});

static RE_BUSY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?mi)(thinking|working|generating|running\.\.\.|[⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏]|\.\.\.\s*$)").unwrap()
});

static RE_IDLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)(^\$\s*$|^❯\s*$|^>\s*$|^[-\w]+[%#]\s*$)").unwrap());

/// Infer a status from output, or `None` when the tail is undecidable
/// (the caller keeps the previous status in that case).
pub fn infer(output: &str) -> Option<TerminalStatus> {
    let tail: Vec<&str> = output.lines().rev().take(TAIL_LINES).collect();
    let tail = tail.into_iter().rev().collect::<Vec<_>>().join("\n");

    if RE_ERROR.is_match(&tail) {
        return Some(TerminalStatus::Error);
    }
    if RE_NEEDS_INPUT.is_match(&tail) {
        return Some(TerminalStatus::NeedsInput);
    }
    if RE_BUSY.is_match(&tail) {
        return Some(TerminalStatus::Busy);
    }
    if RE_IDLE.is_match(&tail) {
        return Some(TerminalStatus::Idle);
    }
    None
}
