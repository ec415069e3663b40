//! Error taxonomy for the parsing engine.
//!
//! Malformed command lines are never errors: unterminated quotes, stray
//! backslashes and unmatched substitution delimiters all normalize into
//! well-defined states. What remains is allocation failure, a plan request
//! for a line with nothing to run, and caller-supplied indices that do not
//! exist.

use std::collections::TryReserveError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CmdlineError {
    /// The line contains no program text (empty, or only separators).
    #[error("no command to execute")]
    EmptyCommand,

    /// A buffer could not be grown.
    #[error("out of memory building command line: {0}")]
    OutOfMemory(#[from] TryReserveError),

    /// An argument index outside the sequence was supplied.
    #[error("argument index {index} out of range for {len} arguments")]
    ArgumentIndex { index: usize, len: usize },
}

pub type Result<T, E = CmdlineError> = std::result::Result<T, E>;
