//! cmdplan: command-line parsing for a Windows-style command shell.
//!
//! One line of input becomes an argument sequence with quoting metadata
//! ([`parse::CmdContext`]), then an execution plan of programs linked by
//! control-flow relations ([`plan::ExecPlan`]). A separate scanner finds
//! nested `` `cmd` `` and `$(cmd)` regions so an evaluator can run them
//! innermost-first. Nothing here executes programs or opens files.
//!
//! # Architecture
//!
//! - **[`parse`]**: tokenizer, line reconstruction, sequence utilities and
//!   the substitution scanner, all parameterised by a [`parse::Syntax`].
//! - **[`plan`]**: redirection extraction and execution-plan building.
//! - **[`config`]**: embedded defaults plus user overlay merge.
//! - **[`error`]**: the crate's error type.
//! - **[`logging`]**: file logger setup and per-line plan records.

/// Configuration types, loading, and overlay merge logic.
pub mod config;
/// Error types for parsing and plan construction.
pub mod error;
/// File-based logging for the CLI.
pub mod logging;
/// Tokenizer, reconstructor, argument utilities and substitution scanner.
pub mod parse;
/// Execution contexts and plans.
pub mod plan;

use error::Result;
use parse::{CmdContext, Rendered, SubstitutionSet, Syntax};
use plan::{ExecPlan, ProgramSplit};

/// Tokenize `line` with the default syntax. See [`Syntax::tokenize`].
pub fn tokenize(line: &str, cursor: usize) -> Result<CmdContext> {
    Syntax::shared_default().tokenize(line, cursor)
}

/// Render a sequence back into a line. See [`Syntax::render`].
pub fn render(ctx: &CmdContext, strip_escapes: bool) -> Rendered {
    Syntax::shared_default().render(ctx, strip_escapes)
}

/// Scan `line` for substitution regions. See [`Syntax::find_substitutions`].
pub fn find_substitutions(line: &str) -> SubstitutionSet {
    Syntax::shared_default().find_substitutions(line)
}

/// Slice one program out of `seq`. See [`Syntax::split_one_program`].
pub fn split_one_program(seq: &CmdContext, start: usize) -> Result<ProgramSplit> {
    Syntax::shared_default().split_one_program(seq, start)
}

/// Build the plan for a tokenized line. See [`Syntax::build_plan`].
pub fn build_plan(seq: &CmdContext) -> Result<ExecPlan> {
    Syntax::shared_default().build_plan(seq)
}

/// Tokenize `line` and build its plan with the default syntax.
///
/// This is the main entry point for tests and simple usage. For a user
/// configuration, build a [`Syntax`] with [`Syntax::from_config`].
pub fn parse_line(line: &str, cursor: usize) -> Result<ExecPlan> {
    let syntax = Syntax::shared_default();
    syntax.build_plan(&syntax.tokenize(line, cursor)?)
}
