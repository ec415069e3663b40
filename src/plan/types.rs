//! Types produced by the plan builder and consumed by a process launcher.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::parse::CmdContext;

/// Where a stream reads from or writes to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RedirectTarget {
    /// Inherit the shell's stream.
    #[default]
    Default,
    File {
        path: String,
        append: bool,
    },
    /// A reserved device name (`NUL`, `CON`, ...), kept as written.
    Device { name: String },
    /// On stdin: from the previous program. On stdout: to the next program.
    Pipe,
    /// Captured by the shell; `retain` keeps the data after the program exits.
    Buffer { retain: bool },
    Null,
    /// `2>&1` on stderr, `>&2` on stdout.
    DuplicateOther,
}

impl RedirectTarget {
    pub fn is_default(&self) -> bool {
        matches!(self, RedirectTarget::Default)
    }
}

impl fmt::Display for RedirectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedirectTarget::Default => f.write_str("inherit"),
            RedirectTarget::File {
                path,
                append: false,
            } => write!(f, "file {path}"),
            RedirectTarget::File { path, append: true } => write!(f, "append {path}"),
            RedirectTarget::Device { name } => write!(f, "device {name}"),
            RedirectTarget::Pipe => f.write_str("pipe"),
            RedirectTarget::Buffer { retain: false } => f.write_str("buffer"),
            RedirectTarget::Buffer { retain: true } => f.write_str("buffer (retained)"),
            RedirectTarget::Null => f.write_str("null"),
            RedirectTarget::DuplicateOther => f.write_str("other stream"),
        }
    }
}

/// How the outcome of one program gates the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NextProgram {
    /// `&` or newline: run next regardless
    Unconditional,
    /// `&&`: run next only if this one succeeded
    OnSuccess,
    /// `||`: run next only if this one failed
    OnFailure,
    /// `|`: run both, stdout piped into the next
    Concurrently,
}

impl NextProgram {
    /// Relation named by a separator token.
    pub fn from_separator(text: &str) -> Option<Self> {
        match text {
            "&" | "\n" => Some(NextProgram::Unconditional),
            "&&" => Some(NextProgram::OnSuccess),
            "||" => Some(NextProgram::OnFailure),
            "|" => Some(NextProgram::Concurrently),
            _ => None,
        }
    }

    /// The separator's shell syntax.
    pub fn as_str(&self) -> &'static str {
        match self {
            NextProgram::Unconditional => "&",
            NextProgram::OnSuccess => "&&",
            NextProgram::OnFailure => "||",
            NextProgram::Concurrently => "|",
        }
    }
}

/// One program invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecContext {
    /// Program and arguments, redirection tokens removed.
    pub cmd: CmdContext,
    pub stdin: RedirectTarget,
    pub stdout: RedirectTarget,
    pub stderr: RedirectTarget,
    pub wait_for_completion: bool,
    /// `&!!`: run detached on a second console.
    pub run_on_second_console: bool,
    /// Relation to the program after this one in the plan.
    pub next_relation: Option<NextProgram>,
}

impl ExecContext {
    pub fn new(cmd: CmdContext) -> Self {
        Self {
            cmd,
            stdin: RedirectTarget::Default,
            stdout: RedirectTarget::Default,
            stderr: RedirectTarget::Default,
            wait_for_completion: true,
            run_on_second_console: false,
            next_relation: None,
        }
    }

    /// The program name, if any argument survived redirection removal.
    pub fn program(&self) -> Option<&str> {
        self.cmd.args.first().map(|arg| arg.text())
    }
}

impl Default for ExecContext {
    fn default() -> Self {
        Self::new(CmdContext::default())
    }
}

/// Location of the cursor's argument within a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CurrentArg {
    /// Index into [`ExecPlan::commands`].
    pub program: usize,
    /// Index into that program's arguments; may equal their count when the
    /// cursor is on a new argument at the end of the line.
    pub arg: usize,
    pub offset: usize,
}

/// Every program of one line, in left-to-right order.
///
/// `commands[i].next_relation` links `commands[i]` to `commands[i + 1]`.
/// Individual contexts are reference counted so an execution layer can keep
/// one alive (for example while monitoring a detached child) after the plan
/// itself is dropped.
#[derive(Debug, Clone, Serialize)]
pub struct ExecPlan {
    pub commands: Vec<Arc<ExecContext>>,
    /// The whole line, for history and redisplay. Untouched by redirection
    /// extraction; a trailing background operator is removed.
    pub entire_command: ExecContext,
    pub wait_for_completion: bool,
    pub current: Option<CurrentArg>,
}

impl ExecPlan {
    pub fn first_command(&self) -> Option<&Arc<ExecContext>> {
        self.commands.first()
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    /// The program following `index` and how it is reached.
    pub fn next_program(&self, index: usize) -> Option<(NextProgram, &Arc<ExecContext>)> {
        let relation = self.commands.get(index)?.next_relation?;
        Some((relation, self.commands.get(index + 1)?))
    }
}
