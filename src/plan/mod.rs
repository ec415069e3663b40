//! Execution plans: a tokenized line split into programs linked by
//! control-flow relations.

pub mod redirect;
pub mod types;

pub use redirect::ProgramSplit;
pub use types::{CurrentArg, ExecContext, ExecPlan, NextProgram, RedirectTarget};

use std::sync::Arc;

use log::debug;

use crate::error::{CmdlineError, Result};
use crate::parse::{CmdContext, Syntax, is_program_separator};

/// How a trailing separator detaches the last program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Background {
    /// `&`
    Plain,
    /// `&!`: no input, output captured by the shell.
    Buffered,
    /// `&!!`: as `&`, on a second console.
    SecondConsole,
}

impl Background {
    fn from_separator(text: &str) -> Option<Self> {
        match text {
            "&" => Some(Background::Plain),
            "&!" => Some(Background::Buffered),
            "&!!" => Some(Background::SecondConsole),
            _ => None,
        }
    }

    fn apply(self, ctx: &mut ExecContext) {
        ctx.wait_for_completion = false;
        match self {
            Background::Plain => {}
            Background::Buffered => {
                if ctx.stdin.is_default() {
                    ctx.stdin = RedirectTarget::Null;
                }
                for stream in [&mut ctx.stdout, &mut ctx.stderr] {
                    if stream.is_default() {
                        *stream = RedirectTarget::Buffer { retain: true };
                    }
                }
            }
            Background::SecondConsole => ctx.run_on_second_console = true,
        }
    }
}

/// Record the relation from `prev` to the program that follows it.
fn link(prev: &mut ExecContext, relation: NextProgram) {
    prev.next_relation = Some(relation);
    if relation == NextProgram::Concurrently {
        if prev.stdout.is_default() {
            prev.stdout = RedirectTarget::Pipe;
        }
        prev.wait_for_completion = false;
    }
}

impl Syntax {
    /// Split a tokenized line into its programs.
    ///
    /// Runs of separators between programs are skipped; the last separator
    /// of a run decides the relation. A final `&`, `&!` or `&!!` runs the
    /// last program in the background and is dropped from
    /// [`ExecPlan::entire_command`].
    pub fn build_plan(&self, seq: &CmdContext) -> Result<ExecPlan> {
        if seq.is_empty() {
            return Err(CmdlineError::EmptyCommand);
        }
        let mut entire_command = ExecContext::new(seq.deep_copy()?);

        let mut programs: Vec<ExecContext> = Vec::new();
        let mut current = None;
        let mut separator: Option<&str> = None;
        let mut index = 0;
        while index < seq.len() {
            let arg = &seq.args[index];
            if !arg.quoted && is_program_separator(arg.text(), index + 1 == seq.len()) {
                separator = Some(arg.text());
                index += 1;
                continue;
            }

            let relation = separator.take().and_then(NextProgram::from_separator);
            if let (Some(prev), Some(relation)) = (programs.last_mut(), relation) {
                link(prev, relation);
            }

            let ProgramSplit {
                mut context,
                consumed,
                current_arg,
            } = self.split_one_program(seq, index)?;
            if relation == Some(NextProgram::Concurrently) && context.stdin.is_default() {
                context.stdin = RedirectTarget::Pipe;
            }
            if let Some(arg) = current_arg {
                current = Some(CurrentArg {
                    program: programs.len(),
                    arg,
                    offset: seq.current_offset,
                });
            }
            programs.try_reserve(1)?;
            programs.push(context);
            index += consumed;
        }

        let Some(last) = programs.last_mut() else {
            return Err(CmdlineError::EmptyCommand);
        };

        let background = separator.and_then(Background::from_separator);
        if let Some(background) = background {
            background.apply(last);
            let cmd = &mut entire_command.cmd;
            cmd.args.pop();
            cmd.current_index = cmd.current_index.min(cmd.len());
            background.apply(&mut entire_command);
        }

        let mut commands = Vec::new();
        commands.try_reserve_exact(programs.len())?;
        commands.extend(programs.into_iter().map(Arc::new));

        debug!(
            "plan: {} program(s), background {:?}",
            commands.len(),
            background
        );
        Ok(ExecPlan {
            commands,
            entire_command,
            wait_for_completion: background.is_none(),
            current,
        })
    }
}
