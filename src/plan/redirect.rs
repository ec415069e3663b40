//! Slice one program out of an argument sequence, turning redirection
//! operators into stream targets.

use log::debug;

use super::types::{ExecContext, RedirectTarget};
use crate::error::{CmdlineError, Result};
use crate::parse::{Argument, CmdContext, Syntax, is_program_separator, remove_escapes};

/// A redirection operator found at the start of an unquoted argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RedirectOp {
    StdinFile,
    StdoutFile { append: bool },
    StdoutToStderr,
    StderrFile { append: bool },
    StderrToStdout,
}

/// Longest prefixes first so `2>>` is not read as `2>`.
const REDIRECT_PREFIXES: &[(&str, RedirectOp)] = &[
    ("2>&1", RedirectOp::StderrToStdout),
    ("2>>", RedirectOp::StderrFile { append: true }),
    ("2>", RedirectOp::StderrFile { append: false }),
    ("1>&2", RedirectOp::StdoutToStderr),
    ("1>>", RedirectOp::StdoutFile { append: true }),
    ("1>", RedirectOp::StdoutFile { append: false }),
    (">&2", RedirectOp::StdoutToStderr),
    (">>", RedirectOp::StdoutFile { append: true }),
    (">", RedirectOp::StdoutFile { append: false }),
    ("<", RedirectOp::StdinFile),
];

impl RedirectOp {
    /// Match an operator prefix, returning it with the remaining text.
    fn parse(text: &str) -> Option<(Self, &str)> {
        REDIRECT_PREFIXES
            .iter()
            .find_map(|(prefix, op)| text.strip_prefix(prefix).map(|rest| (*op, rest)))
    }

    fn takes_target(self) -> bool {
        !matches!(self, RedirectOp::StdoutToStderr | RedirectOp::StderrToStdout)
    }

    fn append(self) -> bool {
        matches!(
            self,
            RedirectOp::StdoutFile { append: true } | RedirectOp::StderrFile { append: true }
        )
    }
}

/// Result of slicing one program from a sequence.
#[derive(Debug, Clone)]
pub struct ProgramSplit {
    pub context: ExecContext,
    /// Arguments consumed from the sequence, not counting the separator
    /// that ended the program.
    pub consumed: usize,
    /// Index within `context.cmd` of the sequence's current argument, when
    /// that argument belongs to this program.
    pub current_arg: Option<usize>,
}

fn is_separator_arg(seq: &CmdContext, index: usize) -> bool {
    let arg = &seq.args[index];
    !arg.quoted && is_program_separator(arg.text(), index + 1 == seq.len())
}

/// Trim one pair of surrounding double quotes.
fn trim_quotes(text: &str) -> &str {
    match text.strip_prefix('"') {
        Some(inner) => inner.strip_suffix('"').unwrap_or(inner),
        None => text,
    }
}

impl ExecContext {
    fn apply_redirect(&mut self, op: RedirectOp, target: Option<RedirectTarget>) {
        match (op, target) {
            (RedirectOp::StdoutToStderr, _) => {
                self.stdout = RedirectTarget::DuplicateOther;
                if self.stderr == RedirectTarget::DuplicateOther {
                    self.stderr = RedirectTarget::Default;
                }
            }
            (RedirectOp::StderrToStdout, _) => {
                self.stderr = RedirectTarget::DuplicateOther;
                if self.stdout == RedirectTarget::DuplicateOther {
                    self.stdout = RedirectTarget::Default;
                }
            }
            (RedirectOp::StdinFile, Some(target)) => self.stdin = target,
            (RedirectOp::StdoutFile { .. }, Some(target)) => self.stdout = target,
            (RedirectOp::StderrFile { .. }, Some(target)) => self.stderr = target,
            (op, None) => debug!("{op:?} without a target ignored"),
        }
    }
}

impl Syntax {
    /// Resolve redirection target text to a file or a reserved device.
    fn resolve_target(&self, raw: &str, append: bool) -> Option<RedirectTarget> {
        let unescaped = remove_escapes(raw, self.escape_char);
        let text = trim_quotes(&unescaped);
        if text.is_empty() {
            return None;
        }
        Some(if self.is_device_name(text) {
            RedirectTarget::Device {
                name: text.to_string(),
            }
        } else {
            RedirectTarget::File {
                path: text.to_string(),
                append,
            }
        })
    }

    /// Slice the program starting at `start`.
    ///
    /// The program runs up to the next unquoted separator argument (`&`,
    /// `&&`, `||`, `|`, newline, or a final `&!` / `&!!`) or the end of the
    /// sequence. Unquoted arguments starting with a redirection operator are
    /// removed and update the streams instead. The target is the text after
    /// the operator or, when there is none, the whole next argument.
    /// Redirecting a stream again replaces the earlier target.
    pub fn split_one_program(&self, seq: &CmdContext, start: usize) -> Result<ProgramSplit> {
        if start > seq.len() {
            return Err(CmdlineError::ArgumentIndex {
                index: start,
                len: seq.len(),
            });
        }
        let end = (start..seq.len())
            .find(|&index| is_separator_arg(seq, index))
            .unwrap_or(seq.len());

        let mut context = ExecContext::new(CmdContext::new());
        let mut current_arg = None;
        let mut index = start;
        while index < end {
            let arg = &seq.args[index];
            if !arg.quoted
                && let Some((op, rest)) = RedirectOp::parse(arg.text())
            {
                let mut span = 1;
                let target = if !op.takes_target() {
                    None
                } else if !rest.is_empty() {
                    self.resolve_target(rest, op.append())
                } else if index + 1 < end {
                    span = 2;
                    self.resolve_target(seq.args[index + 1].text(), op.append())
                } else {
                    None
                };
                context.apply_redirect(op, target);
                index += span;
                continue;
            }

            if index == seq.current_index {
                current_arg = Some(context.cmd.len());
            }
            push_argument(&mut context.cmd, arg)?;
            index += 1;
        }

        if seq.current_index == end && end == seq.len() && current_arg.is_none() && end > start {
            current_arg = Some(context.cmd.len());
        }
        if let Some(arg) = current_arg {
            context.cmd.current_index = arg;
            context.cmd.current_offset = seq.current_offset;
        } else {
            context.cmd.current_index = context.cmd.len();
        }
        context.cmd.trailing_chars = end == seq.len() && seq.trailing_chars;

        debug!(
            "program at {start}: {} argument(s), {} consumed",
            context.cmd.len(),
            end - start
        );
        Ok(ProgramSplit {
            context,
            consumed: end - start,
            current_arg,
        })
    }
}

fn push_argument(cmd: &mut CmdContext, arg: &Argument) -> Result<()> {
    cmd.args.try_reserve(1)?;
    cmd.args.push(arg.clone());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(line: &str) -> ProgramSplit {
        let syntax = Syntax::default();
        let seq = syntax.tokenize(line, 0).unwrap();
        syntax.split_one_program(&seq, 0).unwrap()
    }

    fn file(path: &str, append: bool) -> RedirectTarget {
        RedirectTarget::File {
            path: path.into(),
            append,
        }
    }

    #[test]
    fn operator_prefixes() {
        assert_eq!(RedirectOp::parse("2>&1"), Some((RedirectOp::StderrToStdout, "")));
        assert_eq!(
            RedirectOp::parse("2>>x"),
            Some((RedirectOp::StderrFile { append: true }, "x"))
        );
        assert_eq!(
            RedirectOp::parse(">>x"),
            Some((RedirectOp::StdoutFile { append: true }, "x"))
        );
        assert_eq!(RedirectOp::parse("<in"), Some((RedirectOp::StdinFile, "in")));
        assert_eq!(RedirectOp::parse("12"), None);
        assert_eq!(RedirectOp::parse("2"), None);
    }

    #[test]
    fn plain_program() {
        let s = split("dir /s");
        assert_eq!(s.context.cmd.texts(), vec!["dir", "/s"]);
        assert_eq!(s.consumed, 2);
        assert!(s.context.stdout.is_default());
    }

    #[test]
    fn stops_at_separator() {
        let s = split("a b && c");
        assert_eq!(s.context.cmd.texts(), vec!["a", "b"]);
        assert_eq!(s.consumed, 2);
    }

    #[test]
    fn quoted_separator_is_an_argument() {
        let s = split("echo \"&&\" x");
        assert_eq!(s.context.cmd.texts(), vec!["echo", "&&", "x"]);
    }

    #[test]
    fn target_in_same_argument() {
        let s = split("dir >out.txt");
        assert_eq!(s.context.cmd.texts(), vec!["dir"]);
        assert_eq!(s.context.stdout, file("out.txt", false));
    }

    #[test]
    fn target_in_next_argument() {
        let s = split("dir > out.txt /b");
        assert_eq!(s.context.cmd.texts(), vec!["dir", "/b"]);
        assert_eq!(s.context.stdout, file("out.txt", false));
        assert_eq!(s.consumed, 4);
    }

    #[test]
    fn every_stream() {
        let s = split("sort <in.txt 1>>out.txt 2>err.txt");
        assert_eq!(s.context.cmd.texts(), vec!["sort"]);
        assert_eq!(s.context.stdin, file("in.txt", false));
        assert_eq!(s.context.stdout, file("out.txt", true));
        assert_eq!(s.context.stderr, file("err.txt", false));
    }

    #[test]
    fn later_redirect_overrides() {
        let s = split("dir >a.txt >>b.txt");
        assert_eq!(s.context.stdout, file("b.txt", true));
    }

    #[test]
    fn quoted_target_text() {
        let s = split("dir >\"my file.txt\"");
        assert_eq!(s.context.stdout, file("my file.txt", false));
        let s = split("dir > \"my file.txt\"");
        assert_eq!(s.context.stdout, file("my file.txt", false));
    }

    #[test]
    fn escaped_target_text() {
        let s = split("dir >a^&b.txt");
        assert_eq!(s.context.stdout, file("a&b.txt", false));
    }

    #[test]
    fn device_target() {
        let s = split("dir >nul 2>CON:");
        assert_eq!(s.context.stdout, RedirectTarget::Device { name: "nul".into() });
        assert_eq!(s.context.stderr, RedirectTarget::Device { name: "CON:".into() });
    }

    #[test]
    fn duplication_cancels_opposite() {
        let s = split("prog 2>&1 1>&2");
        assert_eq!(s.context.stdout, RedirectTarget::DuplicateOther);
        assert_eq!(s.context.stderr, RedirectTarget::Default);

        let s = split("prog >&2 2>&1");
        assert_eq!(s.context.stdout, RedirectTarget::Default);
        assert_eq!(s.context.stderr, RedirectTarget::DuplicateOther);
    }

    #[test]
    fn duplication_takes_no_target() {
        let s = split("prog 2>&1 arg");
        assert_eq!(s.context.cmd.texts(), vec!["prog", "arg"]);
    }

    #[test]
    fn missing_target_is_dropped() {
        let s = split("dir >a.txt >");
        assert_eq!(s.context.cmd.texts(), vec!["dir"]);
        assert_eq!(s.context.stdout, file("a.txt", false));

        let s = split("sort <");
        assert_eq!(s.context.cmd.texts(), vec!["sort"]);
        assert!(s.context.stdin.is_default());
    }

    #[test]
    fn target_not_taken_across_separator() {
        let s = split("dir > | more");
        assert_eq!(s.context.cmd.texts(), vec!["dir"]);
        assert!(s.context.stdout.is_default());
        assert_eq!(s.consumed, 2);
    }

    #[test]
    fn quoted_operator_is_an_argument() {
        let s = split("echo \">\" x");
        assert_eq!(s.context.cmd.texts(), vec!["echo", ">", "x"]);
        assert!(s.context.stdout.is_default());
    }

    #[test]
    fn trailing_background_marker_ends_program() {
        let s = split("job &!");
        assert_eq!(s.context.cmd.texts(), vec!["job"]);
        let s = split("echo &! x");
        assert_eq!(s.context.cmd.texts(), vec!["echo", "&!", "x"]);
    }

    #[test]
    fn current_argument_is_mapped() {
        let syntax = Syntax::default();
        let seq = syntax.tokenize("dir >out.txt /b", 13).unwrap();
        assert_eq!(seq.current_index, 2);
        let s = syntax.split_one_program(&seq, 0).unwrap();
        assert_eq!(s.current_arg, Some(1));
        assert_eq!(s.context.cmd.current_index, 1);

        let seq = syntax.tokenize("dir >out.txt", 7).unwrap();
        let s = syntax.split_one_program(&seq, 0).unwrap();
        assert_eq!(s.current_arg, None);
    }

    #[test]
    fn start_out_of_range() {
        let syntax = Syntax::default();
        let seq = syntax.tokenize("a", 0).unwrap();
        assert!(syntax.split_one_program(&seq, 1).is_ok());
        assert!(syntax.split_one_program(&seq, 2).is_err());
    }
}
