//! Rebuild a command line from an argument sequence.

use std::borrow::Cow;

use serde::Serialize;

use super::context::remove_escapes;
use super::syntax::Syntax;
use super::types::CmdContext;

/// A rendered line plus the span of the current argument within it.
///
/// Offsets are character offsets into `text`. The span includes the
/// argument's quotes; `current_end` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rendered {
    pub text: String,
    pub current_start: usize,
    pub current_end: usize,
}

impl Syntax {
    /// Join arguments with single spaces, restoring quotes from each
    /// argument's flags. With `strip_escapes`, each escape marker and the
    /// character after it collapse to that character.
    ///
    /// When the cursor is on a new argument past the end, a separating space
    /// is appended and the span is empty at the end of the text.
    pub fn render(&self, ctx: &CmdContext, strip_escapes: bool) -> Rendered {
        let mut text = String::new();
        let mut len = 0;
        let mut current_start = 0;
        let mut current_end = 0;

        for (index, arg) in ctx.args.iter().enumerate() {
            if index > 0 {
                text.push(' ');
                len += 1;
            }
            if index == ctx.current_index {
                current_start = len;
            }
            if arg.quoted {
                text.push('"');
                len += 1;
            }
            let body = if strip_escapes {
                remove_escapes(arg.text(), self.escape_char)
            } else {
                Cow::Borrowed(arg.text())
            };
            text.push_str(&body);
            len += body.chars().count();
            if arg.quoted && arg.quote_terminated {
                text.push('"');
                len += 1;
            }
            if index == ctx.current_index {
                current_end = len;
            }
        }

        if ctx.current_index >= ctx.args.len() {
            if !ctx.args.is_empty() {
                text.push(' ');
                len += 1;
            }
            current_start = len;
            current_end = len;
        }

        Rendered {
            text,
            current_start,
            current_end,
        }
    }
}
