//! Line tokenizer: raw text to an argument sequence with quoting metadata.
//!
//! A single left-to-right pass appends every argument's text into one
//! buffer and records the boundaries, then freezes the buffer into a shared
//! allocation that all arguments of the line view.
//!
//! Quote and backslash handling follows the conventions Windows programs
//! use to split their own command lines, because the arguments are handed
//! to such programs verbatim:
//!
//! 1. Backslashes not followed by a quote or an argument break are copied.
//! 2. An odd run of backslashes before a quote makes the quote literal;
//!    backslashes and quote are copied.
//! 3. An even run before the quote that closes an argument's initial quote,
//!    with the argument ending right there, is copied. The quote itself is
//!    recorded as `quote_terminated` rather than copied.
//! 4. As (3) but with more text after the quote (`"C:\Program Files"\foo`):
//!    half the backslashes are copied and the quote moves to the end of the
//!    argument. When another bare quote follows in the same argument the
//!    quote cannot move without re-pairing with it, so the backslashes and
//!    the quote are copied and the later quotes open ordinary regions.
//! 5. Backslashes directly before a break while a quote is waiting to move
//!    to the end are doubled, so the moved quote is not escaped by them.

use std::ops::Range;
use std::sync::Arc;

use log::trace;

use super::syntax::{Syntax, match_break_operator};
use super::types::{Argument, CmdContext};
use crate::error::Result;

struct PendingArg {
    range: Range<usize>,
    quoted: bool,
    quote_terminated: bool,
}

/// State of the argument currently being written.
#[derive(Default)]
struct ArgState {
    active: bool,
    /// Byte offset of the argument in the output buffer.
    start: usize,
    /// Characters written so far.
    written: usize,
    quoted: bool,
    /// Inside the region opened by the argument's initial quote.
    initial_open: bool,
    /// Inside a region opened by any other quote.
    region_open: bool,
    /// The initial quote closed early and will be re-emitted at the end.
    relocating: bool,
    quote_terminated: bool,
}

impl ArgState {
    fn quoting(&self) -> bool {
        self.initial_open || self.region_open
    }

    fn has_content(&self) -> bool {
        self.active && (self.written > 0 || self.quoted)
    }
}

struct Scanner<'a> {
    chars: &'a [char],
    escape: char,
    cursor: usize,
    out: String,
    done: Vec<PendingArg>,
    arg: ArgState,
    current: Option<(usize, usize)>,
}

impl<'a> Scanner<'a> {
    fn new(chars: &'a [char], escape: char, cursor: usize) -> Self {
        Self {
            chars,
            escape,
            cursor,
            out: String::new(),
            done: Vec::new(),
            arg: ArgState::default(),
            current: None,
        }
    }

    fn push(&mut self, c: char) -> Result<()> {
        self.out.try_reserve(c.len_utf8())?;
        self.out.push(c);
        self.arg.written += 1;
        Ok(())
    }

    fn push_backslashes(&mut self, count: usize) -> Result<()> {
        for _ in 0..count {
            self.push('\\')?;
        }
        Ok(())
    }

    fn begin_arg(&mut self) {
        self.arg = ArgState {
            active: true,
            start: self.out.len(),
            ..ArgState::default()
        };
    }

    fn end_arg(&mut self) -> Result<()> {
        if self.arg.has_content() {
            self.done.try_reserve(1)?;
            self.done.push(PendingArg {
                range: self.arg.start..self.out.len(),
                quoted: self.arg.quoted,
                quote_terminated: self.arg.quote_terminated,
            });
        }
        self.arg = ArgState::default();
        Ok(())
    }

    /// Record the cursor position once the scan reaches or passes it.
    ///
    /// Escape pairs and backslash runs are consumed in one step, so the scan
    /// can land past the cursor; the offset is pulled back by the overshoot.
    fn locate(&mut self, pos: usize) {
        if self.current.is_none() && pos >= self.cursor {
            let (index, offset) = self.position_here();
            self.current = Some((index, offset.saturating_sub(pos - self.cursor)));
        }
    }

    fn position_here(&self) -> (usize, usize) {
        if self.arg.active {
            (self.done.len(), self.arg.written)
        } else {
            (self.done.len(), 0)
        }
    }

    fn at_break(&self, pos: usize) -> bool {
        pos >= self.chars.len()
            || self.chars[pos] == ' '
            || match_break_operator(self.chars, pos).is_some()
    }

    fn backslash_run(&self, pos: usize) -> usize {
        self.chars[pos..].iter().take_while(|&&c| c == '\\').count()
    }

    /// Process the character at `pos` inside an active argument and return
    /// the position of the next unprocessed character.
    fn step(&mut self, pos: usize) -> Result<usize> {
        let c = self.chars[pos];

        if c == self.escape {
            if let Some(&next) = self.chars.get(pos + 1) {
                self.push(c)?;
                self.push(next)?;
                return Ok(pos + 2);
            }
            // A trailing marker would escape the quote restored at the end.
            if !self.arg.quote_terminated {
                self.push(c)?;
            }
            return Ok(pos + 1);
        }

        if c == '\\' {
            let run = self.backslash_run(pos);
            let next = pos + run;
            if self.chars.get(next) == Some(&'"') {
                if run % 2 == 1 {
                    self.push_backslashes(run)?;
                    self.push('"')?;
                    return Ok(next + 1);
                }
                if self.arg.initial_open {
                    return self.close_initial_quote(next, run);
                }
                self.push_backslashes(run)?;
                return Ok(next);
            }
            if self.arg.relocating && !self.arg.quoting() && self.at_break(next) {
                self.push_backslashes(run * 2)?;
            } else {
                self.push_backslashes(run)?;
            }
            return Ok(next);
        }

        if c == '"' {
            if self.arg.initial_open {
                return self.close_initial_quote(pos, 0);
            }
            if self.arg.region_open {
                self.arg.region_open = false;
                if self.arg.quoted && !self.arg.relocating && self.at_break(pos + 1) {
                    self.arg.quote_terminated = true;
                } else {
                    self.push('"')?;
                }
                return Ok(pos + 1);
            }
            self.arg.region_open = true;
            self.push('"')?;
            return Ok(pos + 1);
        }

        if !self.arg.quoting()
            && let Some(op) = match_break_operator(self.chars, pos)
        {
            if self.arg.has_content() {
                self.end_arg()?;
                self.begin_arg();
            }
            for ch in op.text.chars() {
                self.push(ch)?;
            }
            if op.terminates {
                self.end_arg()?;
            }
            return Ok(pos + op.text.chars().count());
        }

        self.push(c)?;
        Ok(pos + 1)
    }

    /// Handle the quote at `quote_pos` that closes the argument's initial
    /// quote, preceded by an even run of `backslashes`.
    fn close_initial_quote(&mut self, quote_pos: usize, backslashes: usize) -> Result<usize> {
        self.arg.initial_open = false;
        let after = quote_pos + 1;

        if self.at_break(after) {
            self.push_backslashes(backslashes)?;
            self.arg.quote_terminated = true;
        } else if self.quote_follows(after) {
            // `"."=="."`: this quote is text. A region closing right at the
            // end of the argument still records the terminator.
            self.push_backslashes(backslashes)?;
            self.push('"')?;
        } else {
            self.push_backslashes(backslashes / 2)?;
            self.arg.relocating = true;
            self.arg.quote_terminated = true;
        }
        Ok(after)
    }

    /// Whether a bare quote (not made literal by an odd backslash run or
    /// the escape marker) appears before the argument starting at `from`
    /// ends.
    fn quote_follows(&self, from: usize) -> bool {
        let mut pos = from;
        while pos < self.chars.len() && !self.at_break(pos) {
            let c = self.chars[pos];
            if c == self.escape {
                pos += 2;
            } else if c == '\\' {
                let run = self.backslash_run(pos);
                let next = pos + run;
                if self.chars.get(next) != Some(&'"') {
                    pos = next;
                } else if run % 2 == 0 {
                    return true;
                } else {
                    pos = next + 1;
                }
            } else if c == '"' {
                return true;
            } else {
                pos += 1;
            }
        }
        false
    }

    fn finish(mut self, trailing_chars: bool) -> Result<CmdContext> {
        if self.current.is_none() {
            self.current = Some(self.position_here());
        }
        self.end_arg()?;

        let buffer: Arc<str> = Arc::from(self.out);
        let mut args = Vec::new();
        args.try_reserve_exact(self.done.len())?;
        args.extend(self.done.into_iter().map(|pending| {
            Argument::from_buffer(
                Arc::clone(&buffer),
                pending.range,
                pending.quoted,
                pending.quote_terminated,
            )
        }));

        let (current_index, current_offset) = self.current.unwrap_or_default();
        Ok(CmdContext {
            args,
            current_index,
            current_offset,
            trailing_chars,
        })
    }
}

/// Skip leading spaces and a single `@` quiet marker.
fn skip_leading(chars: &[char]) -> usize {
    let mut pos = chars.iter().take_while(|&&c| c == ' ').count();
    if chars.get(pos) == Some(&'@') {
        pos += 1;
        pos += chars[pos..].iter().take_while(|&&c| c == ' ').count();
    }
    pos
}

impl Syntax {
    /// Split `line` into arguments.
    ///
    /// `cursor` is a character offset into `line`; the argument and offset
    /// it falls on are reported through `current_index`/`current_offset`.
    /// Only allocation failure is an error: every string tokenizes.
    pub fn tokenize(&self, line: &str, cursor: usize) -> Result<CmdContext> {
        let chars: Vec<char> = line.chars().collect();
        let mut scanner = Scanner::new(&chars, self.escape_char, cursor);
        scanner.out.try_reserve(line.len())?;

        let mut pos = skip_leading(&chars);
        let mut trailing_chars = false;
        while pos < chars.len() {
            scanner.locate(pos);
            let c = chars[pos];

            if c == ' ' && !scanner.arg.quoting() {
                scanner.end_arg()?;
                trailing_chars = true;
                pos += 1;
                continue;
            }
            trailing_chars = false;

            if !scanner.arg.active {
                scanner.begin_arg();
                if c == '"' {
                    scanner.arg.quoted = true;
                    scanner.arg.initial_open = true;
                    pos += 1;
                    continue;
                }
            }
            pos = scanner.step(pos)?;
        }

        let ctx = scanner.finish(trailing_chars)?;
        trace!(
            "tokenized {} argument(s), current {}:{}",
            ctx.len(),
            ctx.current_index,
            ctx.current_offset
        );
        Ok(ctx)
    }
}
