//! Copying, growing and escape-stripping argument sequences.
//!
//! Arguments are never edited through a shared buffer: copies share the
//! backing allocation, and any rewrite of an argument's text gives that
//! argument a fresh buffer of its own.

use std::borrow::Cow;

use super::types::{Argument, CmdContext};
use crate::error::{CmdlineError, Result};

/// Remove escape markers, keeping the character each one escapes.
/// A marker at the very end has nothing to escape and is kept.
pub fn remove_escapes(text: &str, escape: char) -> Cow<'_, str> {
    if !text.contains(escape) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == escape {
            out.push(chars.next().unwrap_or(c));
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

/// Copy one argument into `dst`, sharing the source's buffer.
///
/// `dst_index` may equal `dst.len()` to append.
pub fn copy_argument(
    src: &CmdContext,
    src_index: usize,
    dst: &mut CmdContext,
    dst_index: usize,
) -> Result<()> {
    let arg = src.args.get(src_index).ok_or(CmdlineError::ArgumentIndex {
        index: src_index,
        len: src.len(),
    })?;
    match dst_index.cmp(&dst.args.len()) {
        std::cmp::Ordering::Less => dst.args[dst_index] = arg.clone(),
        std::cmp::Ordering::Equal => {
            dst.args.try_reserve(1)?;
            dst.args.push(arg.clone());
        }
        std::cmp::Ordering::Greater => {
            return Err(CmdlineError::ArgumentIndex {
                index: dst_index,
                len: dst.len(),
            });
        }
    }
    Ok(())
}

/// Strip escape markers from each argument that contains one.
///
/// Arguments without markers keep their buffer. Each argument reports its
/// own outcome (`Ok(true)` when rewritten) so one failure does not undo
/// the others.
pub fn strip_escapes_in_place(args: &mut [Argument], escape: char) -> Vec<Result<bool>> {
    args.iter_mut()
        .map(|arg| strip_argument(arg, escape))
        .collect()
}

fn strip_argument(arg: &mut Argument, escape: char) -> Result<bool> {
    if !arg.text().contains(escape) {
        return Ok(false);
    }
    let mut out = String::new();
    out.try_reserve_exact(arg.text().len())?;
    out.push_str(&remove_escapes(arg.text(), escape));
    arg.set_text(out);
    Ok(true)
}

impl CmdContext {
    /// Copy the sequence. Argument text is shared, not duplicated.
    pub fn deep_copy(&self) -> Result<CmdContext> {
        let mut copy = CmdContext {
            args: Vec::new(),
            current_index: self.current_index,
            current_offset: self.current_offset,
            trailing_chars: self.trailing_chars,
        };
        copy.args.try_reserve_exact(self.len())?;
        for index in 0..self.len() {
            copy_argument(self, index, &mut copy, index)?;
        }
        Ok(copy)
    }

    /// Insert `count` empty arguments at `at`, moving later arguments up.
    /// The cursor follows the argument it was on.
    pub fn insert_arguments(&mut self, at: usize, count: usize) -> Result<()> {
        if at > self.len() {
            return Err(CmdlineError::ArgumentIndex {
                index: at,
                len: self.len(),
            });
        }
        self.args.try_reserve(count)?;
        let empty = Argument::new("");
        self.args.splice(at..at, std::iter::repeat_n(empty, count));
        if self.current_index >= at {
            self.current_index += count;
        }
        Ok(())
    }

    /// Strip escape markers from every argument. See [`strip_escapes_in_place`].
    pub fn strip_escapes(&mut self, escape: char) -> Vec<Result<bool>> {
        strip_escapes_in_place(&mut self.args, escape)
    }

    /// Mark an argument quoted if its text now contains whitespace, as
    /// happens after a completion inserts a path with spaces. Returns
    /// whether the flags changed.
    pub fn check_needs_quotes(&mut self, index: usize) -> bool {
        let Some(arg) = self.args.get_mut(index) else {
            return false;
        };
        if arg.quoted || !arg.text().chars().any(char::is_whitespace) {
            return false;
        }
        arg.quoted = true;
        arg.quote_terminated = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::Syntax;

    fn tok(line: &str) -> CmdContext {
        Syntax::default().tokenize(line, 0).unwrap()
    }

    #[test]
    fn remove_escapes_collapses_pairs() {
        assert_eq!(remove_escapes("a^&b", '^'), "a&b");
        assert_eq!(remove_escapes("a^^b", '^'), "a^b");
        assert_eq!(remove_escapes("ab^", '^'), "ab^");
        assert!(matches!(remove_escapes("plain", '^'), Cow::Borrowed(_)));
    }

    #[test]
    fn copy_argument_shares_buffer() {
        let src = tok("\"a b\" c");
        let mut dst = CmdContext::new();
        copy_argument(&src, 0, &mut dst, 0).unwrap();
        assert!(dst.args[0].shares_buffer_with(&src.args[0]));
        assert!(dst.args[0].quoted);
        assert!(dst.args[0].quote_terminated);
    }

    #[test]
    fn copy_argument_replaces_slot() {
        let src = tok("x y");
        let mut dst = CmdContext::from_words(["a", "b"]);
        copy_argument(&src, 1, &mut dst, 0).unwrap();
        assert_eq!(dst.texts(), vec!["y", "b"]);
    }

    #[test]
    fn copy_argument_rejects_bad_indices() {
        let src = tok("x");
        let mut dst = CmdContext::new();
        assert!(matches!(
            copy_argument(&src, 3, &mut dst, 0),
            Err(CmdlineError::ArgumentIndex { index: 3, len: 1 })
        ));
        assert!(matches!(
            copy_argument(&src, 0, &mut dst, 2),
            Err(CmdlineError::ArgumentIndex { index: 2, len: 0 })
        ));
    }

    #[test]
    fn deep_copy_keeps_cursor_and_shares_text() {
        let ctx = Syntax::default().tokenize("cd dir ", 7).unwrap();
        let copy = ctx.deep_copy().unwrap();
        assert_eq!(copy, ctx);
        assert!(copy.args[1].shares_buffer_with(&ctx.args[1]));
        assert!(copy.trailing_chars);
    }

    #[test]
    fn insert_shifts_cursor() {
        let mut ctx = Syntax::default().tokenize("a b c", 4).unwrap();
        assert_eq!(ctx.current_index, 2);
        ctx.insert_arguments(1, 2).unwrap();
        assert_eq!(ctx.texts(), vec!["a", "", "", "b", "c"]);
        assert_eq!(ctx.current_index, 4);
    }

    #[test]
    fn insert_after_cursor_leaves_it() {
        let mut ctx = Syntax::default().tokenize("a b", 0).unwrap();
        ctx.insert_arguments(2, 1).unwrap();
        assert_eq!(ctx.current_index, 0);
        assert_eq!(ctx.len(), 3);
        assert!(ctx.insert_arguments(9, 1).is_err());
    }

    #[test]
    fn strip_only_touches_escaped_arguments() {
        let mut ctx = tok("echo a^&b plain");
        let before = ctx.args[2].clone();
        let results = ctx.strip_escapes('^');
        assert_eq!(results.len(), 3);
        assert!(matches!(results[0], Ok(false)));
        assert!(matches!(results[1], Ok(true)));
        assert!(matches!(results[2], Ok(false)));
        assert_eq!(ctx.texts(), vec!["echo", "a&b", "plain"]);
        assert!(ctx.args[2].shares_buffer_with(&before));
        assert!(!ctx.args[1].shares_buffer_with(&before));
    }

    #[test]
    fn needs_quotes_is_idempotent() {
        let mut ctx = CmdContext::from_words(["cd", "Program Files"]);
        assert!(!ctx.check_needs_quotes(0));
        assert!(ctx.check_needs_quotes(1));
        assert!(ctx.args[1].quoted && ctx.args[1].quote_terminated);
        assert!(!ctx.check_needs_quotes(1));
        assert!(!ctx.check_needs_quotes(5));
    }
}
