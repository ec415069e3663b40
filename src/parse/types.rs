//! Types produced by the tokenizer and consumed by the plan builder.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeStruct, Serializer};

/// One token of a command line plus its quoting metadata.
///
/// The text is a view into a reference-counted buffer. The tokenizer writes
/// every argument of a line into one buffer, so cloning an argument (or a
/// whole [`CmdContext`]) shares that allocation rather than copying bytes.
/// The buffer is released when the last argument viewing it is dropped.
#[derive(Clone)]
pub struct Argument {
    buffer: Arc<str>,
    range: Range<usize>,
    /// The argument began with a literal quote mark.
    pub quoted: bool,
    /// A matching closing quote was found before the argument ended.
    pub quote_terminated: bool,
}

impl Argument {
    /// An unquoted argument owning its own buffer.
    pub fn new(text: &str) -> Self {
        Self::from_buffer(Arc::from(text), 0..text.len(), false, false)
    }

    /// A quoted argument with a closing quote.
    pub fn quoted(text: &str) -> Self {
        Self::from_buffer(Arc::from(text), 0..text.len(), true, true)
    }

    pub(crate) fn from_buffer(
        buffer: Arc<str>,
        range: Range<usize>,
        quoted: bool,
        quote_terminated: bool,
    ) -> Self {
        debug_assert!(buffer.get(range.clone()).is_some());
        Self {
            buffer,
            range,
            quoted,
            quote_terminated,
        }
    }

    pub fn text(&self) -> &str {
        &self.buffer[self.range.clone()]
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Whether two arguments view the same backing allocation.
    pub fn shares_buffer_with(&self, other: &Argument) -> bool {
        Arc::ptr_eq(&self.buffer, &other.buffer)
    }

    /// Number of live references to the backing buffer.
    pub fn buffer_refs(&self) -> usize {
        Arc::strong_count(&self.buffer)
    }

    /// Replace the text with a freshly allocated buffer, keeping the flags.
    pub(crate) fn set_text(&mut self, text: String) {
        self.range = 0..text.len();
        self.buffer = Arc::from(text);
    }
}

impl PartialEq for Argument {
    fn eq(&self, other: &Self) -> bool {
        self.text() == other.text()
            && self.quoted == other.quoted
            && self.quote_terminated == other.quote_terminated
    }
}

impl Eq for Argument {}

impl fmt::Debug for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Argument");
        s.field("text", &self.text());
        if self.quoted {
            s.field("quoted", &self.quoted);
            s.field("quote_terminated", &self.quote_terminated);
        }
        s.finish()
    }
}

impl Serialize for Argument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Argument", 3)?;
        s.serialize_field("text", self.text())?;
        s.serialize_field("quoted", &self.quoted)?;
        s.serialize_field("quote_terminated", &self.quote_terminated)?;
        s.end()
    }
}

/// An ordered sequence of arguments with cursor bookkeeping.
///
/// `current_index` / `current_offset` locate the argument (and the character
/// within it) matching an externally supplied cursor. `current_index` may
/// equal `args.len()` when the cursor sits on a not-yet-typed argument.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct CmdContext {
    pub args: Vec<Argument>,
    pub current_index: usize,
    pub current_offset: usize,
    /// The line ended with whitespace after the last token.
    pub trailing_chars: bool,
}

impl CmdContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an unquoted sequence from plain words.
    pub fn from_words<'a>(words: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            args: words.into_iter().map(Argument::new).collect(),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn arg(&self, index: usize) -> Option<&Argument> {
        self.args.get(index)
    }

    /// Argument texts in order.
    pub fn texts(&self) -> Vec<&str> {
        self.args.iter().map(Argument::text).collect()
    }

    /// The argument under the cursor, if the cursor is on an existing one.
    pub fn current(&self) -> Option<&Argument> {
        self.args.get(self.current_index)
    }
}
