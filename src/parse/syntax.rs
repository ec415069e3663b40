//! Grammar settings and the break-operator table.

use std::sync::LazyLock;

use crate::config::Config;

/// Escape marker used when no configuration says otherwise.
pub const DEFAULT_ESCAPE_CHAR: char = '^';

/// An operator that breaks arguments when it appears outside quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakOperator {
    pub text: &'static str,
    /// Whether the operator ends its argument. Redirections that take a
    /// target (`>`, `2>>`, `<`, ...) keep the following text in the same
    /// argument, so `>file.txt` is one token while `| prog` is two.
    pub terminates: bool,
}

const fn op(text: &'static str, terminates: bool) -> BreakOperator {
    BreakOperator { text, terminates }
}

/// Every operator recognised by the tokenizer. Matching picks the longest
/// entry that is a literal prefix of the remaining input.
pub const BREAK_OPERATORS: &[BreakOperator] = &[
    op("|", true),
    op("||", true),
    op("&", true),
    op("&&", true),
    op("&!", true),
    op("&!!", true),
    op("\n", true),
    op(">", false),
    op(">>", false),
    op(">&2", true),
    op("<", false),
    op("1>", false),
    op("1>>", false),
    op("1>&2", true),
    op("2>", false),
    op("2>>", false),
    op("2>&1", true),
];

/// Tokens that end one program and begin the next.
pub const PROGRAM_SEPARATORS: &[&str] = &["&", "&&", "||", "|", "\n"];

/// Separators that only count as such when they are the final argument.
pub const TRAILING_SEPARATORS: &[&str] = &["&!", "&!!"];

/// Longest break operator starting at `pos`, if any.
pub fn match_break_operator(chars: &[char], pos: usize) -> Option<BreakOperator> {
    let rest = chars.get(pos..)?;
    BREAK_OPERATORS
        .iter()
        .filter(|candidate| {
            let len = candidate.text.chars().count();
            rest.len() >= len && candidate.text.chars().zip(rest).all(|(a, &b)| a == b)
        })
        .max_by_key(|candidate| candidate.text.len())
        .copied()
}

/// Whether `text` separates programs, given its position in the sequence.
pub fn is_program_separator(text: &str, is_last: bool) -> bool {
    PROGRAM_SEPARATORS.contains(&text) || (is_last && TRAILING_SEPARATORS.contains(&text))
}

/// Grammar parameters shared by every engine operation.
///
/// Build one from configuration with [`Syntax::from_config`], or use
/// [`Syntax::default`] for the stock `^` escape and Windows device names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Syntax {
    pub escape_char: char,
    pub device_names: Vec<String>,
}

static DEFAULT_SYNTAX: LazyLock<Syntax> =
    LazyLock::new(|| Syntax::from_config(&Config::default_config()));

impl Syntax {
    pub fn from_config(config: &Config) -> Self {
        Self {
            escape_char: config.syntax.escape_char,
            device_names: config.devices.names.clone(),
        }
    }

    /// Shared instance built from the embedded default configuration.
    pub fn shared_default() -> &'static Syntax {
        &DEFAULT_SYNTAX
    }

    /// Whether `name` is a reserved device. Case is ignored, as is a
    /// single trailing colon (`CON:`).
    pub fn is_device_name(&self, name: &str) -> bool {
        let name = name.strip_suffix(':').unwrap_or(name);
        !name.is_empty()
            && self
                .device_names
                .iter()
                .any(|device| device.eq_ignore_ascii_case(name))
    }
}

impl Default for Syntax {
    fn default() -> Self {
        DEFAULT_SYNTAX.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn matched(s: &str) -> Option<&'static str> {
        match_break_operator(&chars(s), 0).map(|op| op.text)
    }

    #[test]
    fn longest_match_wins() {
        assert_eq!(matched("|x"), Some("|"));
        assert_eq!(matched("||x"), Some("||"));
        assert_eq!(matched("&!!"), Some("&!!"));
        assert_eq!(matched("&!x"), Some("&!"));
        assert_eq!(matched("2>&1"), Some("2>&1"));
        assert_eq!(matched("2>>f"), Some("2>>"));
        assert_eq!(matched("2>f"), Some("2>"));
        assert_eq!(matched(">&2"), Some(">&2"));
        assert_eq!(matched(">&1"), Some(">"));
    }

    #[test]
    fn digits_alone_are_not_operators() {
        assert_eq!(matched("1"), None);
        assert_eq!(matched("2 >"), None);
        assert_eq!(matched("abc"), None);
    }

    #[test]
    fn redirections_do_not_terminate() {
        let find = |s: &str| match_break_operator(&chars(s), 0).unwrap();
        assert!(!find(">").terminates);
        assert!(!find("<").terminates);
        assert!(!find("1>>").terminates);
        assert!(find("2>&1").terminates);
        assert!(find("|").terminates);
        assert!(find("\n").terminates);
    }

    #[test]
    fn trailing_separators_only_at_end() {
        assert!(is_program_separator("&&", false));
        assert!(!is_program_separator("&!", false));
        assert!(is_program_separator("&!", true));
        assert!(is_program_separator("&!!", true));
        assert!(!is_program_separator(">", true));
    }

    #[test]
    fn device_names_ignore_case_and_colon() {
        let syntax = Syntax::default();
        assert_eq!(syntax.escape_char, DEFAULT_ESCAPE_CHAR);
        assert!(syntax.is_device_name("nul"));
        assert!(syntax.is_device_name("CON:"));
        assert!(syntax.is_device_name("Com3"));
        assert!(!syntax.is_device_name("nul.txt"));
        assert!(!syntax.is_device_name(":"));
    }
}
