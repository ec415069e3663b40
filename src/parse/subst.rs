//! Nested command substitution: `` `cmd` `` and `$(cmd)` regions.
//!
//! The scan never fails. Unterminated regions stay open to the end of the
//! line and a `)` that closes a `$( )` around an open backtick region
//! abandons that region. Both kinds are kept so completion can still work
//! inside them, but only terminated regions are offered for evaluation.

use std::ops::Range;

use serde::Serialize;

use super::syntax::Syntax;

/// One substitution region. Offsets are character offsets of the body,
/// excluding the delimiters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubstitutionEntry {
    pub start: usize,
    pub end: usize,
    /// Nesting depth, 1 for the outermost regions.
    pub depth: usize,
    /// `$( )` rather than backticks.
    pub new_style: bool,
    pub terminated: bool,
    /// Closed implicitly by a mismatched outer delimiter.
    pub abandoned: bool,
}

impl SubstitutionEntry {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `offset` lies within the body, its end included.
    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset <= self.end
    }

    /// Whether the region may be run by an evaluator.
    pub fn is_evaluable(&self) -> bool {
        self.terminated && !self.abandoned
    }

    /// Character range including the opening delimiter and, when present,
    /// the closing one.
    pub fn delimited_range(&self) -> Range<usize> {
        let open = if self.new_style { 2 } else { 1 };
        let close = usize::from(self.terminated);
        self.start - open..self.end + close
    }

    /// The body text within `line`.
    pub fn text<'a>(&self, line: &'a str) -> &'a str {
        &line[byte_range(line, self.start..self.end)]
    }
}

/// Map a character range of `line` to a byte range.
fn byte_range(line: &str, chars: Range<usize>) -> Range<usize> {
    let byte_at = |n: usize| {
        line.char_indices()
            .nth(n)
            .map_or(line.len(), |(byte, _)| byte)
    };
    byte_at(chars.start)..byte_at(chars.end)
}

/// All substitution regions found in one line, in opening order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubstitutionSet {
    pub entries: Vec<SubstitutionEntry>,
    pub max_depth: usize,
}

impl SubstitutionSet {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The deepest terminated region, leftmost on ties. Evaluating it,
    /// splicing its output in and rescanning converges innermost-first.
    pub fn next_region_to_evaluate(&self) -> Option<&SubstitutionEntry> {
        deepest(self.entries.iter().filter(|e| e.is_evaluable()))
    }

    /// The deepest region containing `offset`, terminated or not.
    pub fn best_region_at_offset(&self, offset: usize) -> Option<&SubstitutionEntry> {
        deepest(self.entries.iter().filter(|e| e.contains(offset)))
    }

    /// Replace `entry` and its delimiters in `line` with `output`.
    pub fn replace(line: &str, entry: &SubstitutionEntry, output: &str) -> String {
        let range = byte_range(line, entry.delimited_range());
        let mut result = String::with_capacity(line.len() - range.len() + output.len());
        result.push_str(&line[..range.start]);
        result.push_str(output);
        result.push_str(&line[range.end..]);
        result
    }
}

fn deepest<'a>(
    entries: impl Iterator<Item = &'a SubstitutionEntry>,
) -> Option<&'a SubstitutionEntry> {
    entries.fold(None, |best, entry| match best {
        Some(b) if b.depth >= entry.depth => Some(b),
        _ => Some(entry),
    })
}

struct SubstScanner {
    entries: Vec<SubstitutionEntry>,
    /// Indices into `entries` of the regions still open, innermost last.
    stack: Vec<usize>,
    max_depth: usize,
}

impl SubstScanner {
    fn open(&mut self, start: usize, new_style: bool) {
        let depth = self.stack.len() + 1;
        self.max_depth = self.max_depth.max(depth);
        self.stack.push(self.entries.len());
        self.entries.push(SubstitutionEntry {
            start,
            end: start,
            depth,
            new_style,
            terminated: false,
            abandoned: false,
        });
    }

    fn top_is_backtick(&self) -> bool {
        self.stack
            .last()
            .is_some_and(|&open| !self.entries[open].new_style)
    }

    fn close_top(&mut self, end: usize, terminated: bool) {
        if let Some(open) = self.stack.pop() {
            let entry = &mut self.entries[open];
            entry.end = end;
            entry.terminated = terminated;
            entry.abandoned = !terminated;
        }
    }

    fn close_paren(&mut self, pos: usize) {
        let Some(target) = self
            .stack
            .iter()
            .rposition(|&open| self.entries[open].new_style)
        else {
            return;
        };
        while self.stack.len() > target + 1 {
            self.close_top(pos, false);
        }
        self.close_top(pos, true);
    }

    fn finish(mut self, len: usize) -> SubstitutionSet {
        for open in self.stack.drain(..) {
            self.entries[open].end = len;
        }
        SubstitutionSet {
            entries: self.entries,
            max_depth: self.max_depth,
        }
    }
}

impl Syntax {
    /// Find every backtick and `$( )` region in `line`.
    ///
    /// Double quotes suspend recognition; the escape marker skips the next
    /// character everywhere.
    pub fn find_substitutions(&self, line: &str) -> SubstitutionSet {
        let chars: Vec<char> = line.chars().collect();
        let mut scanner = SubstScanner {
            entries: Vec::new(),
            stack: Vec::new(),
            max_depth: 0,
        };
        let mut quoted = false;
        let mut pos = 0;

        while pos < chars.len() {
            let c = chars[pos];
            if c == self.escape_char {
                pos += 2;
                continue;
            }
            if c == '"' {
                quoted = !quoted;
                pos += 1;
                continue;
            }
            if quoted {
                pos += 1;
                continue;
            }
            match c {
                '`' => {
                    if scanner.top_is_backtick() {
                        scanner.close_top(pos, true);
                    } else {
                        scanner.open(pos + 1, false);
                    }
                }
                '$' if chars.get(pos + 1) == Some(&'(') => {
                    scanner.open(pos + 2, true);
                    pos += 1;
                }
                ')' => scanner.close_paren(pos),
                _ => {}
            }
            pos += 1;
        }

        scanner.finish(chars.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(line: &str) -> SubstitutionSet {
        Syntax::default().find_substitutions(line)
    }

    fn bodies<'a>(line: &'a str, set: &SubstitutionSet) -> Vec<&'a str> {
        set.entries.iter().map(|e| e.text(line)).collect()
    }

    #[test]
    fn no_substitutions() {
        let set = scan("dir /s");
        assert!(set.is_empty());
        assert_eq!(set.max_depth, 0);
        assert!(set.next_region_to_evaluate().is_none());
    }

    #[test]
    fn backtick_region() {
        let line = "echo `date /t`";
        let set = scan(line);
        assert_eq!(bodies(line, &set), vec!["date /t"]);
        let e = &set.entries[0];
        assert!(e.terminated && !e.new_style);
        assert_eq!(e.depth, 1);
        assert_eq!(e.delimited_range(), 5..14);
    }

    #[test]
    fn dollar_paren_nested_in_backticks() {
        let line = "echo `echo $(ls)`";
        let set = scan(line);
        assert_eq!(set.max_depth, 2);
        assert_eq!(bodies(line, &set), vec!["echo $(ls)", "ls"]);
        let next = set.next_region_to_evaluate().unwrap();
        assert_eq!(next.text(line), "ls");
        assert!(next.new_style);
    }

    #[test]
    fn backticks_nest_through_dollar_paren() {
        let line = "a `b $(c `d` e) f`";
        let set = scan(line);
        assert_eq!(set.max_depth, 3);
        assert_eq!(set.next_region_to_evaluate().unwrap().text(line), "d");
    }

    #[test]
    fn siblings_evaluate_left_to_right() {
        let line = "x $(a) $(b)";
        let set = scan(line);
        assert_eq!(set.next_region_to_evaluate().unwrap().text(line), "a");
    }

    #[test]
    fn first_paren_closes_dollar_paren() {
        let line = "echo $(echo (a)) b) c";
        let set = scan(line);
        assert_eq!(set.entries.len(), 1);
        assert_eq!(bodies(line, &set), vec!["echo (a"]);
        assert!(set.entries[0].terminated);
        assert_eq!(
            SubstitutionSet::replace(line, &set.entries[0], "x"),
            "echo x) b) c"
        );
    }

    #[test]
    fn paren_without_open_region_is_text() {
        let set = scan("echo (a) `b)`");
        assert_eq!(set.entries.len(), 1);
        assert!(set.entries[0].terminated);
    }

    #[test]
    fn quotes_suspend_recognition() {
        assert!(scan("echo \"`date`\"").is_empty());
        assert_eq!(scan("echo \"x\" `date`").entries.len(), 1);
    }

    #[test]
    fn escape_skips_delimiter() {
        assert!(scan("echo ^`date^`").is_empty());
        assert!(scan("echo ^$(x)").is_empty());
    }

    #[test]
    fn unterminated_region_is_not_evaluated() {
        let line = "echo $(dir";
        let set = scan(line);
        let e = &set.entries[0];
        assert!(!e.terminated && !e.abandoned);
        assert_eq!(e.text(line), "dir");
        assert!(set.next_region_to_evaluate().is_none());
        assert_eq!(set.best_region_at_offset(8), Some(e));
        assert_eq!(set.best_region_at_offset(10), Some(e));
        assert_eq!(set.best_region_at_offset(2), None);
    }

    #[test]
    fn lone_dollar_paren() {
        let set = scan("$(");
        assert_eq!(set.entries.len(), 1);
        assert!(set.next_region_to_evaluate().is_none());
        assert!(set.best_region_at_offset(2).is_some());
    }

    #[test]
    fn mismatched_paren_abandons_backtick() {
        let line = "$(a `b) c";
        let set = scan(line);
        assert_eq!(set.entries.len(), 2);
        let outer = &set.entries[0];
        let inner = &set.entries[1];
        assert!(outer.terminated);
        assert_eq!(outer.text(line), "a `b");
        assert!(inner.abandoned && !inner.terminated);
        assert_eq!(inner.text(line), "b");
        assert_eq!(set.next_region_to_evaluate(), Some(outer));
        assert_eq!(set.best_region_at_offset(5), Some(inner));
    }

    #[test]
    fn replace_innermost_and_rescan() {
        let line = "echo `echo $(ls)`";
        let set = scan(line);
        let inner = set.next_region_to_evaluate().unwrap();
        let line = SubstitutionSet::replace(line, inner, "a.txt");
        assert_eq!(line, "echo `echo a.txt`");
        let set = scan(&line);
        assert_eq!(set.max_depth, 1);
        let outer = set.next_region_to_evaluate().unwrap();
        assert_eq!(SubstitutionSet::replace(&line, outer, "a.txt"), "echo a.txt");
    }

    #[test]
    fn offsets_are_characters() {
        let line = "é `ü`";
        let set = scan(line);
        assert_eq!(set.entries[0].start, 3);
        assert_eq!(set.entries[0].text(line), "ü");
        assert_eq!(SubstitutionSet::replace(line, &set.entries[0], "x"), "é x");
    }
}
