//! Glob-to-regex compiler.
//!
//! Patterns use shell-style wildcards matched against the *whole* candidate
//! string, not segment by segment:
//!
//! - `*` matches any run of characters, path separators included
//! - `?` matches exactly one character
//! - `[...]` is a character class, `[!...]` its negation, `a-z` a range
//!
//! A `[` without a closing `]` is a literal bracket and `\` has no escaping
//! meaning. Every other character matches itself.
//!
//! Compilation never panics. A pattern that cannot be turned into a regex
//! (size limit, empty class) yields [`GlobMatcher::never`] through
//! [`GlobMatcher::compile`], or an error through [`GlobMatcher::new`].

use crate::error::{ArchseekError, Result};
use crate::types::CaseMode;
use regex::{Regex, RegexBuilder};
use std::fmt::Write;
use tracing::warn;

/// Characters that make a pattern a wildcard pattern
pub const WILDCARD_CHARS: [char; 4] = ['*', '?', '[', ']'];

/// Default compiled-program size limit in bytes
pub const DEFAULT_SIZE_LIMIT: usize = 10 * (1 << 20);

/// Returns true if the text contains any wildcard character.
pub fn has_wildcards(s: &str) -> bool {
    s.contains(WILDCARD_CHARS)
}

/// A compiled, anchored glob pattern.
#[derive(Debug, Clone)]
pub struct GlobMatcher {
    pattern: String,
    case: CaseMode,
    regex: Option<Regex>,
}

impl GlobMatcher {
    /// Compile a pattern, reporting failures.
    ///
    /// The pattern is case-folded with `case` before translation; candidates
    /// passed to [`is_match`](Self::is_match) must be folded the same way.
    pub fn new(pattern: &str, case: CaseMode) -> Result<Self> {
        Self::with_size_limit(pattern, case, DEFAULT_SIZE_LIMIT)
    }

    /// Compile a pattern with an explicit regex size limit.
    pub fn with_size_limit(pattern: &str, case: CaseMode, size_limit: usize) -> Result<Self> {
        let folded = case.fold(pattern);
        let source = translate(&folded).ok_or_else(|| ArchseekError::PatternCompile {
            pattern: pattern.to_string(),
            reason: "character class can never match".to_string(),
        })?;

        let regex = RegexBuilder::new(&source)
            .size_limit(size_limit)
            .build()
            .map_err(|e| ArchseekError::PatternCompile {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;

        Ok(GlobMatcher {
            pattern: pattern.to_string(),
            case,
            regex: Some(regex),
        })
    }

    /// Compile a pattern, degrading to a never-matching matcher on failure.
    pub fn compile(pattern: &str, case: CaseMode, size_limit: usize) -> Self {
        match Self::with_size_limit(pattern, case, size_limit) {
            Ok(matcher) => matcher,
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "Pattern matches nothing");
                Self::never(pattern, case)
            }
        }
    }

    /// A matcher that rejects every candidate.
    pub fn never(pattern: &str, case: CaseMode) -> Self {
        GlobMatcher {
            pattern: pattern.to_string(),
            case,
            regex: None,
        }
    }

    /// Test a candidate that is already case-folded.
    pub fn is_match(&self, folded: &str) -> bool {
        self.regex.as_ref().map_or(false, |re| re.is_match(folded))
    }

    /// Fold a raw candidate and test it.
    pub fn matches_raw(&self, candidate: &str) -> bool {
        match self.case {
            CaseMode::Sensitive => self.is_match(candidate),
            CaseMode::Insensitive => self.is_match(&candidate.to_lowercase()),
        }
    }

    /// Whether compilation succeeded
    pub fn is_valid(&self) -> bool {
        self.regex.is_some()
    }

    /// The pattern text this matcher was built from
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// Translate a glob into an anchored regex source.
///
/// Returns `None` when a character class is empty after dropping reversed
/// ranges, since such a pattern can never match anything.
fn translate(pattern: &str) -> Option<String> {
    let chars: Vec<char> = pattern.chars().collect();
    let n = chars.len();
    let mut out = String::with_capacity(pattern.len() * 2 + 8);
    out.push_str("(?s)^(?:");

    let mut i = 0;
    while i < n {
        let c = chars[i];
        i += 1;
        match c {
            '*' => {
                // Runs of stars are equivalent to one
                while i < n && chars[i] == '*' {
                    i += 1;
                }
                out.push_str(".*");
            }
            '?' => out.push('.'),
            '[' => {
                let mut j = i;
                if j < n && chars[j] == '!' {
                    j += 1;
                }
                if j < n && chars[j] == ']' {
                    j += 1;
                }
                while j < n && chars[j] != ']' {
                    j += 1;
                }
                if j >= n {
                    out.push_str(r"\[");
                } else {
                    push_class(&mut out, &chars[i..j])?;
                    i = j + 1;
                }
            }
            _ => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }

    out.push_str(")$");
    Some(out)
}

/// Emit a character class from the text between `[` and `]`.
///
/// Members are written as `\x{..}` escapes so no class metacharacter in the
/// glob can change the meaning of the regex class.
fn push_class(out: &mut String, body: &[char]) -> Option<()> {
    let (negated, body) = match body.first() {
        Some('!') => (true, &body[1..]),
        _ => (false, body),
    };

    let mut items: Vec<(char, char)> = Vec::new();
    let mut k = 0;
    while k < body.len() {
        let lo = body[k];
        if k + 2 < body.len() && body[k + 1] == '-' {
            let hi = body[k + 2];
            // Reversed ranges are empty
            if lo <= hi {
                items.push((lo, hi));
            }
            k += 3;
        } else {
            items.push((lo, lo));
            k += 1;
        }
    }

    if items.is_empty() {
        if negated {
            out.push('.');
            return Some(());
        }
        return None;
    }

    out.push('[');
    if negated {
        out.push('^');
    }
    for (lo, hi) in items {
        let _ = write!(out, "\\x{{{:X}}}", lo as u32);
        if lo != hi {
            let _ = write!(out, "-\\x{{{:X}}}", hi as u32);
        }
    }
    out.push(']');
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glob(pattern: &str) -> GlobMatcher {
        GlobMatcher::new(pattern, CaseMode::Sensitive).unwrap()
    }

    #[test]
    fn test_star_crosses_separators() {
        let m = glob("root/*/Library/*.plist");
        assert!(m.is_match("root/private/var/mobile/Library/a.plist"));
        assert!(m.is_match("root/x/Library/sub/dir/b.plist"));
        assert!(!m.is_match("root/Library/a.plist"));
    }

    #[test]
    fn test_anchored() {
        let m = glob("*.db");
        assert!(m.is_match("a/b/c.db"));
        assert!(!m.is_match("a/b/c.db-wal"));
        assert!(!glob("foo").is_match("xfoo"));
        assert!(!glob("foo").is_match("foox"));
    }

    #[test]
    fn test_question_mark() {
        let m = glob("test?.txt");
        assert!(m.is_match("test1.txt"));
        assert!(m.is_match("test/.txt"));
        assert!(!m.is_match("test.txt"));
        assert!(!m.is_match("test12.txt"));
    }

    #[test]
    fn test_double_star_is_star() {
        let m = glob("root/**/Library/foo.sqlite*");
        assert!(m.is_match("root/root/Containers/Data/Application/ABC/Library/foo.sqlite"));
        assert!(m.is_match("root/a/Library/foo.sqlite-wal"));
        assert!(!m.is_match("root/other/foo.sqlite"));
    }

    #[test]
    fn test_character_class() {
        let m = glob("log[0-9].txt");
        assert!(m.is_match("log3.txt"));
        assert!(!m.is_match("logx.txt"));

        let m = glob("log[!0-9].txt");
        assert!(m.is_match("logx.txt"));
        assert!(!m.is_match("log3.txt"));

        let m = glob("[abc]");
        assert!(m.is_match("b"));
        assert!(!m.is_match("d"));
    }

    #[test]
    fn test_class_with_leading_bracket_and_dash() {
        let m = glob("[]a]");
        assert!(m.is_match("]"));
        assert!(m.is_match("a"));

        let m = glob("[-z]");
        assert!(m.is_match("-"));
        assert!(m.is_match("z"));
        assert!(!m.is_match("m"));
    }

    #[test]
    fn test_class_metacharacters_are_literal() {
        let m = glob("[&~|^]");
        assert!(m.is_match("&"));
        assert!(m.is_match("^"));
        assert!(!m.is_match("a"));

        let m = glob("[\\]");
        assert!(m.is_match("\\"));
    }

    #[test]
    fn test_unclosed_bracket_is_literal() {
        let m = glob("file[1.txt");
        assert!(m.is_match("file[1.txt"));
        assert!(!m.is_match("file1.txt"));
    }

    #[test]
    fn test_regex_metacharacters_escaped() {
        let m = glob("a.b+(c)$^{1}|x");
        assert!(m.is_match("a.b+(c)$^{1}|x"));
        assert!(!m.is_match("aXb+(c)$^{1}|x"));
    }

    #[test]
    fn test_reversed_range_never_matches() {
        let err = GlobMatcher::new("[z-a]", CaseMode::Sensitive).unwrap_err();
        assert!(matches!(err, ArchseekError::PatternCompile { .. }));

        let m = GlobMatcher::compile("[z-a]", CaseMode::Sensitive, DEFAULT_SIZE_LIMIT);
        assert!(!m.is_valid());
        assert!(!m.is_match("z"));
        assert!(!m.is_match("[z-a]"));
    }

    #[test]
    fn test_size_limit_degrades_to_never() {
        let pattern = "?".repeat(2000) + "[a-z]";
        let m = GlobMatcher::compile(&pattern, CaseMode::Sensitive, 64);
        assert!(!m.is_valid());
        assert!(!m.is_match(&"a".repeat(2001)));
    }

    #[test]
    fn test_case_insensitive_folds_pattern() {
        let m = GlobMatcher::new("*/Library/*.PLIST", CaseMode::Insensitive).unwrap();
        assert!(m.is_match("root/a/library/x.plist"));
        assert!(m.matches_raw("root/a/Library/X.Plist"));
        // Candidates must be folded too
        assert!(!m.is_match("root/a/Library/x.plist"));
    }

    #[test]
    fn test_case_sensitive_keeps_case() {
        let m = GlobMatcher::new("*/Library/*.plist", CaseMode::Sensitive).unwrap();
        assert!(m.matches_raw("root/a/Library/x.plist"));
        assert!(!m.matches_raw("root/a/library/x.plist"));
    }

    #[test]
    fn test_newlines_matched_by_star() {
        assert!(glob("a*b").is_match("a\nb"));
    }

    #[test]
    fn test_has_wildcards() {
        assert!(has_wildcards("*.db"));
        assert!(has_wildcards("a?c"));
        assert!(has_wildcards("x[0]"));
        assert!(!has_wildcards("private/var/mobile/Library/a.db"));
    }
}
