// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Glob and pattern matching
//!
//! Hierarchical paths and type names are matched with shell-style globs that
//! are translated to anchored regular expressions. A pattern already wrapped in
//! slashes (`/regex/`) is passed through untouched.
//!
//! Compiled expressions are cached process-wide since the same handful of
//! override paths is matched on every creation call.

use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::warn;

fn cache() -> &'static Mutex<HashMap<String, Option<Regex>>> {
    static CACHE: OnceLock<Mutex<HashMap<String, Option<Regex>>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

fn is_bracketed(s: &str) -> bool {
    s.len() >= 2 && s.starts_with('/') && s.ends_with('/')
}

/// Translate a glob into a `/`-delimited anchored pattern.
///
/// `*` matches zero or more characters, `?` exactly one, `+` one or more.
/// The literals `.`, `[`, `]`, `(` and `)` are escaped; every other character
/// is copied as-is.
pub fn glob_to_pattern(glob: &str) -> String {
    if is_bracketed(glob) {
        return glob.to_string();
    }

    let mut out = String::with_capacity(glob.len() * 2 + 4);
    out.push_str("/^");
    for c in glob.chars() {
        match c {
            '*' => out.push_str(".*"),
            '+' => out.push_str(".+"),
            '?' => out.push('.'),
            '.' | '[' | ']' | '(' | ')' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out.push_str("$/");
    out
}

/// Match `s` against a pattern produced by [`glob_to_pattern`] (or any regular
/// expression, optionally slash-delimited).
///
/// An invalid expression never matches.
pub fn pattern_match(pattern: &str, s: &str) -> bool {
    let body = if is_bracketed(pattern) {
        &pattern[1..pattern.len() - 1]
    } else {
        pattern
    };

    let mut cache = cache().lock();
    let compiled = cache.entry(body.to_string()).or_insert_with(|| match Regex::new(body) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(pattern = %body, error = %e, "Invalid glob or regular expression");
            None
        }
    });

    compiled.as_ref().map(|re| re.is_match(s)).unwrap_or(false)
}

/// Glob match: `is_match("top.*", "top.env")`.
pub fn is_match(glob: &str, s: &str) -> bool {
    pattern_match(&glob_to_pattern(glob), s)
}

/// True if the string contains a glob metacharacter.
pub fn has_wildcard(s: &str) -> bool {
    s.contains(['*', '?', '+'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_translation() {
        assert_eq!(glob_to_pattern("top.*"), "/^top\\..*$/");
        assert_eq!(glob_to_pattern("a?b"), "/^a.b$/");
        assert_eq!(glob_to_pattern("m[0]"), "/^m\\[0\\]$/");
        assert_eq!(glob_to_pattern("/^raw$/"), "/^raw$/");
    }

    #[test]
    fn test_glob_anchoring() {
        assert!(is_match("top.sub.*", "top.sub.x"));
        assert!(!is_match("top.sub.*", "xtop.sub.x"));
        assert!(!is_match("top.sub", "top.sub.x"));
        assert!(is_match("*", ""));
        assert!(is_match("drv_*", "drv_a"));
        assert!(!is_match("drv_*", "fast_drv"));
        assert!(is_match("a?c", "abc"));
        assert!(!is_match("a?c", "ac"));
        assert!(!is_match("a+", "a"));
    }

    #[test]
    fn test_dot_is_literal() {
        assert!(is_match("top.env", "top.env"));
        assert!(!is_match("top.env", "topXenv"));
    }

    #[test]
    fn test_bracketed_pattern_passes_through() {
        assert!(is_match("/env[0-9]+/", "top.env12.agent"));
        assert!(pattern_match("^top", "top.env"));
    }

    #[test]
    fn test_invalid_pattern_never_matches() {
        assert!(!pattern_match("/(unclosed/", "(unclosed"));
    }

    #[test]
    fn test_has_wildcard() {
        assert!(has_wildcard("drv_*"));
        assert!(has_wildcard("a?"));
        assert!(!has_wildcard("top.env"));
    }
}
