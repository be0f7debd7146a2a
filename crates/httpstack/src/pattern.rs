// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Route path patterns.
//!
//! A pattern is a path template made of literal text plus two kinds of tokens:
//!
//! - `{name}` matches exactly one path segment (one or more non-`/` characters)
//! - `*` matches any character sequence, including `/`
//!
//! Everything else must match literally and case-sensitively, and the whole
//! path must be consumed. A pattern that is exactly `*` matches every path.
//!
//! ```rust
//! use httpstack::pattern::Matcher;
//!
//! let matcher = Matcher::compile("/user/{id}").unwrap();
//! let captures = matcher.matches("/user/42").unwrap();
//! assert_eq!(captures.get(0), Some("42"));
//! assert_eq!(captures.name("id"), Some("42"));
//! assert!(matcher.matches("/user/42/x").is_none());
//! ```

use crate::error::{Error, Result};
use regex::Regex;

/// Values extracted from a matched path, in token order.
///
/// Each value also remembers the `{name}` it came from; `*` captures are unnamed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captures {
    values: Vec<String>,
    names: Vec<Option<String>>,
}

impl Captures {
    /// Builds captures from positional values without names.
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        let names = vec![None; values.len()];
        Self { values, names }
    }

    /// Positional access.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(|s| s.as_str())
    }

    /// Access by the placeholder name used in the pattern.
    pub fn name(&self, name: &str) -> Option<&str> {
        self.names
            .iter()
            .position(|n| n.as_deref() == Some(name))
            .and_then(|i| self.get(i))
    }

    /// All values in token order.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Number of captured values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the pattern had no tokens.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates `(name, value)` pairs in token order.
    pub fn iter(&self) -> impl Iterator<Item = (Option<&str>, &str)> {
        self.names
            .iter()
            .zip(self.values.iter())
            .map(|(n, v)| (n.as_deref(), v.as_str()))
    }
}

/// A compiled route pattern.
#[derive(Debug, Clone)]
pub struct Matcher {
    pattern: String,
    regex: Regex,
    names: Vec<Option<String>>,
    literal_len: usize,
}

impl Matcher {
    /// Compiles a pattern string.
    ///
    /// Fails with [`Error::Selector`] when a `{` is not closed or a placeholder
    /// name is empty or contains characters other than letters, digits and `_`.
    pub fn compile(pattern: &str) -> Result<Self> {
        if pattern == "*" {
            return Ok(Self {
                pattern: pattern.to_string(),
                regex: Regex::new(r"^(.*)$").map_err(|e| invalid(pattern, e))?,
                names: vec![None],
                literal_len: 0,
            });
        }

        let mut source = String::from("^");
        let mut names = Vec::new();
        let mut literal = String::new();
        let mut literal_len = 0;
        let mut rest = pattern;

        while let Some(c) = rest.chars().next() {
            match c {
                '{' => {
                    let close = rest.find('}').ok_or_else(|| Error::Selector {
                        selector: pattern.to_string(),
                        message: "unclosed '{' in route pattern".to_string(),
                    })?;
                    let name = &rest[1..close];
                    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                        return Err(Error::Selector {
                            selector: pattern.to_string(),
                            message: format!("invalid placeholder name '{}'", name),
                        });
                    }
                    source.push_str(&regex::escape(&literal));
                    literal.clear();
                    source.push_str("([^/]+)");
                    names.push(Some(name.to_string()));
                    rest = &rest[close + 1..];
                }
                '*' => {
                    source.push_str(&regex::escape(&literal));
                    literal.clear();
                    source.push_str("(.*)");
                    names.push(None);
                    rest = &rest[1..];
                }
                _ => {
                    literal.push(c);
                    literal_len += 1;
                    rest = &rest[c.len_utf8()..];
                }
            }
        }
        source.push_str(&regex::escape(&literal));
        source.push('$');

        Ok(Self {
            pattern: pattern.to_string(),
            regex: Regex::new(&source).map_err(|e| invalid(pattern, e))?,
            names,
            literal_len,
        })
    }

    /// Tests a request path, returning its captures on success.
    pub fn matches(&self, path: &str) -> Option<Captures> {
        let caps = self.regex.captures(path)?;
        let values = caps
            .iter()
            .skip(1)
            .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
            .collect();
        Some(Captures {
            values,
            names: self.names.clone(),
        })
    }

    /// The original pattern text.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// True when the pattern contains no `{name}` or `*` tokens.
    pub fn is_literal(&self) -> bool {
        self.names.is_empty()
    }

    /// Ordering key: literal patterns first, then patterns with more literal text.
    pub fn specificity(&self) -> (bool, usize) {
        (self.is_literal(), self.literal_len)
    }
}

fn invalid(pattern: &str, err: regex::Error) -> Error {
    Error::Selector {
        selector: pattern.to_string(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_pattern_is_exact() {
        let m = Matcher::compile("/about").unwrap();
        assert!(m.matches("/about").is_some());
        assert!(m.matches("/About").is_none());
        assert!(m.matches("/about/").is_none());
        assert!(m.matches("/about/team").is_none());
        assert!(m.matches("/abou").is_none());
        assert!(m.is_literal());
    }

    #[test]
    fn test_literal_regex_characters_are_escaped() {
        let m = Matcher::compile("/a.b+c").unwrap();
        assert!(m.matches("/a.b+c").is_some());
        assert!(m.matches("/aXbbc").is_none());
    }

    #[test]
    fn test_placeholder_matches_one_segment() {
        let m = Matcher::compile("/user/{id}").unwrap();
        let caps = m.matches("/user/42").unwrap();
        assert_eq!(caps.values(), &["42".to_string()]);
        assert_eq!(caps.name("id"), Some("42"));
        assert!(m.matches("/user/42/x").is_none());
        assert!(m.matches("/user/").is_none());
    }

    #[test]
    fn test_captures_follow_token_order() {
        let m = Matcher::compile("/blog/{year}/{slug}/*").unwrap();
        let caps = m.matches("/blog/2024/hello/comments/7").unwrap();
        assert_eq!(caps.values(), &["2024", "hello", "comments/7"]);
        let pairs: Vec<_> = caps.iter().collect();
        assert_eq!(pairs[0], (Some("year"), "2024"));
        assert_eq!(pairs[2], (None, "comments/7"));
    }

    #[test]
    fn test_full_wildcard_matches_everything() {
        let m = Matcher::compile("*").unwrap();
        for path in ["/", "/home", "/a/b/c", ""] {
            assert!(m.matches(path).is_some(), "{path} should match");
        }
    }

    #[test]
    fn test_trailing_wildcard() {
        let m = Matcher::compile("/assets/*").unwrap();
        assert_eq!(m.matches("/assets/css/app.css").unwrap().get(0), Some("css/app.css"));
        assert!(m.matches("/asset").is_none());
    }

    #[test]
    fn test_bad_placeholders_are_rejected() {
        assert!(Matcher::compile("/user/{id").is_err());
        assert!(Matcher::compile("/user/{}").is_err());
        assert!(Matcher::compile("/user/{a-b}").is_err());
    }

    #[test]
    fn test_specificity_orders_literals_first() {
        let literal = Matcher::compile("/home").unwrap();
        let param = Matcher::compile("/home/{tab}").unwrap();
        let wild = Matcher::compile("*").unwrap();
        assert!(literal.specificity() > param.specificity());
        assert!(param.specificity() > wild.specificity());
    }
}
