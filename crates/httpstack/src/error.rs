// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Error types for HttpStack.
//!
//! This module defines [`Error`], the main error enum, and [`SourceContext`]
//! for rich markup error reporting.
//!
//! # Error Categories
//!
//! - **Parse errors**: unrecoverable markup, or a document path that does not exist
//! - **Selector errors**: CSS or XPath outside the supported subset
//! - **DOM errors**: structural mutations that would corrupt the tree
//! - **Not found**: missing files, query targets, view slots, services
//! - **Read-only violations**: mutating calls against a read-only datasource
//! - **Malformed payloads**: datasource payloads of the wrong shape
//!
//! Unresolved template placeholders are deliberately *not* errors; they are
//! left in the output as literal text.

use std::fmt;
use thiserror::Error;

/// Lines of markup around a parse error.
///
/// Only the window shown in the error message is kept, not the whole source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceContext {
    /// `(line number, text)` pairs, 1-indexed, in order.
    pub lines: Vec<(usize, String)>,
    /// Line of the error (1-indexed).
    pub error_line: usize,
    /// Column of the error (1-indexed).
    pub error_column: usize,
}

/// Lines shown on each side of the error line.
const CONTEXT_LINES: usize = 2;

impl SourceContext {
    /// Captures the lines around `line` of `source`.
    pub fn from_source(source: &str, line: usize, column: usize) -> Self {
        let first = line.saturating_sub(CONTEXT_LINES).max(1);
        let lines = source
            .lines()
            .enumerate()
            .map(|(i, text)| (i + 1, text.to_string()))
            .skip(first - 1)
            .take_while(|(n, _)| *n <= line + CONTEXT_LINES)
            .collect();
        Self {
            lines,
            error_line: line,
            error_column: column,
        }
    }

    /// Renders the window with line numbers and a caret under the error column.
    ///
    /// ```text
    ///    4 | <div class="container">
    ///    5 |   <!-- never closed
    ///      |   ^
    ///    6 | </div>
    /// ```
    pub fn format_snippet(&self) -> String {
        let mut out = String::new();
        for (number, text) in &self.lines {
            out.push_str(&format!("{:4} | {}\n", number, text));
            if *number == self.error_line {
                out.push_str(&format!(
                    "     | {}^\n",
                    " ".repeat(self.error_column.saturating_sub(1))
                ));
            }
        }
        out
    }
}

impl fmt::Display for SourceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_snippet())
    }
}

fn snippet(context: &Option<SourceContext>) -> String {
    context.as_ref().map(SourceContext::format_snippet).unwrap_or_default()
}

/// The main error type for HttpStack operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Markup could not be parsed, or the document path does not exist.
    #[error("Parse error in {file:?}: {message} at line {line}, column {column}\n{}", snippet(.source_context))]
    Parse {
        /// Description of the parse error.
        message: String,
        /// Line number where the error occurred.
        line: usize,
        /// Column number where the error occurred.
        column: usize,
        /// The file path, if known.
        file: Option<String>,
        /// Source context for rich error display.
        source_context: Option<SourceContext>,
    },

    /// A CSS selector or XPath expression is outside the supported subset.
    #[error("Unsupported selector '{selector}': {message}")]
    Selector {
        /// The offending selector text.
        selector: String,
        /// What was wrong with it.
        message: String,
    },

    /// A structural DOM operation was invalid (cycle, detached target, wrong node kind).
    #[error("Invalid DOM operation: {0}")]
    Dom(String),

    /// A file, query target, view slot or other explicitly requested item is missing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A mutating call was made against a read-only datasource.
    #[error("Read-only violation: {0}")]
    ReadOnlyViolation(String),

    /// A datasource payload did not have the expected shape.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Service registration or resolution failed.
    #[error("Container error: {0}")]
    Container(String),

    /// A route handler reported a failure.
    #[error("Handler error: {0}")]
    Handler(String),

    /// A datasource backend failed.
    #[error("Datasource error: {0}")]
    Datasource(String),

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Builds a parse error located at `line`/`column` of `source`.
    pub fn parse_at(message: impl Into<String>, source: &str, line: usize, column: usize) -> Self {
        Error::Parse {
            message: message.into(),
            line,
            column,
            file: None,
            source_context: Some(SourceContext::from_source(source, line, column)),
        }
    }

    /// Attaches a file name to a parse error; other variants pass through.
    pub fn in_file(self, name: &str) -> Self {
        match self {
            Error::Parse { message, line, column, source_context, .. } => Error::Parse {
                message,
                line,
                column,
                file: Some(name.to_string()),
                source_context,
            },
            other => other,
        }
    }

    /// Returns true for [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

/// Convenience type alias for Results with [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_points_at_column() {
        let source = "<div>\n  <!-- open\n</div>";
        let ctx = SourceContext::from_source(source, 2, 3);
        let snippet = ctx.format_snippet();
        assert!(snippet.contains("   2 |   <!-- open"));
        assert!(snippet.contains("     |   ^"));
    }

    #[test]
    fn test_in_file_only_touches_parse_errors() {
        let err = Error::parse_at("bad", "<a", 1, 1).in_file("base.html");
        match err {
            Error::Parse { file, .. } => assert_eq!(file.as_deref(), Some("base.html")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(Error::NotFound("x".into()).in_file("y").is_not_found());
    }
}
