use std::fmt::Write;

use thiserror::Error;

use super::line_col;

/// A positioned manifest parse error.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{source_name}:{line}:{column}: {message}")]
pub struct ParseError {
  pub message: String,
  /// What the parser was looking for, if the error came from an unexpected token.
  pub expected: Option<String>,
  /// Description of the offending token.
  pub found: String,
  pub offset: usize,
  pub line: usize,
  pub column: usize,
  pub source_name: String,
  /// Rendered source excerpt with a caret marker.
  pub excerpt: String,
}

impl ParseError {
  pub(crate) fn new(source_name: &str, source: &str, offset: usize, message: String) -> Self {
    let (line, column) = line_col(source, offset);
    Self {
      message,
      expected: None,
      found: String::new(),
      offset,
      line,
      column,
      source_name: source_name.to_string(),
      excerpt: excerpt(source_name, source, offset),
    }
  }

  pub(crate) fn unexpected(source_name: &str, source: &str, offset: usize, found: String, expected: &str) -> Self {
    let mut err = Self::new(source_name, source, offset, format!("expected {}, found {}", expected, found));
    err.expected = Some(expected.to_string());
    err.found = found;
    err
  }

  /// Multi-line detail: the source line and a marker under the offending column.
  pub fn detail(&self) -> &str {
    &self.excerpt
  }
}

/// Render the line containing `offset` with a caret under its column.
///
/// ```text
///   --> menv.conf:2:9
///    |
///  2 | dev{ x = }
///    |         ^
/// ```
pub fn excerpt(source_name: &str, source: &str, offset: usize) -> String {
  let (line, column) = line_col(source, offset);
  let text = source.lines().nth(line - 1).unwrap_or("");
  let gutter = line.to_string().len();

  let mut out = String::new();
  let _ = writeln!(out, "{:gutter$}--> {}:{}:{}", "", source_name, line, column, gutter = gutter + 1);
  let _ = writeln!(out, "{:gutter$} |", "", gutter = gutter);
  let _ = writeln!(out, "{} | {}", line, text);
  let pad: String = text
    .chars()
    .take(column - 1)
    .map(|c| if c == '\t' { '\t' } else { ' ' })
    .collect();
  let _ = write!(out, "{:gutter$} | {}^", "", pad, gutter = gutter);
  out
}
