//! Manifest syntax: tokenizer, parser and AST.
//!
//! ```text
//! namespace   := ident composites? parameters? statements?
//! composites  := "<" (composite ("," composite)*)? ">"
//! composite   := ident ( "(" (value ("," value)*)? ")" )?
//! parameters  := "(" (value ("," value)*)? ")"
//! statements  := "{" (statement (";" statement)*)? "}"
//! statement   := ident "=" expr-text
//! ```

pub mod ast;
mod error;
pub mod lexer;
mod parser;

use serde::Serialize;

pub use ast::{Ast, Composite, Expression, Namespace, ParamValue, Parameter, Statement};
pub use error::{ParseError, excerpt};
pub use parser::{parse, parse_named};
pub(crate) use parser::parse_origin;

/// Byte range into a manifest source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Span {
  pub start: usize,
  pub end: usize,
}

impl Span {
  pub fn new(start: usize, end: usize) -> Self {
    Self { start, end }
  }
}

/// Convert a byte offset into a 1-based (line, column) pair.
///
/// Columns count characters, not bytes.
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
  let offset = floor_char_boundary(source, offset.min(source.len()));
  let before = &source[..offset];
  let line = before.matches('\n').count() + 1;
  let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
  let column = source[line_start..offset].chars().count() + 1;
  (line, column)
}

fn floor_char_boundary(source: &str, mut offset: usize) -> usize {
  while offset > 0 && !source.is_char_boundary(offset) {
    offset -= 1;
  }
  offset
}
