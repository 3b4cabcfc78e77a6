//! Manifest AST.
//!
//! Nodes are built once by the parser and never mutated afterwards, so an
//! [`Ast`] can be shared freely between concurrent evaluations. Every node
//! renders back to canonical manifest text through `Display`.

use std::fmt;

use serde::Serialize;

use super::Span;

/// Root container: namespaces in source order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Ast {
  pub namespaces: Vec<Namespace>,
}

impl Ast {
  /// All definitions of `ident`, in source order.
  pub fn lookup<'a>(&'a self, ident: &'a str) -> impl Iterator<Item = &'a Namespace> + 'a {
    self.namespaces.iter().filter(move |ns| ns.ident == ident)
  }

  /// Append the namespaces of another manifest.
  pub fn extend(&mut self, other: Ast) {
    self.namespaces.extend(other.namespaces);
  }
}

impl fmt::Display for Ast {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, namespace) in self.namespaces.iter().enumerate() {
      if i > 0 {
        writeln!(f)?;
      }
      writeln!(f, "{}", namespace)?;
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Namespace {
  pub ident: String,
  pub composites: Vec<Composite>,
  pub parameters: Vec<Parameter>,
  pub statements: Vec<Statement>,
  /// Index of the manifest source this namespace was parsed from.
  pub origin: usize,
  pub span: Span,
}

impl fmt::Display for Namespace {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.ident)?;
    if !self.composites.is_empty() {
      f.write_str("<")?;
      write_list(f, &self.composites)?;
      f.write_str(">")?;
    }
    if !self.parameters.is_empty() {
      f.write_str("(")?;
      write_list(f, &self.parameters)?;
      f.write_str(")")?;
    }
    if self.statements.is_empty() {
      return f.write_str(" {}");
    }
    f.write_str(" {\n")?;
    for statement in &self.statements {
      writeln!(f, "  {};", statement)?;
    }
    f.write_str("}")
  }
}

/// A reference to another namespace, with inline arguments for this use only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Composite {
  pub ident: String,
  pub arguments: Vec<Parameter>,
  pub span: Span,
}

impl Composite {
  /// A reference without arguments, as produced for requested top-level names.
  pub fn named(ident: impl Into<String>) -> Self {
    Self {
      ident: ident.into(),
      arguments: Vec::new(),
      span: Span::default(),
    }
  }
}

impl fmt::Display for Composite {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.ident)?;
    if !self.arguments.is_empty() {
      f.write_str("(")?;
      write_list(f, &self.arguments)?;
      f.write_str(")")?;
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
  pub value: ParamValue,
  pub span: Span,
}

impl Parameter {
  pub fn new(value: ParamValue) -> Self {
    Self {
      value,
      span: Span::default(),
    }
  }
}

impl fmt::Display for Parameter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.value.fmt(f)
  }
}

/// A literal parameter value as written in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
  Str(String),
  Int(i64),
  Float(f64),
  Bool(bool),
  /// A bare word such as `release`.
  Word(String),
}

impl ParamValue {
  /// The textual form handed to expressions as the implicit parameter.
  pub fn text(&self) -> String {
    match self {
      ParamValue::Str(s) | ParamValue::Word(s) => s.clone(),
      ParamValue::Int(i) => i.to_string(),
      ParamValue::Float(x) => format!("{:?}", x),
      ParamValue::Bool(b) => b.to_string(),
    }
  }
}

impl fmt::Display for ParamValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ParamValue::Str(s) => write!(f, "\"{}\"", s.escape_default()),
      ParamValue::Int(i) => write!(f, "{}", i),
      ParamValue::Float(x) => write!(f, "{:?}", x),
      ParamValue::Bool(b) => write!(f, "{}", b),
      ParamValue::Word(w) => f.write_str(w),
    }
  }
}

/// `ident = expression`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
  pub ident: String,
  pub operator: String,
  pub expression: Expression,
  pub span: Span,
}

impl fmt::Display for Statement {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {} {}", self.ident, self.operator, self.expression)
  }
}

/// Unparsed expression text, deferred to the expression engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expression {
  pub source: String,
  /// Byte offset of the expression text in its manifest.
  pub offset: usize,
}

impl fmt::Display for Expression {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&escape_semicolons(&self.source))
  }
}

/// Re-escape the `;` characters that would otherwise end the statement.
fn escape_semicolons(source: &str) -> String {
  let mut out = String::with_capacity(source.len());
  let mut depth = 0usize;
  let mut quote: Option<char> = None;
  let mut escaped = false;
  for ch in source.chars() {
    match quote {
      Some(q) => {
        if escaped {
          escaped = false;
        } else if ch == '\\' {
          escaped = true;
        } else if ch == q {
          quote = None;
        }
      }
      None => match ch {
        '"' | '\'' => quote = Some(ch),
        '{' => depth += 1,
        '}' => depth = depth.saturating_sub(1),
        ';' if depth == 0 => out.push('\\'),
        _ => {}
      },
    }
    out.push(ch);
  }
  out
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
  for (i, item) in items.iter().enumerate() {
    if i > 0 {
      f.write_str(", ")?;
    }
    write!(f, "{}", item)?;
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn param_text_keeps_float_marker() {
    assert_eq!(ParamValue::Float(2.0).text(), "2.0");
    assert_eq!(ParamValue::Int(2).text(), "2");
    assert_eq!(ParamValue::Str("a b".into()).text(), "a b");
  }

  #[test]
  fn expression_display_escapes_top_level_semicolons() {
    let expr = Expression {
      source: r#"f(1); "a;b""#.into(),
      offset: 0,
    };
    assert_eq!(expr.to_string(), r#"f(1)\; "a;b""#);
  }
}
