//! Parameter coercion and builtin constant folding.
//!
//! The implicit parameter always reaches an expression as text. Before an
//! expression is compiled, [`Patch`] rewrites its Lua token stream so that
//! free references to the parameter identifier become typed literals, and
//! dotted references to constant builtin facts (`platform.os`) become the
//! fact's value. Strings, long strings and comments are never touched.

use std::collections::BTreeSet;
use std::fmt::Write;

use serde_json::{Number, Value};

use crate::builtins::{ConstHint, ConstKind};

/// A single literal recovered from parameter text.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
  Bool(bool),
  Int(i64),
  Float(f64),
  Str(String),
}

impl Literal {
  /// Parse `text` as exactly one literal. Returns `None` for anything else.
  pub fn parse(text: &str) -> Option<Literal> {
    let text = text.trim();
    match text {
      "" => None,
      "true" => Some(Literal::Bool(true)),
      "false" => Some(Literal::Bool(false)),
      _ => match text.as_bytes()[0] {
        b'"' | b'\'' => parse_quoted(text).map(Literal::Str),
        b'[' => parse_long_bracket(text).map(Literal::Str),
        _ => parse_number(text),
      },
    }
  }

  /// Lua source for this literal, safe to splice into any expression position.
  pub fn to_lua(&self) -> String {
    match self {
      Literal::Bool(b) => b.to_string(),
      Literal::Int(i) if *i == i64::MIN => "(math.mininteger)".into(),
      Literal::Int(i) if *i < 0 => format!("({})", i),
      Literal::Int(i) => i.to_string(),
      Literal::Float(x) => float_to_lua(*x),
      Literal::Str(s) => lua_quote(s),
    }
  }

  pub fn into_value(self) -> Value {
    match self {
      Literal::Bool(b) => Value::Bool(b),
      Literal::Int(i) => Value::from(i),
      Literal::Float(x) => Number::from_f64(x).map(Value::Number).unwrap_or(Value::Null),
      Literal::Str(s) => Value::String(s),
    }
  }
}

/// If `text` is a single quoted string literal, return its contents.
pub fn unquote(text: &str) -> Option<String> {
  match Literal::parse(text)? {
    Literal::Str(s) => Some(s),
    _ => None,
  }
}

fn parse_number(text: &str) -> Option<Literal> {
  let (negative, digits) = match text.as_bytes()[0] {
    b'-' => (true, &text[1..]),
    b'+' => (false, &text[1..]),
    _ => (false, text),
  };
  if digits.is_empty() {
    return None;
  }

  if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
    if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
      return None;
    }
    let value = match u64::from_str_radix(hex, 16) {
      Ok(v) => Literal::Int(v as i64),
      Err(_) => Literal::Float(hex.chars().fold(0.0, |acc, c| acc * 16.0 + c.to_digit(16).unwrap_or(0) as f64)),
    };
    return Some(negate(value, negative));
  }

  if digits.bytes().all(|b| b.is_ascii_digit()) {
    return Some(match text.parse::<i64>() {
      Ok(v) => Literal::Int(v),
      Err(_) => Literal::Float(text.parse::<f64>().ok()?),
    });
  }

  // Guard against `inf`, `NaN` and friends, which `f64::from_str` accepts.
  let valid = digits
    .bytes()
    .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
  let lead = digits.as_bytes()[0];
  if !valid || !(lead.is_ascii_digit() || lead == b'.') {
    return None;
  }
  text.parse::<f64>().ok().map(Literal::Float)
}

fn negate(value: Literal, negative: bool) -> Literal {
  match (value, negative) {
    (Literal::Int(i), true) => Literal::Int(i.wrapping_neg()),
    (Literal::Float(x), true) => Literal::Float(-x),
    (value, _) => value,
  }
}

fn parse_quoted(text: &str) -> Option<String> {
  let mut chars = text.char_indices();
  let (_, quote) = chars.next()?;
  let mut out = String::new();
  while let Some((i, ch)) = chars.next() {
    if ch == quote {
      return (i + ch.len_utf8() == text.len()).then_some(out);
    }
    if ch == '\n' {
      return None;
    }
    if ch != '\\' {
      out.push(ch);
      continue;
    }
    let (_, esc) = chars.next()?;
    match esc {
      'n' => out.push('\n'),
      't' => out.push('\t'),
      'r' => out.push('\r'),
      'a' => out.push('\x07'),
      'b' => out.push('\x08'),
      'f' => out.push('\x0c'),
      'v' => out.push('\x0b'),
      '\\' | '"' | '\'' | '\n' => out.push(esc),
      'x' => {
        let hi = chars.next()?.1.to_digit(16)?;
        let lo = chars.next()?.1.to_digit(16)?;
        out.push(char::from_u32(hi * 16 + lo)?);
      }
      'u' => {
        if chars.next()?.1 != '{' {
          return None;
        }
        let mut code = 0u32;
        loop {
          let (_, c) = chars.next()?;
          if c == '}' {
            break;
          }
          code = code.checked_mul(16)?.checked_add(c.to_digit(16)?)?;
        }
        out.push(char::from_u32(code)?);
      }
      d if d.is_ascii_digit() => {
        let mut code = d.to_digit(10)?;
        for _ in 0..2 {
          match chars.clone().next() {
            Some((_, c)) if c.is_ascii_digit() => {
              code = code * 10 + c.to_digit(10)?;
              chars.next();
            }
            _ => break,
          }
        }
        out.push(char::from_u32(code).filter(|_| code <= 255)?);
      }
      _ => return None,
    }
  }
  None
}

fn parse_long_bracket(text: &str) -> Option<String> {
  let level = long_bracket_level(text)?;
  let open = level + 2;
  let close = format!("]{}]", "=".repeat(level));
  let body = text.get(open..)?.strip_suffix(close.as_str())?;
  if body.contains(close.as_str()) {
    return None;
  }
  // A newline right after the opening bracket is skipped.
  let body = body.strip_prefix("\r\n").or_else(|| body.strip_prefix('\n')).unwrap_or(body);
  Some(body.to_string())
}

/// `[[` is level 0, `[==[` level 2.
fn long_bracket_level(text: &str) -> Option<usize> {
  let rest = text.strip_prefix('[')?;
  let level = rest.bytes().take_while(|&b| b == b'=').count();
  (rest.as_bytes().get(level) == Some(&b'[')).then_some(level)
}

fn float_to_lua(x: f64) -> String {
  if x.is_nan() {
    "(0/0)".into()
  } else if x.is_infinite() {
    if x > 0.0 { "(1/0)".into() } else { "(-1/0)".into() }
  } else if x.is_sign_negative() {
    format!("({:?})", x)
  } else {
    format!("{:?}", x)
  }
}

/// Quote a string as a Lua literal.
pub fn lua_quote(s: &str) -> String {
  let mut out = String::with_capacity(s.len() + 2);
  out.push('"');
  for ch in s.chars() {
    match ch {
      '"' => out.push_str("\\\""),
      '\\' => out.push_str("\\\\"),
      '\n' => out.push_str("\\n"),
      '\r' => out.push_str("\\r"),
      '\t' => out.push_str("\\t"),
      c if (c as u32) < 0x20 || c == '\x7f' => {
        let _ = write!(out, "\\{:03}", c as u32);
      }
      c => out.push(c),
    }
  }
  out.push('"');
  out
}

/// Lua source for a constant builtin value; tables are never folded.
fn value_to_lua(value: &Value) -> Option<String> {
  match value {
    Value::Null => Some("nil".into()),
    Value::Bool(b) => Some(b.to_string()),
    Value::Number(n) => Some(match n.as_i64() {
      Some(i) => Literal::Int(i).to_lua(),
      None => float_to_lua(n.as_f64()?),
    }),
    Value::String(s) => Some(lua_quote(s)),
    Value::Array(_) | Value::Object(_) => None,
  }
}

/// Rewrites one expression for one parameter value.
#[derive(Debug, Clone)]
pub struct Patch<'a> {
  ident: &'a str,
  literal: Option<Literal>,
}

impl<'a> Patch<'a> {
  /// `text` is the parameter's textual form, or `None` for a pass without parameter.
  pub fn new(ident: &'a str, text: Option<&str>) -> Self {
    Self {
      ident,
      literal: text.and_then(Literal::parse),
    }
  }

  pub fn literal(&self) -> Option<&Literal> {
    self.literal.as_ref()
  }

  /// Rewrite `source`. Names in `shadowed` are bindings in scope that take
  /// precedence over builtin facts of the same name.
  pub fn apply(&self, source: &str, hints: &[ConstHint], shadowed: &BTreeSet<String>) -> String {
    let tokens = tokenize(source);
    let locals = declared_locals(&tokens);
    let replacement = self.literal.as_ref().map(Literal::to_lua);

    let mut out = String::with_capacity(source.len());
    let mut last = 0;
    let mut i = 0;
    while i < tokens.len() {
      let token = &tokens[i];
      let free = token.kind == Kind::Name && is_free(&tokens, i) && !locals.contains(token.text);

      if free && token.text == self.ident && !is_table_key(&tokens, i) {
        if let Some(lua) = &replacement {
          out.push_str(&source[last..token.start]);
          out.push_str(lua);
          last = token.end;
        }
        i += 1;
        continue;
      }

      if free && !shadowed.contains(token.text) && token.text != self.ident {
        if let Some((end, lua)) = fold(&tokens, i, hints) {
          out.push_str(&source[last..token.start]);
          out.push_str(&lua);
          last = tokens[end].end;
          i = end + 1;
          continue;
        }
      }
      i += 1;
    }
    out.push_str(&source[last..]);
    out
  }
}

/// Longest dotted path starting at `i` that names a constant value.
fn fold(tokens: &[Token<'_>], i: usize, hints: &[ConstHint]) -> Option<(usize, String)> {
  let mut path = tokens[i].text.to_string();
  let mut end = i;
  let mut found = None;
  loop {
    if let Some(hint) = hints.iter().find(|h| h.path == path)
      && let ConstKind::Value(value) = &hint.kind
    {
      found = Some((end, value));
    }
    match (tokens.get(end + 1), tokens.get(end + 2)) {
      (Some(dot), Some(name)) if dot.text == "." && name.kind == Kind::Name => {
        path.push('.');
        path.push_str(name.text);
        end += 2;
      }
      _ => break,
    }
  }

  let (end, value) = found?;
  if let Some(next) = tokens.get(end + 1)
    && (matches!(next.text, "=" | "(" | "." | "[" | ":" | "{") || next.kind == Kind::Str)
  {
    return None;
  }
  Some((end, value_to_lua(value)?))
}

fn is_free(tokens: &[Token<'_>], i: usize) -> bool {
  match i.checked_sub(1).map(|p| tokens[p].text) {
    Some("." | ":" | "::" | "local" | "function" | "goto") => false,
    _ => true,
  }
}

/// `{ name = ... }`: a field key, not a reference.
fn is_table_key(tokens: &[Token<'_>], i: usize) -> bool {
  tokens.get(i + 1).is_some_and(|t| t.text == "=")
}

/// Names introduced by `local`, `for` and function parameter lists.
fn declared_locals<'s>(tokens: &[Token<'s>]) -> BTreeSet<&'s str> {
  let mut locals = BTreeSet::new();
  let mut i = 0;
  while i < tokens.len() {
    let (stop, skip): (&[&str], usize) = match tokens[i].text {
      "local" if tokens.get(i + 1).is_some_and(|t| t.text == "function") => {
        if let Some(name) = tokens.get(i + 2)
          && name.kind == Kind::Name
        {
          locals.insert(name.text);
        }
        i += 1;
        continue;
      }
      "local" => (&["=", "in", ";"], 1),
      "for" => (&["=", "in"], 1),
      "function" => {
        let open = tokens[i..].iter().position(|t| t.text == "(").map(|p| i + p);
        match open {
          Some(open) => {
            i = open;
            (&[")"], 1)
          }
          None => break,
        }
      }
      _ => {
        i += 1;
        continue;
      }
    };
    i += skip;
    while let Some(token) = tokens.get(i) {
      if stop.contains(&token.text) || !(token.kind == Kind::Name || token.text == "," || token.text == "<" || token.text == ">") {
        break;
      }
      if token.kind == Kind::Name && !matches!(tokens.get(i.wrapping_sub(1)).map(|t| t.text), Some("<")) {
        locals.insert(token.text);
      }
      i += 1;
    }
  }
  locals
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
  Name,
  Number,
  Str,
  Punct,
}

#[derive(Debug, Clone, Copy)]
struct Token<'s> {
  kind: Kind,
  text: &'s str,
  start: usize,
  end: usize,
}

const PUNCT3: &[&str] = &["..."];
const PUNCT2: &[&str] = &["..", "::", "==", "~=", "<=", ">=", "//", "<<", ">>"];

/// Lua tokens of `source`, without whitespace and comments.
fn tokenize(source: &str) -> Vec<Token<'_>> {
  let bytes = source.as_bytes();
  let mut tokens = Vec::new();
  let mut i = 0;
  while i < bytes.len() {
    let b = bytes[i];
    let start = i;
    let kind = if b.is_ascii_whitespace() {
      i += 1;
      continue;
    } else if source[i..].starts_with("--") {
      i = match long_bracket_level(&source[i + 2..]) {
        Some(level) => skip_long_bracket(source, i + 2, level),
        None => source[i..].find('\n').map_or(bytes.len(), |n| i + n),
      };
      continue;
    } else if b == b'[' && let Some(level) = long_bracket_level(&source[i..]) {
      i = skip_long_bracket(source, i, level);
      Kind::Str
    } else if b == b'"' || b == b'\'' {
      i = skip_quoted(bytes, i);
      Kind::Str
    } else if b.is_ascii_digit() || (b == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) {
      i = skip_number(bytes, i);
      Kind::Number
    } else if b.is_ascii_alphabetic() || b == b'_' {
      while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
      }
      Kind::Name
    } else {
      let rest = &source[i..];
      i += PUNCT3
        .iter()
        .chain(PUNCT2)
        .find(|p| rest.starts_with(**p))
        .map_or_else(|| rest.chars().next().map_or(1, char::len_utf8), |p| p.len());
      Kind::Punct
    };
    tokens.push(Token {
      kind,
      text: &source[start..i],
      start,
      end: i,
    });
  }
  tokens
}

fn skip_long_bracket(source: &str, open: usize, level: usize) -> usize {
  let close = format!("]{}]", "=".repeat(level));
  let body = open + level + 2;
  source[body..].find(&close).map_or(source.len(), |p| body + p + close.len())
}

fn skip_quoted(bytes: &[u8], start: usize) -> usize {
  let quote = bytes[start];
  let mut i = start + 1;
  while i < bytes.len() {
    match bytes[i] {
      b'\\' => i += 2,
      b if b == quote => return i + 1,
      _ => i += 1,
    }
  }
  bytes.len()
}

fn skip_number(bytes: &[u8], start: usize) -> usize {
  let mut i = start;
  while i < bytes.len() {
    let b = bytes[i];
    let exponent_sign =
      matches!(b, b'+' | b'-') && i > start && matches!(bytes[i - 1], b'e' | b'E' | b'p' | b'P') && !is_hex(bytes, start, i);
    if b.is_ascii_alphanumeric() || b == b'.' || b == b'_' || exponent_sign {
      i += 1;
    } else {
      break;
    }
  }
  i
}

/// In a hex literal `e` is a digit, so only `p` introduces an exponent.
fn is_hex(bytes: &[u8], start: usize, i: usize) -> bool {
  bytes.get(start + 1).is_some_and(|b| matches!(b, b'x' | b'X')) && matches!(bytes[i - 1], b'e' | b'E')
}
