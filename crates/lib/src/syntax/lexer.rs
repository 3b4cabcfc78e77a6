//! Manifest tokenizer.
//!
//! A hand-written state machine with two modes: the structural mode, which
//! produces identifiers, literals and punctuation, and the expression mode,
//! entered after `=`, which captures raw expression text up to the `;` or `}`
//! that closes the statement at brace-depth zero.
//!
//! Every token carries a byte [`Span`] into the original text, so comments and
//! escaped characters never shift reported positions.

use std::fmt;

use super::Span;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
  Ident(String),
  Str(String),
  /// Numeric literal, kept as written.
  Number(String),
  /// Raw expression text following `=`.
  Expr(String),
  LAngle,
  RAngle,
  LParen,
  RParen,
  LBrace,
  RBrace,
  LBracket,
  RBracket,
  Comma,
  Semi,
  Assign,
  Eof,
}

impl fmt::Display for TokenKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TokenKind::Ident(name) => write!(f, "identifier `{}`", name),
      TokenKind::Str(s) => write!(f, "string {:?}", s),
      TokenKind::Number(n) => write!(f, "number `{}`", n),
      TokenKind::Expr(e) => write!(f, "expression `{}`", e),
      TokenKind::LAngle => f.write_str("`<`"),
      TokenKind::RAngle => f.write_str("`>`"),
      TokenKind::LParen => f.write_str("`(`"),
      TokenKind::RParen => f.write_str("`)`"),
      TokenKind::LBrace => f.write_str("`{`"),
      TokenKind::RBrace => f.write_str("`}`"),
      TokenKind::LBracket => f.write_str("`[`"),
      TokenKind::RBracket => f.write_str("`]`"),
      TokenKind::Comma => f.write_str("`,`"),
      TokenKind::Semi => f.write_str("`;`"),
      TokenKind::Assign => f.write_str("`=`"),
      TokenKind::Eof => f.write_str("end of input"),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
  pub kind: TokenKind,
  pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
  pub message: String,
  pub span: Span,
}

/// Tokenize manifest text. Stops at the first malformed token.
pub fn lex(source: &str) -> Result<Vec<Token>, LexError> {
  Lexer::new(source).run()
}

struct Lexer<'a> {
  chars: std::str::Chars<'a>,
  current: Option<char>,
  offset: usize,
  tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
  fn new(src: &'a str) -> Self {
    let mut chars = src.chars();
    let current = chars.next();
    Self {
      chars,
      current,
      offset: 0,
      tokens: Vec::new(),
    }
  }

  fn run(mut self) -> Result<Vec<Token>, LexError> {
    while let Some(ch) = self.current {
      match ch {
        '/' if self.peek() == Some('/') => self.eat_line_comment(),
        '#' => self.eat_line_comment(),
        '/' if self.peek() == Some('*') => self.eat_block_comment()?,
        ch if ch.is_whitespace() => {
          self.bump();
        }
        ch if ch.is_ascii_alphabetic() || ch == '_' => self.lex_identifier(),
        ch if ch.is_ascii_digit() => self.lex_number()?,
        '-' | '+' if self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') => self.lex_number()?,
        '.' if self.peek().is_some_and(|c| c.is_ascii_digit()) => self.lex_number()?,
        '"' | '\'' => self.lex_string(ch)?,
        '=' => {
          let start = self.offset;
          self.bump();
          self.push_token(TokenKind::Assign, start, self.offset);
          self.lex_expression()?;
        }
        _ => self.lex_symbol(ch)?,
      }
    }
    self.push_token(TokenKind::Eof, self.offset, self.offset);
    Ok(self.tokens)
  }

  fn bump(&mut self) -> Option<char> {
    if let Some(ch) = self.current {
      self.offset += ch.len_utf8();
    }
    self.current = self.chars.next();
    self.current
  }

  fn peek(&self) -> Option<char> {
    self.chars.clone().next()
  }

  fn push_token(&mut self, kind: TokenKind, start: usize, end: usize) {
    self.tokens.push(Token {
      kind,
      span: Span::new(start, end),
    });
  }

  fn error(&self, start: usize, end: usize, message: impl Into<String>) -> LexError {
    LexError {
      message: message.into(),
      span: Span::new(start, end),
    }
  }

  fn eat_line_comment(&mut self) {
    while let Some(ch) = self.current {
      if ch == '\n' {
        break;
      }
      self.bump();
    }
  }

  fn eat_block_comment(&mut self) -> Result<(), LexError> {
    let start = self.offset;
    self.bump();
    self.bump();
    while let Some(ch) = self.current {
      if ch == '*' && self.peek() == Some('/') {
        self.bump();
        self.bump();
        return Ok(());
      }
      self.bump();
    }
    Err(self.error(start, self.offset, "unterminated block comment"))
  }

  fn lex_identifier(&mut self) {
    let start = self.offset;
    let mut ident = String::new();
    while let Some(ch) = self.current {
      if ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.') {
        ident.push(ch);
        self.bump();
      } else {
        break;
      }
    }
    self.push_token(TokenKind::Ident(ident), start, self.offset);
  }

  fn lex_number(&mut self) -> Result<(), LexError> {
    let start = self.offset;
    let mut text = String::new();
    if let Some(sign @ ('-' | '+')) = self.current {
      text.push(sign);
      self.bump();
    }

    if self.current == Some('0') && matches!(self.peek(), Some('x' | 'X')) {
      text.push('0');
      self.bump();
      text.push('x');
      self.bump();
      while let Some(ch) = self.current.filter(|c| c.is_ascii_hexdigit()) {
        text.push(ch);
        self.bump();
      }
      if text.ends_with('x') {
        return Err(self.error(start, self.offset, "hexadecimal literal has no digits"));
      }
    } else {
      self.eat_digits(&mut text);
      if self.current == Some('.') {
        text.push('.');
        self.bump();
        self.eat_digits(&mut text);
      }
      if let Some(e @ ('e' | 'E')) = self.current {
        text.push(e);
        self.bump();
        if let Some(sign @ ('-' | '+')) = self.current {
          text.push(sign);
          self.bump();
        }
        if !self.current.is_some_and(|c| c.is_ascii_digit()) {
          return Err(self.error(start, self.offset, "malformed exponent in number"));
        }
        self.eat_digits(&mut text);
      }
    }

    if self.current.is_some_and(|c| c.is_ascii_alphabetic() || c == '_') {
      return Err(self.error(start, self.offset + 1, "invalid character in number"));
    }
    self.push_token(TokenKind::Number(text), start, self.offset);
    Ok(())
  }

  fn eat_digits(&mut self, text: &mut String) {
    while let Some(ch) = self.current.filter(|c| c.is_ascii_digit() || *c == '_') {
      if ch != '_' {
        text.push(ch);
      }
      self.bump();
    }
  }

  fn lex_string(&mut self, quote: char) -> Result<(), LexError> {
    let start = self.offset;
    self.bump();
    let mut value = String::new();
    loop {
      match self.current {
        None | Some('\n') => return Err(self.error(start, self.offset, "unterminated string literal")),
        Some(ch) if ch == quote => {
          self.bump();
          break;
        }
        Some('\\') => {
          let escape_start = self.offset;
          self.bump();
          let escaped = match self.current {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('0') => '\0',
            Some('\\') => '\\',
            Some('"') => '"',
            Some('\'') => '\'',
            Some('x') => {
              self.bump();
              let code = self.take_hex(2, escape_start)?;
              value.push(self.to_char(code, escape_start)?);
              continue;
            }
            Some('u') if self.peek() == Some('{') => {
              self.bump();
              self.bump();
              let mut digits = String::new();
              while let Some(ch) = self.current.filter(|c| c.is_ascii_hexdigit()) {
                digits.push(ch);
                self.bump();
              }
              if self.current != Some('}') || digits.is_empty() || digits.len() > 6 {
                return Err(self.error(escape_start, self.offset, "malformed unicode escape"));
              }
              self.bump();
              let code = u32::from_str_radix(&digits, 16)
                .map_err(|_| self.error(escape_start, self.offset, "malformed unicode escape"))?;
              value.push(self.to_char(code, escape_start)?);
              continue;
            }
            _ => {
              return Err(self.error(escape_start, self.offset + 1, "unknown escape sequence"));
            }
          };
          value.push(escaped);
          self.bump();
        }
        Some(ch) => {
          value.push(ch);
          self.bump();
        }
      }
    }
    self.push_token(TokenKind::Str(value), start, self.offset);
    Ok(())
  }

  fn take_hex(&mut self, count: usize, escape_start: usize) -> Result<u32, LexError> {
    let mut digits = String::new();
    for _ in 0..count {
      match self.current.filter(|c| c.is_ascii_hexdigit()) {
        Some(ch) => {
          digits.push(ch);
          self.bump();
        }
        None => return Err(self.error(escape_start, self.offset, "malformed hex escape")),
      }
    }
    u32::from_str_radix(&digits, 16).map_err(|_| self.error(escape_start, self.offset, "malformed hex escape"))
  }

  fn to_char(&self, code: u32, escape_start: usize) -> Result<char, LexError> {
    char::from_u32(code).ok_or_else(|| self.error(escape_start, self.offset, "escape is not a valid character"))
  }

  /// Capture raw expression text after `=`.
  ///
  /// Stops before a `;` or `}` at brace-depth zero. Quoted strings, Lua long
  /// brackets and `--` comments are opaque; `\;` yields a literal `;`.
  fn lex_expression(&mut self) -> Result<(), LexError> {
    while self.current.is_some_and(|c| c.is_whitespace()) {
      self.bump();
    }
    let start = self.offset;
    let mut text = String::new();
    let mut depth = 0usize;
    let mut end = self.offset;

    while let Some(ch) = self.current {
      match ch {
        ';' if depth == 0 => break,
        '}' if depth == 0 => break,
        '\\' if self.peek() == Some(';') => {
          self.bump();
          text.push(';');
          self.bump();
        }
        '{' => {
          depth += 1;
          text.push(ch);
          self.bump();
        }
        '}' => {
          depth -= 1;
          text.push(ch);
          self.bump();
        }
        '"' | '\'' => self.copy_quoted(ch, &mut text)?,
        '[' if matches!(self.peek(), Some('[' | '=')) => self.copy_long_bracket(&mut text)?,
        '-' if self.peek() == Some('-') => {
          while let Some(c) = self.current {
            if c == '\n' {
              break;
            }
            text.push(c);
            self.bump();
          }
        }
        _ => {
          text.push(ch);
          self.bump();
        }
      }
      if !text.trim_end().is_empty() && !ch.is_whitespace() {
        end = self.offset;
      }
    }

    if depth > 0 {
      return Err(self.error(start, self.offset, "unbalanced `{` in expression"));
    }

    let trimmed = text.trim_end().to_string();
    self.push_token(TokenKind::Expr(trimmed), start, end.max(start));
    Ok(())
  }

  fn copy_quoted(&mut self, quote: char, text: &mut String) -> Result<(), LexError> {
    let start = self.offset;
    text.push(quote);
    self.bump();
    loop {
      match self.current {
        None | Some('\n') => return Err(self.error(start, self.offset, "unterminated string in expression")),
        Some('\\') => {
          text.push('\\');
          self.bump();
          if let Some(escaped) = self.current {
            text.push(escaped);
            self.bump();
          }
        }
        Some(ch) => {
          text.push(ch);
          self.bump();
          if ch == quote {
            return Ok(());
          }
        }
      }
    }
  }

  fn copy_long_bracket(&mut self, text: &mut String) -> Result<(), LexError> {
    let start = self.offset;
    let mut probe = self.chars.clone();
    let mut level = 0usize;
    let mut next = probe.next();
    while next == Some('=') {
      level += 1;
      next = probe.next();
    }
    if next != Some('[') {
      // a plain index such as `t[=`, let the expression engine report it
      text.push('[');
      self.bump();
      return Ok(());
    }

    let close = format!("]{}]", "=".repeat(level));
    for _ in 0..level + 2 {
      if let Some(ch) = self.current {
        text.push(ch);
      }
      self.bump();
    }
    while let Some(ch) = self.current {
      text.push(ch);
      self.bump();
      if text.ends_with(&close) {
        return Ok(());
      }
    }
    Err(self.error(start, self.offset, "unterminated long string in expression"))
  }

  fn lex_symbol(&mut self, ch: char) -> Result<(), LexError> {
    let start = self.offset;
    let kind = match ch {
      '<' => TokenKind::LAngle,
      '>' => TokenKind::RAngle,
      '(' => TokenKind::LParen,
      ')' => TokenKind::RParen,
      '{' => TokenKind::LBrace,
      '}' => TokenKind::RBrace,
      '[' => TokenKind::LBracket,
      ']' => TokenKind::RBracket,
      ',' => TokenKind::Comma,
      ';' => TokenKind::Semi,
      other => {
        return Err(self.error(start, start + other.len_utf8(), format!("unexpected character `{}`", other)));
      }
    };
    self.bump();
    self.push_token(kind, start, self.offset);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn kinds(source: &str) -> Vec<TokenKind> {
    lex(source).unwrap().into_iter().map(|t| t.kind).collect()
  }

  #[test]
  fn lexes_namespace_header() {
    assert_eq!(
      kinds(r#"dev<base(1, "x")>(true)"#),
      vec![
        TokenKind::Ident("dev".into()),
        TokenKind::LAngle,
        TokenKind::Ident("base".into()),
        TokenKind::LParen,
        TokenKind::Number("1".into()),
        TokenKind::Comma,
        TokenKind::Str("x".into()),
        TokenKind::RParen,
        TokenKind::RAngle,
        TokenKind::LParen,
        TokenKind::Ident("true".into()),
        TokenKind::RParen,
        TokenKind::Eof,
      ]
    );
  }

  #[test]
  fn expression_runs_to_semicolon() {
    assert_eq!(
      kinds("a{ x = 1 + 2; y = 3 }"),
      vec![
        TokenKind::Ident("a".into()),
        TokenKind::LBrace,
        TokenKind::Ident("x".into()),
        TokenKind::Assign,
        TokenKind::Expr("1 + 2".into()),
        TokenKind::Semi,
        TokenKind::Ident("y".into()),
        TokenKind::Assign,
        TokenKind::Expr("3".into()),
        TokenKind::RBrace,
        TokenKind::Eof,
      ]
    );
  }

  #[test]
  fn expression_tracks_brace_depth() {
    let tokens = kinds("a{ t = ({ 1; 2 })[1]; }");
    assert_eq!(tokens[4], TokenKind::Expr("({ 1; 2 })[1]".into()));
    assert_eq!(tokens[5], TokenKind::Semi);
  }

  #[test]
  fn expression_strings_are_opaque() {
    let tokens = kinds(r#"a{ s = "x;}" .. 'y;'; }"#);
    assert_eq!(tokens[4], TokenKind::Expr(r#""x;}" .. 'y;'"#.into()));
  }

  #[test]
  fn escaped_semicolon_is_kept() {
    let tokens = kinds(r#"a{ s = "x" .. ("y")\; }"#);
    assert_eq!(tokens[4], TokenKind::Expr(r#""x" .. ("y");"#.into()));
  }

  #[test]
  fn long_bracket_strings_are_opaque() {
    let tokens = kinds("a{ s = [==[ ; } ]==]; }");
    assert_eq!(tokens[4], TokenKind::Expr("[==[ ; } ]==]".into()));
  }

  #[test]
  fn comments_do_not_shift_spans() {
    let source = "/* header */ a // trailing\n# note\n{ x = 1 }";
    let tokens = lex(source).unwrap();
    let ident = &tokens[0];
    assert_eq!(&source[ident.span.start..ident.span.end], "a");
    let expr = &tokens[4];
    assert_eq!(&source[expr.span.start..expr.span.end], "1");
  }

  #[test]
  fn numbers_with_sign_and_exponent() {
    assert_eq!(
      kinds("(-1, 2.5e3, 0x1F, +4)"),
      vec![
        TokenKind::LParen,
        TokenKind::Number("-1".into()),
        TokenKind::Comma,
        TokenKind::Number("2.5e3".into()),
        TokenKind::Comma,
        TokenKind::Number("0x1F".into()),
        TokenKind::Comma,
        TokenKind::Number("+4".into()),
        TokenKind::RParen,
        TokenKind::Eof,
      ]
    );
  }

  #[test]
  fn string_escapes() {
    assert_eq!(
      kinds(r#"("a\tb\x41\u{263A}\"")"#)[1],
      TokenKind::Str("a\tbA\u{263A}\"".into())
    );
  }

  #[test]
  fn unterminated_block_comment_is_an_error() {
    let err = lex("a /* never closed").unwrap_err();
    assert_eq!(err.message, "unterminated block comment");
    assert_eq!(err.span.start, 2);
  }

  #[test]
  fn unterminated_string_is_an_error() {
    let err = lex("a(\"open").unwrap_err();
    assert_eq!(err.message, "unterminated string literal");
  }

  #[test]
  fn unexpected_character_is_an_error() {
    let err = lex("a @").unwrap_err();
    assert_eq!(err.message, "unexpected character `@`");
    assert_eq!(err.span.start, 2);
  }
}
