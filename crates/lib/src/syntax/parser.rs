//! Recursive-descent parser over the token stream.

use super::ast::{Ast, Composite, Expression, Namespace, ParamValue, Parameter, Statement};
use super::error::ParseError;
use super::lexer::{Token, TokenKind, lex};
use super::Span;

/// Source name used when a manifest is parsed without one.
const ANONYMOUS: &str = "<input>";

/// Parse manifest text into an [`Ast`].
pub fn parse(source: &str) -> Result<Ast, ParseError> {
  parse_named(ANONYMOUS, source)
}

/// Parse manifest text, naming it `name` in error messages.
pub fn parse_named(name: &str, source: &str) -> Result<Ast, ParseError> {
  parse_origin(0, name, source)
}

/// Parse manifest text whose namespaces are tagged with `origin`.
pub(crate) fn parse_origin(origin: usize, name: &str, source: &str) -> Result<Ast, ParseError> {
  let tokens = lex(source).map_err(|e| ParseError::new(name, source, e.span.start, e.message))?;
  Parser {
    name,
    source,
    origin,
    tokens,
    pos: 0,
  }
  .parse_ast()
}

/// Sections of a namespace, in the order they must appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Section {
  Composites,
  Parameters,
  Statements,
}

impl Section {
  fn name(self) -> &'static str {
    match self {
      Section::Composites => "composites",
      Section::Parameters => "parameters",
      Section::Statements => "statements",
    }
  }
}

struct Parser<'a> {
  name: &'a str,
  source: &'a str,
  origin: usize,
  tokens: Vec<Token>,
  pos: usize,
}

impl<'a> Parser<'a> {
  fn parse_ast(mut self) -> Result<Ast, ParseError> {
    let mut ast = Ast::default();
    while !self.at(&TokenKind::Eof) {
      ast.namespaces.push(self.parse_namespace()?);
    }
    Ok(ast)
  }

  fn current(&self) -> &Token {
    // the token stream always ends with Eof and the parser never advances past it
    &self.tokens[self.pos.min(self.tokens.len() - 1)]
  }

  fn at(&self, kind: &TokenKind) -> bool {
    &self.current().kind == kind
  }

  fn advance(&mut self) -> Token {
    let token = self.current().clone();
    if token.kind != TokenKind::Eof {
      self.pos += 1;
    }
    token
  }

  fn eat(&mut self, kind: &TokenKind) -> bool {
    if self.at(kind) {
      self.advance();
      true
    } else {
      false
    }
  }

  fn unexpected(&self, expected: &str) -> ParseError {
    let token = self.current();
    ParseError::unexpected(self.name, self.source, token.span.start, token.kind.to_string(), expected)
  }

  fn error_at(&self, offset: usize, message: impl Into<String>) -> ParseError {
    ParseError::new(self.name, self.source, offset, message.into())
  }

  fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token, ParseError> {
    if self.at(&kind) {
      Ok(self.advance())
    } else {
      Err(self.unexpected(expected))
    }
  }

  fn expect_ident(&mut self, expected: &str) -> Result<(String, Span), ParseError> {
    match &self.current().kind {
      TokenKind::Ident(name) => {
        let name = name.clone();
        let span = self.advance().span;
        Ok((name, span))
      }
      _ => Err(self.unexpected(expected)),
    }
  }

  fn parse_namespace(&mut self) -> Result<Namespace, ParseError> {
    if self.at(&TokenKind::LBracket) {
      return Err(self.error_at(self.current().span.start, "`[` is reserved and cannot start a namespace"));
    }
    let (ident, start) = self.expect_ident("namespace name")?;
    let mut namespace = Namespace {
      ident,
      composites: Vec::new(),
      parameters: Vec::new(),
      statements: Vec::new(),
      origin: self.origin,
      span: start,
    };

    let mut last: Option<Section> = None;
    loop {
      let section = match self.current().kind {
        TokenKind::LAngle => Section::Composites,
        TokenKind::LParen => Section::Parameters,
        TokenKind::LBrace => Section::Statements,
        TokenKind::LBracket => {
          return Err(self.error_at(self.current().span.start, "`[ ]` sections are reserved"));
        }
        _ => break,
      };
      if let Some(previous) = last {
        let offset = self.current().span.start;
        if previous == section {
          return Err(self.error_at(offset, format!("duplicate {} section", section.name())));
        }
        if previous > section {
          return Err(self.error_at(
            offset,
            format!("{} must precede {}", section.name(), previous.name()),
          ));
        }
      }
      last = Some(section);

      match section {
        Section::Composites => namespace.composites = self.parse_composites()?,
        Section::Parameters => namespace.parameters = self.parse_parameters()?,
        Section::Statements => namespace.statements = self.parse_statements()?,
      }
    }

    let end = self.tokens[self.pos.saturating_sub(1)].span.end;
    namespace.span = Span::new(start.start, end.max(start.end));
    Ok(namespace)
  }

  fn parse_composites(&mut self) -> Result<Vec<Composite>, ParseError> {
    self.expect(TokenKind::LAngle, "`<`")?;
    let mut composites = Vec::new();
    while !self.eat(&TokenKind::RAngle) {
      let (ident, span) = self.expect_ident("composite namespace name or `>`")?;
      let arguments = if self.at(&TokenKind::LParen) {
        self.parse_parameters()?
      } else {
        Vec::new()
      };
      let end = self.tokens[self.pos - 1].span.end;
      composites.push(Composite {
        ident,
        arguments,
        span: Span::new(span.start, end),
      });
      if !self.eat(&TokenKind::Comma) && !self.at(&TokenKind::RAngle) {
        return Err(self.unexpected("`,` or `>`"));
      }
    }
    Ok(composites)
  }

  fn parse_parameters(&mut self) -> Result<Vec<Parameter>, ParseError> {
    self.expect(TokenKind::LParen, "`(`")?;
    let mut parameters = Vec::new();
    while !self.eat(&TokenKind::RParen) {
      parameters.push(self.parse_value()?);
      if !self.eat(&TokenKind::Comma) && !self.at(&TokenKind::RParen) {
        return Err(self.unexpected("`,` or `)`"));
      }
    }
    Ok(parameters)
  }

  fn parse_value(&mut self) -> Result<Parameter, ParseError> {
    let token = self.current().clone();
    let value = match &token.kind {
      TokenKind::Str(s) => ParamValue::Str(s.clone()),
      TokenKind::Number(text) => parse_number(text).ok_or_else(|| self.error_at(token.span.start, "invalid number"))?,
      TokenKind::Ident(word) if word == "true" => ParamValue::Bool(true),
      TokenKind::Ident(word) if word == "false" => ParamValue::Bool(false),
      TokenKind::Ident(word) => ParamValue::Word(word.clone()),
      _ => return Err(self.unexpected("parameter value")),
    };
    self.advance();
    Ok(Parameter {
      value,
      span: token.span,
    })
  }

  fn parse_statements(&mut self) -> Result<Vec<Statement>, ParseError> {
    self.expect(TokenKind::LBrace, "`{`")?;
    let mut statements = Vec::new();
    loop {
      while self.eat(&TokenKind::Semi) {}
      if self.eat(&TokenKind::RBrace) {
        break;
      }
      statements.push(self.parse_statement()?);
      if !self.at(&TokenKind::Semi) && !self.at(&TokenKind::RBrace) {
        return Err(self.unexpected("`;` or `}`"));
      }
    }
    Ok(statements)
  }

  fn parse_statement(&mut self) -> Result<Statement, ParseError> {
    let (ident, span) = self.expect_ident("variable name or `}`")?;
    if !is_variable_name(&ident) {
      return Err(self.error_at(span.start, format!("`{}` is not a valid variable name", ident)));
    }
    let operator = self.expect(TokenKind::Assign, "`=`")?;
    let token = self.current().clone();
    let source = match token.kind {
      TokenKind::Expr(source) => source,
      _ => return Err(self.unexpected("expression")),
    };
    if source.is_empty() {
      return Err(self.error_at(token.span.start, format!("empty expression for `{}`", ident)));
    }
    self.advance();
    Ok(Statement {
      ident,
      operator: self.source[operator.span.start..operator.span.end].to_string(),
      expression: Expression {
        source,
        offset: token.span.start,
      },
      span: Span::new(span.start, token.span.end),
    })
  }
}

/// Variable names must be usable as identifiers inside expressions.
fn is_variable_name(ident: &str) -> bool {
  let mut chars = ident.chars();
  chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_number(text: &str) -> Option<ParamValue> {
  let (negative, digits) = match text.strip_prefix('-') {
    Some(rest) => (true, rest),
    None => (false, text.strip_prefix('+').unwrap_or(text)),
  };
  if let Some(hex) = digits.strip_prefix("0x") {
    let value = i64::from_str_radix(hex, 16).ok()?;
    return Some(ParamValue::Int(if negative { -value } else { value }));
  }
  if !digits.contains(['.', 'e', 'E'])
    && let Ok(value) = text.trim_start_matches('+').parse::<i64>()
  {
    return Some(ParamValue::Int(value));
  }
  // integers beyond 64 bits narrow to floats
  text.trim_start_matches('+').parse::<f64>().ok().map(ParamValue::Float)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_full_namespace() {
    let ast = parse(r#"dev<base, tools(1, "x")>(a, 2.5, true) { PATH = "/bin"; CC = "clang" }"#).unwrap();
    assert_eq!(ast.namespaces.len(), 1);
    let ns = &ast.namespaces[0];
    assert_eq!(ns.ident, "dev");
    assert_eq!(ns.composites.len(), 2);
    assert_eq!(ns.composites[1].ident, "tools");
    assert_eq!(
      ns.composites[1].arguments.iter().map(|p| p.value.clone()).collect::<Vec<_>>(),
      vec![ParamValue::Int(1), ParamValue::Str("x".into())]
    );
    assert_eq!(
      ns.parameters.iter().map(|p| p.value.clone()).collect::<Vec<_>>(),
      vec![ParamValue::Word("a".into()), ParamValue::Float(2.5), ParamValue::Bool(true)]
    );
    assert_eq!(ns.statements.len(), 2);
    assert_eq!(ns.statements[0].ident, "PATH");
    assert_eq!(ns.statements[0].operator, "=");
    assert_eq!(ns.statements[0].expression.source, r#""/bin""#);
  }

  #[test]
  fn parses_multiple_namespaces_in_order() {
    let ast = parse("default<custom>{ foo = \"abc\"; } custom{ foo = 1+2; bar = \"xyz\"; }").unwrap();
    let idents: Vec<_> = ast.namespaces.iter().map(|n| n.ident.as_str()).collect();
    assert_eq!(idents, vec!["default", "custom"]);
    assert_eq!(ast.namespaces[1].statements[0].expression.source, "1+2");
  }

  #[test]
  fn allows_duplicate_identifiers() {
    let ast = parse("a{} a{}").unwrap();
    assert_eq!(ast.lookup("a").count(), 2);
  }

  #[test]
  fn allows_bare_and_empty_namespaces() {
    let ast = parse("a b<> c() d{}").unwrap();
    assert_eq!(ast.namespaces.len(), 4);
  }

  #[test]
  fn allows_trailing_separators() {
    let ast = parse("a<b,>(1,){ x = 1;; }").unwrap();
    assert_eq!(ast.namespaces[0].composites.len(), 1);
    assert_eq!(ast.namespaces[0].parameters.len(), 1);
    assert_eq!(ast.namespaces[0].statements.len(), 1);
  }

  #[test]
  fn expression_offset_points_into_source() {
    let source = "a{ x = 1 + 2 }";
    let ast = parse(source).unwrap();
    let expr = &ast.namespaces[0].statements[0].expression;
    assert_eq!(&source[expr.offset..expr.offset + expr.source.len()], "1 + 2");
  }

  #[test]
  fn rejects_parameters_after_statements() {
    let err = parse("a{ x = 1 }(1)").unwrap_err();
    assert_eq!(err.message, "parameters must precede statements");
    assert_eq!((err.line, err.column), (1, 11));
  }

  #[test]
  fn rejects_composites_after_parameters() {
    let err = parse("a(1)<b>").unwrap_err();
    assert_eq!(err.message, "composites must precede parameters");
  }

  #[test]
  fn rejects_composites_after_statements() {
    let err = parse("a{}<b>").unwrap_err();
    assert_eq!(err.message, "composites must precede statements");
  }

  #[test]
  fn rejects_duplicate_sections() {
    let err = parse("a(1)(2)").unwrap_err();
    assert_eq!(err.message, "duplicate parameters section");
  }

  #[test]
  fn rejects_reserved_brackets() {
    assert!(parse("a[1]").is_err());
    assert!(parse("[a]").is_err());
  }

  #[test]
  fn reports_unexpected_token_with_expectation() {
    let err = parse("a<b c>").unwrap_err();
    assert_eq!(err.expected.as_deref(), Some("`,` or `>`"));
    assert_eq!(err.found, "identifier `c`");
    assert_eq!(err.column, 5);
  }

  #[test]
  fn reports_position_after_comments() {
    let err = parse("// comment\n/* block\n */ a{ 1 = 2 }").unwrap_err();
    assert_eq!((err.line, err.column), (3, 8));
    assert!(err.detail().contains("^"));
  }

  #[test]
  fn rejects_empty_expression() {
    let err = parse("a{ x = ; }").unwrap_err();
    assert_eq!(err.message, "empty expression for `x`");
  }

  #[test]
  fn rejects_invalid_variable_names() {
    let err = parse("a{ my-var = 1 }").unwrap_err();
    assert_eq!(err.message, "`my-var` is not a valid variable name");
  }

  #[test]
  fn reports_unterminated_statements() {
    let err = parse("a{ x = 1").unwrap_err();
    assert_eq!(err.expected.as_deref(), Some("`;` or `}`"));
    assert_eq!(err.found, "end of input");
  }

  #[test]
  fn never_panics_on_garbage() {
    for input in ["<", ">", "a<", "a(", "a{", "a{x", "a{x=", "=", "a)", "a<b(>", "\"", "a{x=}", "}{"] {
      assert!(parse(input).is_err(), "expected error for {:?}", input);
    }
  }

  #[test]
  fn numbers_narrow_and_parse_hex() {
    assert_eq!(parse_number("42"), Some(ParamValue::Int(42)));
    assert_eq!(parse_number("-0x10"), Some(ParamValue::Int(-16)));
    assert_eq!(parse_number("1e3"), Some(ParamValue::Float(1000.0)));
    assert_eq!(parse_number("99999999999999999999"), Some(ParamValue::Float(1e20)));
  }

  #[test]
  fn display_round_trips() {
    let source = r#"dev<base(1, "x")>(a, 2.5) { x = 1 + 2; y = "a" .. "b"\; }"#;
    let ast = parse(source).unwrap();
    let rendered = ast.to_string();
    let reparsed = parse(&rendered).unwrap();
    assert_eq!(reparsed.to_string(), rendered);
    assert_eq!(reparsed.namespaces[0].statements[1].expression.source, r#""a" .. "b";"#);
  }
}
