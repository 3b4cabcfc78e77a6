//! `KEY=value` rendering of evaluated environments.

use std::collections::BTreeMap;
use std::fmt::Write;

use serde_json::Value;

/// Render one variable as `KEY=value`.
pub fn render_line(key: &str, value: &Value) -> String {
  format!("{}={}", key, render_value(value))
}

/// Render every variable, one line each, in key order.
pub fn render_env(env: &BTreeMap<String, Value>) -> String {
  let mut out = String::new();
  for (key, value) in env {
    out.push_str(&render_line(key, value));
    out.push('\n');
  }
  out
}

/// Strings are double-quoted with escapes, scalars plain, null as `<nil>`,
/// lists and tables as compact JSON.
pub fn render_value(value: &Value) -> String {
  match value {
    Value::String(s) => quote(s),
    Value::Null => "<nil>".into(),
    Value::Bool(b) => b.to_string(),
    Value::Number(n) => match n.as_f64() {
      Some(x) if n.is_f64() => format_float(x),
      _ => n.to_string(),
    },
    Value::Array(_) | Value::Object(_) => value.to_string(),
  }
}

/// Double-quote `s`, escaping quotes, backslashes and non-printable characters.
pub fn quote(s: &str) -> String {
  let mut out = String::with_capacity(s.len() + 2);
  out.push('"');
  for ch in s.chars() {
    match ch {
      '"' => out.push_str("\\\""),
      '\\' => out.push_str("\\\\"),
      '\x07' => out.push_str("\\a"),
      '\x08' => out.push_str("\\b"),
      '\x0c' => out.push_str("\\f"),
      '\n' => out.push_str("\\n"),
      '\r' => out.push_str("\\r"),
      '\t' => out.push_str("\\t"),
      '\x0b' => out.push_str("\\v"),
      c if c.is_control() => {
        let code = c as u32;
        let _ = match code {
          0..0x80 => write!(out, "\\x{:02x}", code),
          0x80..0x10000 => write!(out, "\\u{:04x}", code),
          _ => write!(out, "\\U{:08x}", code),
        };
      }
      c => out.push(c),
    }
  }
  out.push('"');
  out
}

/// Shortest float form, switching to an exponent below 1e-4 or from 1e21 on.
fn format_float(x: f64) -> String {
  if x.is_nan() {
    return "NaN".into();
  }
  if x.is_infinite() {
    return if x > 0.0 { "+Inf".into() } else { "-Inf".into() };
  }
  let abs = x.abs();
  if abs == 0.0 || (1e-4..1e21).contains(&abs) {
    return format!("{}", x);
  }
  let formatted = format!("{:e}", x);
  match formatted.split_once('e') {
    Some((mantissa, exp)) => {
      let exp: i32 = exp.parse().unwrap_or(0);
      format!("{}e{}{:02}", mantissa, if exp < 0 { '-' } else { '+' }, exp.abs())
    }
    None => formatted,
  }
}
