//! Builtin environment cache.
//!
//! Host facts and the utility function tables every expression can see. The
//! snapshot is gathered once per process; [`cache`] hands out independent
//! copies so each evaluation may adjust its own view.

mod file;
mod mung;
mod path;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use menv_platform::HostInfo;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

static CACHE: OnceLock<Builtins> = OnceLock::new();

/// Return a private copy of the process-wide builtin snapshot.
pub fn cache() -> Builtins {
  CACHE.get_or_init(Builtins::detect).clone()
}

#[derive(Debug, Error)]
pub enum BuiltinError {
  #[error("{function}: {message}")]
  Argument { function: &'static str, message: String },

  #[error("{function}: {message}")]
  Io { function: &'static str, message: String },
}

/// A native function exposed to expressions.
#[derive(Clone, Copy)]
pub struct Builtin {
  pub name: &'static str,
  pub func: fn(&[Value]) -> Result<Value, BuiltinError>,
}

impl Builtin {
  pub fn call(&self, args: &[Value]) -> Result<Value, BuiltinError> {
    (self.func)(args)
  }
}

impl PartialEq for Builtin {
  fn eq(&self, other: &Self) -> bool {
    self.name == other.name
  }
}

impl fmt::Debug for Builtin {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "<builtin {}>", self.name)
  }
}

/// Whether a builtin path may be treated as a compile-time constant.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstKind {
  Value(Value),
  Function,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstHint {
  /// Dotted path, e.g. `platform.os` or `path.join`.
  pub path: String,
  pub kind: ConstKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Builtins {
  facts: Map<String, Value>,
  functions: BTreeMap<String, Builtin>,
}

impl Builtins {
  fn detect() -> Self {
    let host = HostInfo::current();
    debug!(target = %host.target, hostname = %host.hostname, "detected host facts");

    let mut facts = Map::new();
    facts.insert(
      "target".into(),
      serde_json::json!({
        "os": host.target.os,
        "arch": host.target.arch,
        "triple": host.target.triple(),
      }),
    );
    facts.insert(
      "platform".into(),
      serde_json::json!({
        "os": host.platform.os,
        "arch": host.platform.arch,
        "family": host.platform.family,
      }),
    );
    facts.insert("hostname".into(), Value::String(host.hostname));
    facts.insert("user".into(), Value::String(host.username));
    facts.insert("shell".into(), Value::String(host.shell));

    let functions = path::functions()
      .into_iter()
      .chain(file::functions())
      .chain(mung::functions())
      .chain(top_level())
      .map(|builtin| (builtin.name.to_string(), builtin))
      .collect();

    Self { facts, functions }
  }

  /// Host facts keyed by top-level name.
  pub fn facts(&self) -> &Map<String, Value> {
    &self.facts
  }

  pub fn get(&self, key: &str) -> Option<&Value> {
    self.facts.get(key)
  }

  /// Override or add a fact in this copy only.
  pub fn insert(&mut self, key: impl Into<String>, value: Value) {
    self.facts.insert(key.into(), value);
  }

  /// Functions keyed by their dotted name (`path.join`, `cwd`).
  pub fn functions(&self) -> impl Iterator<Item = &Builtin> {
    self.functions.values()
  }

  pub fn function(&self, name: &str) -> Option<&Builtin> {
    self.functions.get(name)
  }

  /// Constant hints for every nested fact leaf and every function.
  pub fn const_hints(&self) -> Vec<ConstHint> {
    let mut hints = Vec::new();
    for (key, value) in &self.facts {
      collect_leaves(key.clone(), value, &mut hints);
    }
    hints.extend(self.functions.keys().map(|name| ConstHint {
      path: name.clone(),
      kind: ConstKind::Function,
    }));
    hints
  }
}

fn collect_leaves(path: String, value: &Value, hints: &mut Vec<ConstHint>) {
  match value {
    Value::Object(map) => {
      for (key, child) in map {
        collect_leaves(format!("{}.{}", path, key), child, hints);
      }
    }
    leaf => hints.push(ConstHint {
      path,
      kind: ConstKind::Value(leaf.clone()),
    }),
  }
}

fn top_level() -> Vec<Builtin> {
  vec![
    Builtin { name: "cwd", func: cwd },
    Builtin { name: "getenv", func: getenv },
  ]
}

fn cwd(_: &[Value]) -> Result<Value, BuiltinError> {
  let dir = std::env::current_dir().map_err(|e| BuiltinError::Io {
    function: "cwd",
    message: e.to_string(),
  })?;
  Ok(Value::String(dir.to_string_lossy().into_owned()))
}

fn getenv(args: &[Value]) -> Result<Value, BuiltinError> {
  let name = arg_str("getenv", args, 0)?;
  match std::env::var(name) {
    Ok(value) => Ok(Value::String(value)),
    Err(_) => Ok(args.get(1).cloned().unwrap_or(Value::Null)),
  }
}

/// Required string argument at `index`.
pub(crate) fn arg_str<'a>(function: &'static str, args: &'a [Value], index: usize) -> Result<&'a str, BuiltinError> {
  match args.get(index) {
    Some(Value::String(s)) => Ok(s),
    Some(other) => Err(BuiltinError::Argument {
      function,
      message: format!("argument #{} must be a string, got {}", index + 1, type_name(other)),
    }),
    None => Err(BuiltinError::Argument {
      function,
      message: format!("missing argument #{}", index + 1),
    }),
  }
}

/// Optional string argument; `null` counts as absent.
pub(crate) fn opt_str<'a>(function: &'static str, args: &'a [Value], index: usize) -> Result<Option<&'a str>, BuiltinError> {
  match args.get(index) {
    None | Some(Value::Null) => Ok(None),
    Some(_) => arg_str(function, args, index).map(Some),
  }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
  match value {
    Value::Null => "nil",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) | Value::Object(_) => "table",
  }
}
