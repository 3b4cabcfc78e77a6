//! `path.*`: lexical path manipulation.

use std::path::{Path, PathBuf};

use menv_platform::{expand_path, normalize_path};
use serde_json::Value;

use super::{Builtin, BuiltinError, arg_str, opt_str};

pub(super) fn functions() -> Vec<Builtin> {
  vec![
    Builtin { name: "path.join", func: join },
    Builtin { name: "path.dirname", func: dirname },
    Builtin { name: "path.basename", func: basename },
    Builtin { name: "path.extname", func: extname },
    Builtin { name: "path.is_absolute", func: is_absolute },
    Builtin { name: "path.normalize", func: normalize },
    Builtin { name: "path.resolve", func: resolve },
    Builtin { name: "path.relative", func: relative },
    Builtin { name: "path.split", func: split },
    Builtin { name: "path.expand", func: expand },
  ]
}

fn string(path: &Path) -> Value {
  Value::String(path.to_string_lossy().into_owned())
}

fn join(args: &[Value]) -> Result<Value, BuiltinError> {
  let mut result = PathBuf::new();
  for segment in args.iter().filter_map(Value::as_str) {
    result.push(segment);
  }
  Ok(string(&result))
}

fn dirname(args: &[Value]) -> Result<Value, BuiltinError> {
  let path = Path::new(arg_str("path.dirname", args, 0)?);
  Ok(path.parent().map(string).unwrap_or_else(|| Value::String(String::new())))
}

fn basename(args: &[Value]) -> Result<Value, BuiltinError> {
  let path = Path::new(arg_str("path.basename", args, 0)?);
  let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
  Ok(Value::String(name.unwrap_or_default()))
}

fn extname(args: &[Value]) -> Result<Value, BuiltinError> {
  let path = Path::new(arg_str("path.extname", args, 0)?);
  let ext = path.extension().map(|e| format!(".{}", e.to_string_lossy()));
  Ok(Value::String(ext.unwrap_or_default()))
}

fn is_absolute(args: &[Value]) -> Result<Value, BuiltinError> {
  Ok(Value::Bool(Path::new(arg_str("path.is_absolute", args, 0)?).is_absolute()))
}

fn normalize(args: &[Value]) -> Result<Value, BuiltinError> {
  Ok(string(&normalize_path(Path::new(arg_str("path.normalize", args, 0)?))))
}

fn resolve(args: &[Value]) -> Result<Value, BuiltinError> {
  let mut result = std::env::current_dir().map_err(|e| BuiltinError::Io {
    function: "path.resolve",
    message: e.to_string(),
  })?;
  for segment in args.iter().filter_map(Value::as_str) {
    let segment = Path::new(segment);
    if segment.is_absolute() {
      result = segment.to_path_buf();
    } else {
      result.push(segment);
    }
  }
  Ok(string(&normalize_path(&result)))
}

fn relative(args: &[Value]) -> Result<Value, BuiltinError> {
  let from = Path::new(arg_str("path.relative", args, 0)?);
  let to = Path::new(arg_str("path.relative", args, 1)?);

  let from: Vec<_> = from.components().collect();
  let to: Vec<_> = to.components().collect();
  let common = from.iter().zip(to.iter()).take_while(|(a, b)| a == b).count();

  let mut result = PathBuf::new();
  for _ in common..from.len() {
    result.push("..");
  }
  for component in &to[common..] {
    result.push(component);
  }

  if result.as_os_str().is_empty() {
    Ok(Value::String(".".into()))
  } else {
    Ok(string(&result))
  }
}

fn split(args: &[Value]) -> Result<Value, BuiltinError> {
  let path = Path::new(arg_str("path.split", args, 0)?);
  Ok(Value::Array(
    path
      .components()
      .map(|c| Value::String(c.as_os_str().to_string_lossy().into_owned()))
      .collect(),
  ))
}

/// `path.expand(p[, base])`: `~` and `$VAR` expansion, relative paths resolved against `base`.
fn expand(args: &[Value]) -> Result<Value, BuiltinError> {
  let path = arg_str("path.expand", args, 0)?;
  let base = opt_str("path.expand", args, 1)?;
  expand_path(path, base.map(Path::new))
    .map(|p| string(&p))
    .map_err(|e| BuiltinError::Argument {
      function: "path.expand",
      message: e.to_string(),
    })
}
