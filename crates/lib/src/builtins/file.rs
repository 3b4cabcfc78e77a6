//! `file.*`: read-only filesystem queries.

use std::fs;
use std::path::Path;

use serde_json::Value;

use super::{Builtin, BuiltinError, arg_str};

pub(super) fn functions() -> Vec<Builtin> {
  vec![
    Builtin { name: "file.exists", func: exists },
    Builtin { name: "file.is_file", func: is_file },
    Builtin { name: "file.is_dir", func: is_dir },
    Builtin { name: "file.is_symlink", func: is_symlink },
    Builtin { name: "file.size", func: size },
    Builtin { name: "file.read", func: read },
  ]
}

fn exists(args: &[Value]) -> Result<Value, BuiltinError> {
  Ok(Value::Bool(Path::new(arg_str("file.exists", args, 0)?).exists()))
}

fn is_file(args: &[Value]) -> Result<Value, BuiltinError> {
  Ok(Value::Bool(Path::new(arg_str("file.is_file", args, 0)?).is_file()))
}

fn is_dir(args: &[Value]) -> Result<Value, BuiltinError> {
  Ok(Value::Bool(Path::new(arg_str("file.is_dir", args, 0)?).is_dir()))
}

fn is_symlink(args: &[Value]) -> Result<Value, BuiltinError> {
  let path = Path::new(arg_str("file.is_symlink", args, 0)?);
  Ok(Value::Bool(path.is_symlink()))
}

/// Size in bytes, or nil when the path does not exist.
fn size(args: &[Value]) -> Result<Value, BuiltinError> {
  let path = arg_str("file.size", args, 0)?;
  Ok(fs::metadata(path).map(|m| Value::from(m.len())).unwrap_or(Value::Null))
}

fn read(args: &[Value]) -> Result<Value, BuiltinError> {
  let path = arg_str("file.read", args, 0)?;
  fs::read_to_string(path).map(Value::String).map_err(|e| BuiltinError::Io {
    function: "file.read",
    message: format!("{}: {}", path, e),
  })
}
