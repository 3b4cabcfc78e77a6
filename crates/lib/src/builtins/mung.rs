//! `mung.*`: editing of separator-delimited lists such as `PATH`.
//!
//! The separator defaults to the host's path-list separator. A nil list is
//! treated as empty so `mung.prepend(getenv("PATH"), dir)` works when the
//! variable is unset.

use serde_json::Value;

use super::{Builtin, BuiltinError, arg_str, opt_str, type_name};

const SEPARATOR: &str = if cfg!(windows) { ";" } else { ":" };

pub(super) fn functions() -> Vec<Builtin> {
  vec![
    Builtin { name: "mung.prepend", func: prepend },
    Builtin { name: "mung.append", func: append },
    Builtin { name: "mung.remove", func: remove },
    Builtin { name: "mung.dedup", func: dedup },
    Builtin { name: "mung.split", func: split },
    Builtin { name: "mung.join", func: join },
    Builtin { name: "mung.trim", func: trim },
    Builtin { name: "mung.replace", func: replace },
  ]
}

fn entries<'a>(function: &'static str, args: &'a [Value], sep: &str) -> Result<Vec<&'a str>, BuiltinError> {
  Ok(match opt_str(function, args, 0)? {
    Some(list) => list.split(sep).filter(|e| !e.is_empty()).collect(),
    None => Vec::new(),
  })
}

fn separator<'a>(function: &'static str, args: &'a [Value], index: usize) -> Result<&'a str, BuiltinError> {
  Ok(opt_str(function, args, index)?.unwrap_or(SEPARATOR))
}

fn prepend(args: &[Value]) -> Result<Value, BuiltinError> {
  let sep = separator("mung.prepend", args, 2)?;
  let item = arg_str("mung.prepend", args, 1)?;
  let mut list = entries("mung.prepend", args, sep)?;
  list.retain(|e| *e != item);
  list.insert(0, item);
  Ok(Value::String(list.join(sep)))
}

fn append(args: &[Value]) -> Result<Value, BuiltinError> {
  let sep = separator("mung.append", args, 2)?;
  let item = arg_str("mung.append", args, 1)?;
  let mut list = entries("mung.append", args, sep)?;
  list.retain(|e| *e != item);
  list.push(item);
  Ok(Value::String(list.join(sep)))
}

fn remove(args: &[Value]) -> Result<Value, BuiltinError> {
  let sep = separator("mung.remove", args, 2)?;
  let item = arg_str("mung.remove", args, 1)?;
  let mut list = entries("mung.remove", args, sep)?;
  list.retain(|e| *e != item);
  Ok(Value::String(list.join(sep)))
}

/// Drop repeated entries, keeping the first occurrence.
fn dedup(args: &[Value]) -> Result<Value, BuiltinError> {
  let sep = separator("mung.dedup", args, 1)?;
  let mut seen = Vec::new();
  for entry in entries("mung.dedup", args, sep)? {
    if !seen.contains(&entry) {
      seen.push(entry);
    }
  }
  Ok(Value::String(seen.join(sep)))
}

fn split(args: &[Value]) -> Result<Value, BuiltinError> {
  let sep = separator("mung.split", args, 1)?;
  let list = entries("mung.split", args, sep)?;
  Ok(Value::Array(list.into_iter().map(Value::from).collect()))
}

fn join(args: &[Value]) -> Result<Value, BuiltinError> {
  let sep = separator("mung.join", args, 1)?;
  let items = match args.first() {
    Some(Value::Array(items)) => items,
    Some(other) => {
      return Err(BuiltinError::Argument {
        function: "mung.join",
        message: format!("argument #1 must be a list, got {}", type_name(other)),
      });
    }
    None => return Ok(Value::String(String::new())),
  };
  let parts: Vec<String> = items
    .iter()
    .map(|item| match item {
      Value::String(s) => s.clone(),
      other => other.to_string(),
    })
    .collect();
  Ok(Value::String(parts.join(sep)))
}

fn trim(args: &[Value]) -> Result<Value, BuiltinError> {
  Ok(Value::from(arg_str("mung.trim", args, 0)?.trim()))
}

fn replace(args: &[Value]) -> Result<Value, BuiltinError> {
  let text = arg_str("mung.replace", args, 0)?;
  let from = arg_str("mung.replace", args, 1)?;
  let to = arg_str("mung.replace", args, 2)?;
  if from.is_empty() {
    return Ok(Value::from(text));
  }
  Ok(Value::String(text.replace(from, to)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn call(func: fn(&[Value]) -> Result<Value, BuiltinError>, args: Value) -> Value {
    match args {
      Value::Array(args) => func(&args).unwrap(),
      _ => unreachable!(),
    }
  }

  #[test]
  fn prepend_moves_existing_entry_to_front() {
    assert_eq!(call(prepend, json!(["a,b,c", "c", ","])), "c,a,b");
    assert_eq!(call(prepend, json!([null, "/bin", ":"])), "/bin");
  }

  #[test]
  fn append_and_remove() {
    assert_eq!(call(append, json!(["a:b", "a", ":"])), "b:a");
    assert_eq!(call(remove, json!(["a::b:a", "a", ":"])), "b");
  }

  #[test]
  fn dedup_keeps_first() {
    assert_eq!(call(dedup, json!(["x;y;x;z;y", ";"])), "x;y;z");
  }

  #[test]
  fn split_and_join() {
    assert_eq!(call(split, json!(["a,,b", ","])), json!(["a", "b"]));
    assert_eq!(call(join, json!([["a", 1, true], "-"])), "a-1-true");
  }

  #[test]
  fn string_helpers() {
    assert_eq!(call(trim, json!(["  x \n"])), "x");
    assert_eq!(call(replace, json!(["a-b-c", "-", "/"])), "a/b/c");
    assert_eq!(call(replace, json!(["abc", "", "/"])), "abc");
  }

  #[test]
  fn join_rejects_scalars() {
    let err = join(&[json!("a")]).unwrap_err();
    assert_eq!(err.to_string(), "mung.join: argument #1 must be a list, got string");
  }
}
