//! Expression engine seam.
//!
//! Expressions are Lua 5.4 expressions. A [`Runtime`] owns one Lua state
//! with the builtin facts and function tables installed as globals; every
//! evaluation pass gets a fresh scope table that falls back to those
//! globals, so bindings never leak between passes.

use std::collections::BTreeMap;

use mlua::prelude::*;
use mlua::{DeserializeOptions, HookTriggers, SerializeOptions, VmState};
use serde_json::Value;

use crate::builtins::{Builtin, Builtins, ConstHint};
use crate::cancel::CancelToken;

/// Chunk name used for every expression; Lua prefixes positioned messages with it.
const CHUNK_NAME: &str = "expr";

/// Instructions between cancellation checks.
const HOOK_INTERVAL: u32 = 1000;

/// Standard libraries visible to expressions. `io`, `os`, `package` and
/// `coroutine` stay unloaded.
fn sandbox_libs() -> LuaStdLib {
  LuaStdLib::STRING | LuaStdLib::TABLE | LuaStdLib::MATH | LuaStdLib::UTF8
}

/// A compiled expression bound to its scope.
pub struct Program(LuaFunction);

pub struct Runtime {
  lua: Lua,
  hints: Vec<ConstHint>,
}

impl Runtime {
  pub fn new(builtins: &Builtins, cancel: &CancelToken) -> LuaResult<Self> {
    let lua = Lua::new_with(sandbox_libs(), LuaOptions::default())?;
    let globals = lua.globals();
    for name in ["dofile", "loadfile"] {
      globals.raw_remove(name)?;
    }

    for (name, value) in builtins.facts() {
      globals.set(name.as_str(), to_lua(&lua, value)?)?;
    }

    let mut tables: BTreeMap<&str, LuaTable> = BTreeMap::new();
    for builtin in builtins.functions() {
      let func = create_builtin(&lua, *builtin)?;
      match builtin.name.split_once('.') {
        Some((table, field)) => {
          if !tables.contains_key(table) {
            tables.insert(table, lua.create_table()?);
          }
          if let Some(t) = tables.get(table) {
            t.set(field, func)?;
          }
        }
        None => globals.set(builtin.name, func)?,
      }
    }
    for (name, table) in tables {
      globals.set(name, read_only(&lua, table)?)?;
    }

    let cancel = cancel.clone();
    lua.set_hook(HookTriggers::new().every_nth_instruction(HOOK_INTERVAL), move |_, _| {
      if cancel.is_cancelled() {
        Err(LuaError::runtime("evaluation cancelled"))
      } else {
        Ok(VmState::Continue)
      }
    })?;

    Ok(Self {
      lua,
      hints: builtins.const_hints(),
    })
  }

  pub fn hints(&self) -> &[ConstHint] {
    &self.hints
  }

  /// A fresh scope whose lookups fall back to the builtin globals.
  pub fn scope(&self) -> LuaResult<LuaTable> {
    let env = self.lua.create_table()?;
    let mt = self.lua.create_table()?;
    mt.set("__index", self.lua.globals())?;
    env.set_metatable(Some(mt))?;
    Ok(env)
  }

  pub fn bind(&self, scope: &LuaTable, name: &str, value: &Value) -> LuaResult<()> {
    scope.set(name, to_lua(&self.lua, value)?)
  }

  pub fn bind_raw(&self, scope: &LuaTable, name: &str, value: LuaValue) -> LuaResult<()> {
    scope.set(name, value)
  }

  /// Compile `source` as a single expression evaluated in `scope`.
  pub fn compile(&self, source: &str, scope: &LuaTable) -> LuaResult<Program> {
    let func = self
      .lua
      .load(format!("return {}", source))
      .set_name(format!("={}", CHUNK_NAME))
      .set_environment(scope.clone())
      .into_function()?;
    Ok(Program(func))
  }

  pub fn run(&self, program: &Program) -> LuaResult<LuaValue> {
    program.0.call::<LuaValue>(())
  }

  /// Lua string contents, if `value` is a string.
  pub fn text(&self, value: &LuaValue) -> Option<String> {
    match value {
      LuaValue::String(s) => Some(s.to_string_lossy()),
      _ => None,
    }
  }

  pub fn string(&self, text: &str) -> LuaResult<LuaValue> {
    self.lua.create_string(text).map(LuaValue::String)
  }

  /// Convert a result to a plain value; functions and userdata become null.
  pub fn to_value(&self, value: LuaValue) -> LuaResult<Value> {
    self
      .lua
      .from_value_with(value, DeserializeOptions::new().deny_unsupported_types(false))
  }
}

fn to_lua(lua: &Lua, value: &Value) -> LuaResult<LuaValue> {
  lua.to_value_with(
    value,
    SerializeOptions::new()
      .serialize_none_to_null(false)
      .serialize_unit_to_null(false),
  )
}

fn create_builtin(lua: &Lua, builtin: Builtin) -> LuaResult<LuaFunction> {
  lua.create_function(move |lua, args: LuaMultiValue| {
    let args = args
      .into_iter()
      .map(|arg| lua.from_value_with(arg, DeserializeOptions::new().deny_unsupported_types(false)))
      .collect::<LuaResult<Vec<Value>>>()?;
    let result = builtin.call(&args).map_err(LuaError::external)?;
    to_lua(lua, &result)
  })
}

/// Proxy that reads through to `table` and rejects assignment.
fn read_only(lua: &Lua, table: LuaTable) -> LuaResult<LuaTable> {
  let proxy = lua.create_table()?;
  let mt = lua.create_table()?;
  mt.set("__index", table)?;
  mt.set(
    "__newindex",
    lua.create_function(|_, _: LuaMultiValue| -> LuaResult<()> {
      Err(LuaError::runtime("builtin tables are read-only"))
    })?,
  )?;
  mt.set("__metatable", false)?;
  proxy.set_metatable(Some(mt))?;
  Ok(proxy)
}

/// Split a Lua error into its expression line (1-based) and a one-line message.
pub fn describe(err: &LuaError) -> (Option<usize>, String) {
  let message = match err {
    LuaError::SyntaxError { message, .. } => message.clone(),
    LuaError::RuntimeError(message) => message.clone(),
    LuaError::CallbackError { cause, .. } => return describe(cause),
    LuaError::ExternalError(cause) => cause.to_string(),
    other => other.to_string(),
  };
  let first = message.lines().next().unwrap_or_default();

  let prefix = format!("{}:", CHUNK_NAME);
  if let Some(rest) = first.strip_prefix(&prefix)
    && let Some((line, text)) = rest.split_once(':')
    && let Ok(line) = line.parse::<usize>()
  {
    return (Some(line), text.trim_start().to_string());
  }
  (None, first.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::builtins;
  use serde_json::json;

  fn runtime() -> Runtime {
    Runtime::new(&builtins::cache(), &CancelToken::new()).unwrap()
  }

  fn eval(rt: &Runtime, scope: &LuaTable, source: &str) -> LuaResult<Value> {
    let program = rt.compile(source, scope)?;
    let value = rt.run(&program)?;
    rt.to_value(value)
  }

  #[test]
  fn evaluates_in_scope() -> LuaResult<()> {
    let rt = runtime();
    let scope = rt.scope()?;
    rt.bind(&scope, "x", &json!(2))?;
    assert_eq!(eval(&rt, &scope, "x * 21")?, json!(42));
    assert_eq!(eval(&rt, &scope, "'a' .. 'b'")?, json!("ab"));
    assert_eq!(eval(&rt, &scope, "{ 1, 2 }")?, json!([1, 2]));
    assert_eq!(eval(&rt, &scope, "nil")?, Value::Null);
    Ok(())
  }

  #[test]
  fn scopes_are_isolated() -> LuaResult<()> {
    let rt = runtime();
    let first = rt.scope()?;
    rt.bind(&first, "x", &json!(1))?;
    let second = rt.scope()?;
    assert_eq!(eval(&rt, &second, "x")?, Value::Null);
    Ok(())
  }

  #[test]
  fn host_access_is_not_loaded() -> LuaResult<()> {
    let rt = runtime();
    let scope = rt.scope()?;
    for name in ["os", "io", "package", "require", "dofile", "loadfile", "coroutine"] {
      assert_eq!(eval(&rt, &scope, name)?, Value::Null, "{}", name);
    }
    assert_eq!(eval(&rt, &scope, "string.upper('a') .. math.floor(2.5)")?, json!("A2"));
    assert_eq!(eval(&rt, &scope, "table.concat({ 'x', 'y' }, ',')")?, json!("x,y"));
    assert!(eval(&rt, &scope, "os.exit(1)").is_err());
    Ok(())
  }

  #[test]
  fn builtins_are_visible() -> LuaResult<()> {
    let rt = runtime();
    let scope = rt.scope()?;
    assert_eq!(eval(&rt, &scope, "platform.os")?, json!(std::env::consts::OS));
    assert_eq!(eval(&rt, &scope, "mung.prepend('b:c', 'a', ':')")?, json!("a:b:c"));
    assert_eq!(eval(&rt, &scope, "type(cwd())")?, json!("string"));
    Ok(())
  }

  #[test]
  fn builtin_tables_are_read_only() -> LuaResult<()> {
    let rt = runtime();
    let scope = rt.scope()?;
    let err = eval(&rt, &scope, "(function() path.join = 1 end)()").unwrap_err();
    assert!(describe(&err).1.contains("read-only"));
    Ok(())
  }

  #[test]
  fn errors_carry_expression_line() -> LuaResult<()> {
    let rt = runtime();
    let scope = rt.scope()?;
    let err = rt.compile("1 +\n+", &scope).err().unwrap();
    let (line, message) = describe(&err);
    assert_eq!(line, Some(2));
    assert!(message.contains("unexpected symbol"), "{}", message);

    let err = eval(&rt, &scope, "nil .. 'x'").unwrap_err();
    let (line, message) = describe(&err);
    assert_eq!(line, Some(1));
    assert!(message.contains("attempt to concatenate"), "{}", message);
    Ok(())
  }

  #[test]
  fn builtin_errors_have_no_line() -> LuaResult<()> {
    let rt = runtime();
    let scope = rt.scope()?;
    let err = eval(&rt, &scope, "getenv(1)").unwrap_err();
    assert_eq!(
      describe(&err),
      (None, "getenv: argument #1 must be a string, got number".to_string())
    );
    Ok(())
  }

  #[test]
  fn cancellation_stops_loops() -> LuaResult<()> {
    let cancel = CancelToken::new();
    let rt = Runtime::new(&builtins::cache(), &cancel)?;
    let scope = rt.scope()?;
    cancel.cancel();
    let err = eval(&rt, &scope, "(function() while true do end end)()").unwrap_err();
    assert!(describe(&err).1.contains("cancelled"));
    Ok(())
  }
}
