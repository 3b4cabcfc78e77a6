//! Implementation of the `menv info` command.

use anyhow::Result;
use menv_lib::builtins;
use menv_lib::render::render_value;
use serde_json::{Value, json};

use crate::output::{OutputFormat, print_heading, print_json, print_stat};

pub fn cmd_info(format: OutputFormat) -> Result<()> {
  let builtins = builtins::cache();
  let functions: Vec<&str> = builtins.functions().map(|f| f.name).collect();

  if format.is_json() {
    return print_json(&json!({
      "version": env!("CARGO_PKG_VERSION"),
      "facts": builtins.facts(),
      "functions": functions,
    }));
  }

  print_heading("Facts:");
  for (key, value) in builtins.facts() {
    print_fact(key, value);
  }
  println!();
  print_heading("Functions:");
  for name in functions {
    println!("  {}", name);
  }
  Ok(())
}

fn print_fact(key: &str, value: &Value) {
  match value {
    Value::Object(map) => {
      for (child, value) in map {
        print_fact(&format!("{}.{}", key, child), value);
      }
    }
    other => print_stat(key, &render_value(other)),
  }
}
