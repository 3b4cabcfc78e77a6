//! Implementation of the `menv list` command.

use std::path::PathBuf;

use anyhow::Result;
use owo_colors::{OwoColorize, Stream};
use serde::Serialize;

use super::load_model;
use crate::output::{OutputFormat, print_json, symbols};

#[derive(Serialize)]
struct NamespaceRow<'a> {
  name: &'a str,
  source: &'a str,
  composites: Vec<String>,
  parameters: usize,
  statements: Vec<&'a str>,
}

pub fn cmd_list(files: &[PathBuf], format: OutputFormat) -> Result<()> {
  let model = load_model(files)?;

  let rows: Vec<NamespaceRow<'_>> = model
    .ast()
    .namespaces
    .iter()
    .map(|ns| NamespaceRow {
      name: &ns.ident,
      source: model.sources().get(ns.origin).map_or("", |s| s.name.as_str()),
      composites: ns.composites.iter().map(|c| c.to_string()).collect(),
      parameters: ns.parameters.len(),
      statements: ns.statements.iter().map(|s| s.ident.as_str()).collect(),
    })
    .collect();

  if format.is_json() {
    return print_json(&rows);
  }

  for row in &rows {
    let mut line = format!("{}", row.name.if_supports_color(Stream::Stdout, |s| s.bold()));
    if !row.composites.is_empty() {
      line.push_str(&format!(" {} {}", symbols::ARROW, row.composites.join(", ")));
    }
    println!(
      "{} {}",
      line,
      format!("({} parameters, {} statements)", row.parameters, row.statements.len())
        .if_supports_color(Stream::Stdout, |s| s.dimmed())
    );
  }
  Ok(())
}
