//! Implementation of the `menv fmt` command.

use std::path::PathBuf;

use anyhow::Result;

use super::load_model;

pub fn cmd_fmt(files: &[PathBuf]) -> Result<()> {
  let model = load_model(files)?;
  print!("{}", model.ast());
  Ok(())
}
