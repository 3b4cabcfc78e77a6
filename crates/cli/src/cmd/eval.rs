//! Implementation of the `menv eval` command.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use menv_lib::render::render_env;
use menv_lib::{CancelToken, EvalContext, EvalOptions};

use super::{EvalFailure, load_model};
use crate::output::{OutputFormat, print_json};

pub fn cmd_eval(
  files: &[PathBuf],
  namespaces: &[String],
  options: &EvalOptions,
  timeout: Option<Duration>,
  format: OutputFormat,
) -> Result<()> {
  let model = load_model(files)?;

  let cancel = timeout.map(CancelToken::with_timeout).unwrap_or_default();
  let ctx = EvalContext::with_cancel(cancel);

  let env = model
    .eval(&ctx, namespaces, options)
    .map_err(|e| EvalFailure::new(&model, e))
    .with_context(|| format!("Failed to evaluate {}", namespaces.join(", ")))?;

  if format.is_json() {
    print_json(&env)?;
  } else {
    print!("{}", render_env(&env));
  }
  Ok(())
}
