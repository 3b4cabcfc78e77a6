mod eval;
mod fmt;
mod info;
mod list;

use std::fmt as stdfmt;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use menv_lib::{EvalError, Model, ParseError};
use tracing::debug;

pub use eval::cmd_eval;
pub use fmt::cmd_fmt;
pub use info::cmd_info;
pub use list::cmd_list;

/// Read and parse every manifest, in order.
fn load_model(files: &[PathBuf]) -> Result<Model> {
  let mut sources = Vec::with_capacity(files.len());
  for path in files {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read manifest: {}", path.display()))?;
    debug!(path = %path.display(), bytes = text.len(), "loaded manifest");
    sources.push((path.display().to_string(), text));
  }
  Model::from_sources(sources).context("Failed to parse manifest")
}

/// An evaluation error together with its rendered source excerpt.
#[derive(Debug)]
struct EvalFailure {
  error: EvalError,
  detail: Option<String>,
}

impl EvalFailure {
  fn new(model: &Model, error: EvalError) -> Self {
    let detail = model.detail(&error);
    Self { error, detail }
  }
}

impl stdfmt::Display for EvalFailure {
  fn fmt(&self, f: &mut stdfmt::Formatter<'_>) -> stdfmt::Result {
    stdfmt::Display::fmt(&self.error, f)
  }
}

impl std::error::Error for EvalFailure {}

/// Source excerpt for errors that point into a manifest.
pub fn detail(err: &anyhow::Error) -> Option<String> {
  if let Some(parse) = err.downcast_ref::<ParseError>() {
    return Some(parse.detail().to_string());
  }
  err.downcast_ref::<EvalFailure>().and_then(|failure| failure.detail.clone())
}
