use std::collections::BTreeMap;

use menv_lib::{EvalContext, EvalError, EvalOptions, Model};
use serde_json::Value;

pub fn options(jobs: usize, strict: bool) -> EvalOptions {
  EvalOptions {
    strict,
    max_parallel_jobs: jobs,
    ..EvalOptions::default()
  }
}

/// Evaluate `names` in a single manifest with default options.
pub fn eval(text: &str, names: &[&str]) -> Result<BTreeMap<String, Value>, EvalError> {
  eval_with(text, names, &EvalOptions::default())
}

pub fn eval_with(text: &str, names: &[&str], options: &EvalOptions) -> Result<BTreeMap<String, Value>, EvalError> {
  let model = Model::parse(text).expect("manifest should parse");
  model.eval(&EvalContext::new(), names, options)
}
