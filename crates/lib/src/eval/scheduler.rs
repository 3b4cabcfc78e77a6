//! Bounded fan-out over sibling composites.

use rayon::prelude::*;
use tracing::trace;

use super::{Evaluator, EvalError, ParameterEnv, available_parallelism};
use crate::cancel::EvalContext;
use crate::syntax::Composite;

impl Evaluator<'_> {
  /// Evaluate `composites` and merge their environments in declaration order.
  ///
  /// Without a worker pool the composites run one after another and the first
  /// error stops the walk. Otherwise they run in chunks of at most
  /// `min(jobs, composites, cores)`; each chunk runs concurrently and the
  /// chunks themselves run in sequence. A failing composite cancels the rest
  /// of its chunk.
  ///
  /// When several composites of a chunk fail, the earliest one in declaration
  /// order is reported. A sibling cancelled before reaching its own failure
  /// is not, so this can differ from the serial walk.
  pub(crate) fn eval_many(&self, composites: &[Composite], chain: &[String]) -> Result<ParameterEnv, EvalError> {
    let mut env = ParameterEnv::default();

    let pool = match self.pool {
      Some(pool) if composites.len() > 1 => pool,
      _ => {
        for composite in composites {
          env = env.merge(self.eval_composite(composite, chain)?);
        }
        return Ok(env);
      }
    };

    let size = self
      .options
      .parallelism()
      .min(composites.len())
      .min(available_parallelism())
      .max(1);

    for chunk in composites.chunks(size) {
      self.check_cancelled()?;
      trace!(size = chunk.len(), "evaluating chunk");
      for result in self.eval_chunk(pool, chunk, chain)? {
        env = env.merge(result);
      }
    }
    Ok(env)
  }

  fn eval_chunk(
    &self,
    pool: &rayon::ThreadPool,
    chunk: &[Composite],
    chain: &[String],
  ) -> Result<Vec<ParameterEnv>, EvalError> {
    let ctx = EvalContext::with_cancel(self.ctx.cancel.child());
    let evaluator = Evaluator {
      ast: self.ast,
      options: self.options,
      ctx: &ctx,
      pool: self.pool,
    };

    let results: Vec<Result<ParameterEnv, EvalError>> = pool.install(|| {
      chunk
        .par_iter()
        .map(|composite| {
          let result = evaluator.eval_composite(composite, chain);
          if result.is_err() {
            ctx.cancel.cancel();
          }
          result
        })
        .collect()
    });

    if !ctx.cancel.is_cancelled() {
      return results.into_iter().collect();
    }
    self.check_cancelled()?;
    let first = results.into_iter().find_map(|result| match result {
      Err(EvalError::Cancelled) | Ok(_) => None,
      Err(err) => Some(err),
    });
    Err(first.unwrap_or(EvalError::Cancelled))
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use crate::cancel::EvalContext;
  use crate::eval::{EvalOptions, Model};

  const MANIFEST: &str = r#"
    n1<shared> { a = 1; who = "n1" }
    n2<shared> { b = 2; who = "n2" }
    shared(x, y) { s = _ .. "!" }
  "#;

  fn options(jobs: usize) -> EvalOptions {
    EvalOptions {
      max_parallel_jobs: jobs,
      ..EvalOptions::default()
    }
  }

  #[test]
  fn serial_and_parallel_agree() {
    let model = Model::parse(MANIFEST).unwrap();
    let ctx = EvalContext::new();
    let serial = model.eval(&ctx, &["n1", "n2"], &options(1)).unwrap();
    let parallel = model.eval(&ctx, &["n1", "n2"], &options(4)).unwrap();
    assert_eq!(serial, parallel);
    assert_eq!(serial["who"], json!("n2"));
    assert_eq!(serial["s"], json!("y!"));
  }

  #[test]
  fn first_error_wins() {
    let model = Model::parse("ok { a = 1 }\nbad { b = nil .. 1 }").unwrap();
    let err = model
      .eval(&EvalContext::new(), &["ok", "bad"], &options(2))
      .unwrap_err();
    assert!(err.to_string().starts_with("bad.b:"), "{}", err);
  }
}
