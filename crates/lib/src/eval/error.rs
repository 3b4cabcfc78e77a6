use thiserror::Error;

/// Errors raised while evaluating a model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
  /// Strict mode only: a composite names a namespace nobody defines.
  #[error("undefined namespace `{ident}`")]
  UndefinedNamespace { ident: String },

  /// A namespace composes itself, directly or transitively.
  #[error("namespace cycle: {}", chain.join(" -> "))]
  Cycle { chain: Vec<String> },

  /// An expression failed to compile or run.
  #[error("{namespace}.{statement}: {message}")]
  Expression {
    namespace: String,
    statement: String,
    /// The raw expression text.
    expression: String,
    /// Index of the manifest source the namespace came from.
    origin: usize,
    /// Byte offset into that source, when the engine reported a position.
    offset: Option<usize>,
    message: String,
  },

  #[error("evaluation cancelled")]
  Cancelled,

  /// The expression engine could not be set up.
  #[error("runtime error: {0}")]
  Runtime(String),

  #[error("failed to start worker pool: {0}")]
  Pool(String),
}

impl EvalError {
  /// Byte position of the error in its manifest source, if known.
  pub fn position(&self) -> Option<(usize, usize)> {
    match self {
      EvalError::Expression {
        origin,
        offset: Some(offset),
        ..
      } => Some((*origin, *offset)),
      _ => None,
    }
  }
}
