//! Cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Cloneable handle shared by everything taking part in one evaluation.
///
/// A token is cancelled explicitly through [`CancelToken::cancel`],
/// implicitly once its deadline has passed, or when its parent is.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
  flag: Arc<AtomicBool>,
  deadline: Option<Instant>,
  parent: Option<Arc<CancelToken>>,
}

impl CancelToken {
  pub fn new() -> Self {
    Self::default()
  }

  /// A token that cancels itself after `timeout`.
  pub fn with_timeout(timeout: Duration) -> Self {
    Self {
      flag: Arc::default(),
      deadline: Instant::now().checked_add(timeout),
      parent: None,
    }
  }

  /// A token that follows this one but can also be cancelled on its own.
  pub fn child(&self) -> Self {
    Self {
      flag: Arc::default(),
      deadline: None,
      parent: Some(Arc::new(self.clone())),
    }
  }

  pub fn cancel(&self) {
    self.flag.store(true, Ordering::Release);
  }

  pub fn is_cancelled(&self) -> bool {
    self.flag.load(Ordering::Acquire)
      || self.deadline.is_some_and(|d| Instant::now() >= d)
      || self.parent.as_ref().is_some_and(|p| p.is_cancelled())
  }
}

/// Per-call evaluation context.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
  pub cancel: CancelToken,
}

impl EvalContext {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_cancel(cancel: CancelToken) -> Self {
    Self { cancel }
  }
}
