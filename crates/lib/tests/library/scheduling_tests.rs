use std::fmt::Write;
use std::time::Duration;

use menv_lib::{CancelToken, EvalContext, EvalError, Model};

use super::common::{eval_with, options};

/// Sixteen namespaces that all write `last` and each write their own key.
fn wide_manifest() -> (String, Vec<String>) {
  let mut text = String::from("shared(a, b) { s = _ }\n");
  let mut names = Vec::new();
  for i in 0..16 {
    let _ = writeln!(text, "n{i}<shared> {{ last = {i}; own{i} = ctx.count * {i} }}");
    names.push(format!("n{i}"));
  }
  (text, names)
}

#[test]
fn parallel_matches_serial() {
  let (text, names) = wide_manifest();
  let names: Vec<&str> = names.iter().map(String::as_str).collect();

  let serial = eval_with(&text, &names, &options(1, false)).unwrap();
  for jobs in [2, 3, 8, 0] {
    let parallel = eval_with(&text, &names, &options(jobs, false)).unwrap();
    assert_eq!(serial, parallel, "jobs = {}", jobs);
  }
  assert_eq!(serial["last"], serde_json::json!(15));
  assert_eq!(serial["own3"], serde_json::json!(6));
}

#[test]
fn cancelled_before_start() {
  let model = Model::parse("a { x = 1 }").unwrap();
  let cancel = CancelToken::new();
  cancel.cancel();
  let err = model
    .eval(&EvalContext::with_cancel(cancel), &["a"], &options(1, false))
    .unwrap_err();
  assert_eq!(err, EvalError::Cancelled);
}

#[test]
fn timeout_interrupts_running_expression() {
  let model = Model::parse("spin { x = (function() while true do end end)() }").unwrap();
  let ctx = EvalContext::with_cancel(CancelToken::with_timeout(Duration::from_millis(50)));
  let err = model.eval(&ctx, &["spin"], &options(2, false)).unwrap_err();
  assert_eq!(err, EvalError::Cancelled);
}

#[test]
fn cancellation_from_another_thread() {
  let model = Model::parse("a { x = 1 } spin<a> { y = (function() while true do end end)() }").unwrap();
  let cancel = CancelToken::new();
  let ctx = EvalContext::with_cancel(cancel.clone());

  let handle = std::thread::spawn(move || {
    std::thread::sleep(Duration::from_millis(20));
    cancel.cancel();
  });
  let err = model.eval(&ctx, &["spin"], &options(1, false)).unwrap_err();
  handle.join().unwrap();
  assert_eq!(err, EvalError::Cancelled);
}

#[test]
fn failing_sibling_cancels_running_chunk() {
  if std::thread::available_parallelism().map_or(1, |n| n.get()) < 2 {
    return;
  }
  let text = "slow { y = (function() while true do end end)() }\nbad { b = nil .. 1 }";
  let start = std::time::Instant::now();
  let err = eval_with(text, &["slow", "bad"], &options(2, false)).unwrap_err();

  assert!(start.elapsed() < Duration::from_secs(10), "took {:?}", start.elapsed());
  match err {
    EvalError::Expression { namespace, statement, .. } => {
      assert_eq!(namespace, "bad");
      assert_eq!(statement, "b");
    }
    other => panic!("expected the sibling's error, got {:?}", other),
  }
}

#[test]
fn cancelled_siblings_do_not_hide_the_error() {
  let text = "a { x = 1 }\nbad { b = nil .. 1 }\nc { z = 3 }";
  for jobs in [1, 2, 3] {
    let err = eval_with(text, &["a", "bad", "c"], &options(jobs, false)).unwrap_err();
    assert!(err.to_string().starts_with("bad.b:"), "jobs = {}: {}", jobs, err);
  }
}

#[test]
fn large_job_limit_is_capped() {
  let env = eval_with("a { x = 1 } b { y = 2 }", &["a", "b"], &options(200_000, false)).unwrap();
  assert_eq!(env["x"], serde_json::json!(1));
  assert_eq!(env["y"], serde_json::json!(2));
}
