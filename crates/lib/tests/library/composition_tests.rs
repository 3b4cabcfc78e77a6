use menv_lib::{EvalContext, EvalError, EvalOptions, Model};
use serde_json::json;

use super::common::{eval, eval_with, options};

#[test]
fn single_namespace() {
  let env = eval("default{ foo = 1+2; }", &["default"]).unwrap();
  assert_eq!(env["foo"], json!(3));
}

#[test]
fn inherited_bindings_survive() {
  let env = eval(
    r#"default<custom>{ foo = "abc"; } custom{ foo = 1+2; bar = "xyz"; }"#,
    &["default"],
  )
  .unwrap();
  assert_eq!(env["foo"], json!("abc"));
  assert_eq!(env["bar"], json!("xyz"));
}

#[test]
fn composing_namespace_overrides() {
  let env = eval("base{ a = 1 } child<base>{ a = 2 }", &["child"]).unwrap();
  assert_eq!(env["a"], json!(2));
}

#[test]
fn composed_bindings_are_visible() {
  let env = eval("base{ root = '/opt' } app<base>{ bin = root .. '/bin' }", &["app"]).unwrap();
  assert_eq!(env["bin"], json!("/opt/bin"));
}

#[test]
fn last_parameter_wins() {
  let env = eval("p(1,2,3){ x = _ }", &["p"]).unwrap();
  assert_eq!(env["x"], json!(3));
}

#[test]
fn passes_accumulate_distinct_bindings() {
  let env = eval("p(1,2){ x = _; seen = ctx.count }", &["p"]).unwrap();
  assert_eq!(env["x"], json!(2));
  assert_eq!(env["seen"], json!(2));
}

#[test]
fn inline_arguments_extend_parameters() {
  let env = eval("tool(1){ v = _ * 10 } app<tool(2, 5)>{}", &["app"]).unwrap();
  assert_eq!(env["v"], json!(50));
  let env = eval("tool(1){ v = _ * 10 }", &["tool"]).unwrap();
  assert_eq!(env["v"], json!(10));
}

#[test]
fn parameters_bubble_up_to_composer() {
  let env = eval("p(7){} q<p>{ y = _ + 1 }", &["q"]).unwrap();
  assert_eq!(env["y"], json!(8));
}

#[test]
fn missing_namespace_is_skipped_unless_strict() {
  let env = eval_with("a<ghost>{ x = 1 }", &["a"], &options(1, false)).unwrap();
  assert_eq!(env["x"], json!(1));

  let err = eval_with("a<ghost>{ x = 1 }", &["a"], &options(1, true)).unwrap_err();
  assert_eq!(
    err,
    EvalError::UndefinedNamespace {
      ident: "ghost".into()
    }
  );
}

#[test]
fn missing_top_level_namespace() {
  assert!(eval("a{}", &["nope"]).unwrap().is_empty());
  let err = eval_with("a{}", &["nope"], &options(1, true)).unwrap_err();
  assert_eq!(err.to_string(), "undefined namespace `nope`");
}

#[test]
fn cycles_are_reported() {
  let err = eval("a<b>{} b<c>{} c<a>{}", &["a"]).unwrap_err();
  assert_eq!(
    err,
    EvalError::Cycle {
      chain: vec!["a".into(), "b".into(), "c".into(), "a".into()]
    }
  );
  let err = eval("self<self>{}", &["self"]).unwrap_err();
  assert!(matches!(err, EvalError::Cycle { .. }));
}

#[test]
fn diamonds_are_not_cycles() {
  let env = eval("base{ n = 1 } l<base>{} r<base>{} top<l, r>{}", &["top"]).unwrap();
  assert_eq!(env["n"], json!(1));
}

#[test]
fn manifests_concatenate() {
  let model = Model::from_sources([
    ("base.conf", "base{ a = 1 }"),
    ("local.conf", "app<base>{ b = a + 1 }"),
  ])
  .unwrap();
  let env = model
    .eval(&EvalContext::new(), &["app"], &EvalOptions::default())
    .unwrap();
  assert_eq!(env["b"], json!(2));
}

#[test]
fn expression_errors_name_their_statement() {
  let model = Model::from_sources([("menv.conf", "ok{}\ndev{ path = nil .. 'x' }")]).unwrap();
  let err = model
    .eval(&EvalContext::new(), &["dev"], &EvalOptions::default())
    .unwrap_err();
  match &err {
    EvalError::Expression {
      namespace,
      statement,
      expression,
      offset,
      ..
    } => {
      assert_eq!(namespace, "dev");
      assert_eq!(statement, "path");
      assert_eq!(expression, "nil .. 'x'");
      assert_eq!(*offset, Some(17));
    }
    other => panic!("unexpected error: {:?}", other),
  }
  assert!(model.detail(&err).unwrap().contains("menv.conf:2:13"));
}

#[test]
fn builtins_reach_expressions() {
  let env = eval(
    "host{ os = platform.os; triple = target.triple; joined = path.join('a', 'b') }",
    &["host"],
  )
  .unwrap();
  assert_eq!(env["os"], json!(std::env::consts::OS));
  assert!(env["triple"].as_str().unwrap().contains('-'));
  assert_eq!(env["joined"], json!(std::path::Path::new("a").join("b").to_string_lossy()));
}
