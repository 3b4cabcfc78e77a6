use menv_lib::EvalOptions;
use serde_json::json;

use super::common::{eval, eval_with};

fn type_of(param: &str) -> (String, serde_json::Value) {
  let text = format!("p({}){{ t = type(_); v = _ }}", param);
  let env = eval(&text, &["p"]).unwrap();
  (env["t"].as_str().unwrap().to_string(), env["v"].clone())
}

#[test]
fn literals_are_typed() {
  assert_eq!(type_of("true"), ("boolean".into(), json!(true)));
  assert_eq!(type_of("42"), ("number".into(), json!(42)));
  assert_eq!(type_of("3.14"), ("number".into(), json!(3.14)));
  assert_eq!(type_of("-5"), ("number".into(), json!(-5)));
}

#[test]
fn quoted_literal_becomes_its_contents() {
  assert_eq!(type_of(r#"'"abc"'"#), ("string".into(), json!("abc")));
}

#[test]
fn non_literals_stay_strings() {
  assert_eq!(type_of("release"), ("string".into(), json!("release")));
  assert_eq!(type_of(r#""plain text""#), ("string".into(), json!("plain text")));
}

#[test]
fn typed_arithmetic() {
  let env = eval("p(20){ x = _ + 1; y = _ == 20 }", &["p"]).unwrap();
  assert_eq!(env["x"], json!(21));
  assert_eq!(env["y"], json!(true));
}

#[test]
fn field_named_like_parameter_is_untouched() {
  let env = eval("p(1){ t = { _ = 'key' }; k = t._ }", &["p"]).unwrap();
  assert_eq!(env["k"], json!("key"));
}

#[test]
fn no_parameter_leaves_identifier_unbound() {
  let env = eval("p{ x = _ == nil }", &["p"]).unwrap();
  assert_eq!(env["x"], json!(true));
}

#[test]
fn custom_parameter_identifier() {
  let options = EvalOptions {
    parameter_ident: "param".into(),
    max_parallel_jobs: 1,
    ..EvalOptions::default()
  };
  let env = eval_with("p(2){ x = param * 2 }", &["p"], &options).unwrap();
  assert_eq!(env["x"], json!(4));
}
