//! Namespace composition and evaluation.
//!
//! Evaluating a composite reference resolves every definition of the
//! referenced namespace, evaluates the namespaces it composes, assembles its
//! parameter list and then runs its statements once per parameter. Sibling
//! composites are fanned out by the [scheduler](scheduler).

mod error;
mod scheduler;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use mlua::prelude::*;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::builtins;
use crate::cancel::EvalContext;
use crate::expr::{self, Runtime};
use crate::patch::{Patch, unquote};
use crate::syntax::{self, Ast, Composite, Namespace, ParseError, Parameter, Statement};

pub use error::EvalError;

/// Evaluation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalOptions {
  /// Fail on references to undefined namespaces instead of skipping them.
  pub strict: bool,
  /// Upper bound on concurrently evaluated composites; `0` means the
  /// available parallelism, `1` evaluates serially.
  pub max_parallel_jobs: usize,
  /// Identifier bound to the current parameter in expressions.
  pub parameter_ident: String,
  /// Abort when one namespace is defined twice with identical text.
  /// Only effective in debug builds.
  pub assert_unique_namespaces: bool,
}

impl Default for EvalOptions {
  fn default() -> Self {
    Self {
      strict: false,
      max_parallel_jobs: 0,
      parameter_ident: "_".into(),
      assert_unique_namespaces: false,
    }
  }
}

impl EvalOptions {
  /// The effective worker limit.
  pub fn parallelism(&self) -> usize {
    match self.max_parallel_jobs {
      0 => available_parallelism(),
      n => n,
    }
  }
}

pub(crate) fn available_parallelism() -> usize {
  std::thread::available_parallelism().map_or(1, |n| n.get())
}

/// Bindings produced by one composite evaluation, plus the parameters it
/// hands up to whoever composed it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterEnv {
  pub eval: BTreeMap<String, Value>,
  pub pars: Vec<Parameter>,
}

impl ParameterEnv {
  /// Combine two environments; `other` wins on key collisions.
  pub fn merge(mut self, other: ParameterEnv) -> ParameterEnv {
    self.eval.extend(other.eval);
    self.pars.extend(other.pars);
    self
  }
}

/// A named manifest text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
  pub name: String,
  pub text: String,
}

/// Parsed manifests, ready to evaluate any number of times.
#[derive(Debug, Clone)]
pub struct Model {
  ast: Arc<Ast>,
  sources: Vec<Source>,
}

impl Model {
  /// Parse a single anonymous manifest.
  pub fn parse(text: &str) -> Result<Self, ParseError> {
    Self::from_sources([("<input>", text)])
  }

  /// Parse several manifests; their namespaces are concatenated in order.
  pub fn from_sources<I, N, T>(sources: I) -> Result<Self, ParseError>
  where
    I: IntoIterator<Item = (N, T)>,
    N: Into<String>,
    T: Into<String>,
  {
    let mut ast = Ast::default();
    let mut kept = Vec::new();
    for (origin, (name, text)) in sources.into_iter().enumerate() {
      let source = Source {
        name: name.into(),
        text: text.into(),
      };
      ast.extend(syntax::parse_origin(origin, &source.name, &source.text)?);
      kept.push(source);
    }
    Ok(Self {
      ast: Arc::new(ast),
      sources: kept,
    })
  }

  pub fn ast(&self) -> &Ast {
    &self.ast
  }

  pub fn sources(&self) -> &[Source] {
    &self.sources
  }

  /// Evaluate the requested namespaces into one flat environment.
  pub fn eval<S: AsRef<str>>(
    &self,
    ctx: &EvalContext,
    names: &[S],
    options: &EvalOptions,
  ) -> Result<BTreeMap<String, Value>, EvalError> {
    let composites: Vec<Composite> = names.iter().map(|n| Composite::named(n.as_ref())).collect();
    let jobs = options.parallelism();
    info!(
      namespaces = ?composites.iter().map(|c| c.ident.as_str()).collect::<Vec<_>>(),
      strict = options.strict,
      jobs,
      "evaluating model"
    );

    let threads = jobs.min(available_parallelism());
    let pool = if threads > 1 {
      let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("menv-eval-{}", i))
        .build()
        .map_err(|e| EvalError::Pool(e.to_string()))?;
      Some(pool)
    } else {
      None
    };

    let evaluator = Evaluator {
      ast: &self.ast,
      options,
      ctx,
      pool: pool.as_ref(),
    };
    let env = evaluator.eval_many(&composites, &[])?;
    debug!(variables = env.eval.len(), "evaluation complete");
    Ok(env.eval)
  }

  /// Source excerpt pointing at the error position, when there is one.
  pub fn detail(&self, err: &EvalError) -> Option<String> {
    let (origin, offset) = err.position()?;
    let source = self.sources.get(origin)?;
    Some(syntax::excerpt(&source.name, &source.text, offset))
  }
}

/// Shared, read-only state of one [`Model::eval`] call.
pub(crate) struct Evaluator<'a> {
  ast: &'a Ast,
  options: &'a EvalOptions,
  ctx: &'a EvalContext,
  pool: Option<&'a rayon::ThreadPool>,
}

impl Evaluator<'_> {
  fn check_cancelled(&self) -> Result<(), EvalError> {
    if self.ctx.cancel.is_cancelled() {
      Err(EvalError::Cancelled)
    } else {
      Ok(())
    }
  }

  /// Evaluate one composite reference. `chain` holds the namespaces on the
  /// current composition path.
  pub(crate) fn eval_composite(&self, composite: &Composite, chain: &[String]) -> Result<ParameterEnv, EvalError> {
    self.check_cancelled()?;

    if chain.contains(&composite.ident) {
      let mut chain = chain.to_vec();
      chain.push(composite.ident.clone());
      return Err(EvalError::Cycle { chain });
    }

    let definitions: Vec<&Namespace> = self.ast.lookup(&composite.ident).collect();
    if definitions.is_empty() {
      if self.options.strict {
        return Err(EvalError::UndefinedNamespace {
          ident: composite.ident.clone(),
        });
      }
      debug!(namespace = %composite.ident, "skipping undefined namespace");
      return Ok(ParameterEnv::default());
    }

    if self.options.assert_unique_namespaces && cfg!(debug_assertions) {
      assert_unique(&definitions);
    }

    let mut chain = chain.to_vec();
    chain.push(composite.ident.clone());

    let mut env = ParameterEnv::default();
    for namespace in definitions {
      env = env.merge(self.eval_namespace(namespace, composite, &chain)?);
    }
    Ok(env)
  }

  fn eval_namespace(
    &self,
    namespace: &Namespace,
    composite: &Composite,
    chain: &[String],
  ) -> Result<ParameterEnv, EvalError> {
    let composed = self.eval_many(&namespace.composites, chain)?;

    let mut pars = namespace.parameters.clone();
    pars.extend(composed.pars.iter().cloned());
    pars.extend(composite.arguments.iter().cloned());

    let runtime = Runtime::new(&builtins::cache(), &self.ctx.cancel).map_err(runtime_error)?;

    let passes: Vec<Option<&Parameter>> = if pars.is_empty() {
      vec![None]
    } else {
      pars.iter().map(Some).collect()
    };
    debug!(namespace = %namespace.ident, passes = passes.len(), "evaluating namespace");

    let mut eval = composed.eval.clone();
    for (index, parameter) in passes.iter().enumerate() {
      let pass = Pass {
        namespace,
        composed: &composed.eval,
        parameter: parameter.map(|p| p.value.text()),
        index,
        count: passes.len(),
      };
      eval.extend(self.eval_pass(&runtime, &pass)?);
    }

    Ok(ParameterEnv { eval, pars })
  }

  /// Run every statement of a namespace for one parameter value.
  fn eval_pass(&self, runtime: &Runtime, pass: &Pass<'_>) -> Result<BTreeMap<String, Value>, EvalError> {
    let namespace = pass.namespace;
    let ident = self.options.parameter_ident.as_str();

    let scope = runtime.scope().map_err(runtime_error)?;
    let ctx = json!({
      "namespace": namespace.ident,
      "index": pass.index + 1,
      "count": pass.count,
      "parameter": pass.parameter,
      "strict": self.options.strict,
    });
    runtime.bind(&scope, "ctx", &ctx).map_err(runtime_error)?;
    if let Some(text) = &pass.parameter {
      runtime.bind(&scope, ident, &Value::String(text.clone())).map_err(runtime_error)?;
    }
    for (name, value) in pass.composed {
      runtime.bind(&scope, name, value).map_err(runtime_error)?;
    }

    let mut shadowed: BTreeSet<String> = pass.composed.keys().cloned().collect();
    shadowed.extend(namespace.statements.iter().map(|s| s.ident.clone()));
    shadowed.insert(ident.to_string());
    shadowed.insert("ctx".to_string());

    let patch = Patch::new(ident, pass.parameter.as_deref());
    let mut bindings = BTreeMap::new();
    for statement in &namespace.statements {
      self.check_cancelled()?;
      let value = self
        .eval_statement(runtime, &scope, &patch, &shadowed, statement)
        .map_err(|e| self.expression_error(namespace, statement, &e))?;
      bindings.insert(statement.ident.clone(), value);
    }
    Ok(bindings)
  }

  fn eval_statement(
    &self,
    runtime: &Runtime,
    scope: &LuaTable,
    patch: &Patch<'_>,
    shadowed: &BTreeSet<String>,
    statement: &Statement,
  ) -> LuaResult<Value> {
    let source = patch.apply(&statement.expression.source, runtime.hints(), shadowed);
    let program = runtime.compile(&source, scope)?;
    let mut value = runtime.run(&program)?;
    if let Some(text) = runtime.text(&value)
      && let Some(inner) = unquote(&text)
    {
      value = runtime.string(&inner)?;
    }
    runtime.bind_raw(scope, &statement.ident, value.clone())?;
    runtime.to_value(value)
  }

  fn expression_error(&self, namespace: &Namespace, statement: &Statement, err: &LuaError) -> EvalError {
    if self.ctx.cancel.is_cancelled() {
      return EvalError::Cancelled;
    }
    let (line, message) = expr::describe(err);
    let expression = &statement.expression;
    let offset = line.and_then(|line| line_start(&expression.source, line)).map(|o| expression.offset + o);
    EvalError::Expression {
      namespace: namespace.ident.clone(),
      statement: statement.ident.clone(),
      expression: expression.source.clone(),
      origin: namespace.origin,
      offset,
      message,
    }
  }
}

/// Inputs of one statement pass.
struct Pass<'a> {
  namespace: &'a Namespace,
  composed: &'a BTreeMap<String, Value>,
  parameter: Option<String>,
  index: usize,
  count: usize,
}

fn runtime_error(err: LuaError) -> EvalError {
  EvalError::Runtime(expr::describe(&err).1)
}

/// Byte offset of the start of 1-based `line` in `source`.
fn line_start(source: &str, line: usize) -> Option<usize> {
  match line {
    0 => None,
    1 => Some(0),
    n => source.match_indices('\n').nth(n - 2).map(|(i, _)| i + 1),
  }
}

/// Two definitions with identical text mean one namespace was reached
/// through two paths without being pruned.
fn assert_unique(definitions: &[&Namespace]) {
  let rendered: Vec<String> = definitions.iter().map(|ns| ns.to_string()).collect();
  for (i, text) in rendered.iter().enumerate() {
    assert!(
      !rendered[i + 1..].contains(text),
      "namespace `{}` is defined twice with identical text",
      definitions[i].ident
    );
  }
}
