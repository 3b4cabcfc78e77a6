//! menv-lib: the namespace manifest language and its evaluator.
//!
//! A manifest declares namespaces of variable bindings:
//!
//! ```text
//! base { prefix = "/opt" }
//! dev<base>(debug) { mode = _; bin = prefix .. "/bin" }
//! ```
//!
//! - [`syntax`]: tokenizer, parser and AST for manifest text
//! - [`builtins`]: host facts and utility functions visible to expressions
//! - [`patch`]: typed substitution of the implicit parameter
//! - [`expr`]: the Lua expression engine seam
//! - [`eval`]: namespace composition, parameter fan-out and scheduling
//! - [`render`]: `KEY=value` output

pub mod builtins;
pub mod cancel;
pub mod eval;
pub mod expr;
pub mod patch;
pub mod render;
pub mod syntax;

pub use cancel::{CancelToken, EvalContext};
pub use eval::{EvalError, EvalOptions, Model, ParameterEnv, Source};
pub use syntax::{Ast, ParseError, parse};
