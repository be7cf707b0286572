//! Runtime: values, lexical environments and the evaluator.

pub mod env;
pub mod eval;
pub mod value;

pub use env::{Binding, Env, Frame};
pub use eval::{EvalResult, Flow, Interpreter};
pub use value::{ArrayRef, Callable, SyntaxValue, Value};
