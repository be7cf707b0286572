pub use crate::errors::{ErrorKind, ErrorReporting, QuillError, SourceContext};

pub mod ast;
pub mod atoms;
pub mod cli;
pub mod errors;
pub mod macros;
pub mod runtime;
pub mod syntax;
pub mod engine;
pub mod validation;
