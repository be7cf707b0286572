//! Lexing and parsing: source text to [`CompUnit`].

pub mod parser;

use crate::{
    ast::CompUnit,
    errors::{QuillError, SourceContext},
};

pub use parser::parse;

/// Parses `source` under the display name `name`.
pub fn parse_program(source: &str, name: &str) -> Result<CompUnit, QuillError> {
    parse(&SourceContext::from_file(name, source))
}
