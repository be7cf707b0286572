//! # Quill Macro Expansion System
//!
//! Expansion runs between parsing and validation. It rewrites every macro
//! call site in a program into the syntax its macro returns, until no macro
//! call is left outside quoted code.
//!
//! ## Module Structure
//!
//! - **`scope`**: static frames for every scope, built before expansion
//! - **`expander`**: the depth-first rewrite with fixed-point re-testing
//! - **`reify`**: syntax tree to [`SyntaxValue`](crate::runtime::SyntaxValue),
//!   including quote/unquote
//! - **`absorb`**: syntax values back into syntax trees
//!
//! Macro bodies are ordinary code run by the [`Interpreter`]: a macro call
//! reifies its argument expressions, calls the macro like a function with
//! those values, and absorbs the result at the call site. Every rewrite is
//! recorded as an [`ExpansionStep`].

use serde::Serialize;
use tracing::info;

use crate::{
    ast::{CompUnit, Span},
    errors::{PhaseContext, QuillError},
    runtime::Interpreter,
};

pub mod absorb;
pub mod expander;
pub mod reify;
pub mod scope;

pub use expander::Expander;
pub use scope::{build_frames, FrameTable};

/// One macro call rewritten into its result.
#[derive(Debug, Clone, Serialize)]
pub struct ExpansionStep {
    pub name: String,
    pub span: Span,
    /// Number of expansions active when this one finished, itself included.
    pub depth: usize,
    pub call_site: String,
    pub result: String,
}

/// Expands every macro call in `unit`. Returns the input unchanged (same
/// statements, same ids) when there is nothing to expand.
pub fn expand_macros(unit: &CompUnit, interp: &mut Interpreter) -> Result<CompUnit, QuillError> {
    let scope_ctx = PhaseContext::new(interp.source.clone(), "scope");
    let root = interp.globals().clone();
    let mut table = build_frames(unit, &root, &scope_ctx)?;
    info!(frames = table.len(), "built static scopes");

    let expanded = Expander::new(interp, &mut table).comp_unit(unit)?;
    info!(rewrites = interp.trace.len(), "macro expansion finished");
    Ok(expanded.unwrap_or_else(|| unit.clone()))
}
