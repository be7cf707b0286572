//! Quill Error Handling - Unified Encapsulated API
//!
//! Every phase of the pipeline (parse, scope building, macro expansion,
//! validation, evaluation) reports failures through the single [`QuillError`]
//! type. Errors are never constructed by hand outside this module: each phase
//! context implements [`ErrorReporting`] and calls `report(kind, span)`.

use miette::{Diagnostic, SourceSpan};
use miette::{LabeledSpan, NamedSource};
use thiserror::Error;
use std::fmt;
use std::sync::Arc;

use crate::ast::Span;

// ============================================================================
// SOURCE CONTEXT - Error reporting infrastructure
// ============================================================================

/// Represents source context for error reporting with explicit hierarchy
/// between real sources (preferred) and fallbacks (tolerated when necessary)
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub name: String,
    pub content: String,
}

impl SourceContext {
    /// Create a source context from real file content
    pub fn from_file(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Create a fallback when real source is unavailable
    pub fn fallback(context: &str) -> Self {
        Self {
            name: "fallback".to_string(),
            content: format!("# {}", context),
        }
    }

    /// Convert to NamedSource for use with miette error reporting
    pub fn to_named_source(&self) -> Arc<NamedSource<String>> {
        Arc::new(NamedSource::new(self.name.clone(), self.content.clone()))
    }

    /// Returns the source text covered by `span`, or an empty string when the
    /// span does not fall inside this source (e.g. nodes built by a macro).
    pub fn snippet(&self, span: Span) -> &str {
        self.content.get(span.start..span.end).unwrap_or("")
    }
}

impl Default for SourceContext {
    fn default() -> Self {
        Self::fallback("default context")
    }
}

// ============================================================================
// ERROR TYPES
// ============================================================================

/// The single error type - no wrapper, no variants, just essential data
#[derive(Debug)]
pub struct QuillError {
    /// What went wrong (type-specific data)
    pub kind: ErrorKind,
    /// Where it happened (context-specific source information)
    pub source_info: SourceInfo,
    /// How to help (auto-populated based on context)
    pub diagnostic_info: DiagnosticInfo,
}

/// All error types as a clean enum - no duplicate fields
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    // Parse errors
    #[error("Parse error: {message}")]
    Syntax { message: String },
    #[error("Parse error: invalid {literal_type} '{value}'")]
    InvalidLiteral { literal_type: String, value: String },

    // Scope errors - static environments and name use
    #[error("Scope error: '{name}' is already declared in this scope")]
    Redeclaration { name: String },
    #[error("Scope error: '{name}' used before its declaration")]
    UseBeforeDeclaration { name: String },
    #[error("Scope error: '{name}' is not declared")]
    UndeclaredName { name: String },
    #[error("Scope error: cannot assign to readonly binding '{name}'")]
    ReadonlyViolation { name: String },

    // Macro expansion errors
    #[error("Macro error: unquote outside of a quote")]
    UnquoteOutsideQuote,
    #[error("Macro error: a {found} cannot be placed in {position} position")]
    IncompatibleSyntax { found: String, position: String },
    #[error("Macro error: macro '{name}' referenced at runtime")]
    MacroAtRuntime { name: String },
    #[error("Macro error: expansion depth limit of {limit} exceeded")]
    ExpansionLimit { limit: usize },

    // Runtime errors
    #[error("Runtime error: too many arguments to '{name}' (expected {expected}, got {actual})")]
    TooManyArguments {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("Runtime error: not enough arguments to '{name}' (expected {expected}, got {actual})")]
    NotEnoughArguments {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("Runtime error: 'last' outside of a loop")]
    LastOutsideLoop,
    #[error("Runtime error: 'next' outside of a loop")]
    NextOutsideLoop,
    #[error("Runtime error: 'return' outside of a function or macro")]
    ReturnOutsideRoutine,
    #[error("Runtime error: division by zero")]
    DivisionByZero,
    #[error("Type error: {operation} expected {expected}, got {actual}")]
    TypeMismatch {
        operation: String,
        expected: String,
        actual: String,
    },
    #[error("Runtime error: index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: String, len: usize },
    #[error("Runtime error: value of type {type_name} is not callable")]
    NotCallable { type_name: String },
    #[error("Runtime error: out of fuel after {fuel} loop iterations")]
    OutOfFuel { fuel: u64 },
    #[error("Runtime error: call depth limit of {limit} exceeded")]
    RecursionLimit { limit: usize },

    // Engine errors
    #[error("Internal error: {message}")]
    Internal { message: String },
    #[error("I/O error: cannot read '{path}': {message}")]
    Io { path: String, message: String },
}

/// Context-specific source information
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub source: Arc<NamedSource<String>>,
    pub primary_span: SourceSpan,
    pub phase: String,
}

/// Diagnostic enhancement data
#[derive(Debug, Clone)]
pub struct DiagnosticInfo {
    pub help: Option<String>,
    pub error_code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Parse,
    Scope,
    Expansion,
    Runtime,
    Internal,
}

impl ErrorKind {
    /// Get the error category for test assertions
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Syntax { .. } | Self::InvalidLiteral { .. } => ErrorCategory::Parse,

            Self::Redeclaration { .. }
            | Self::UseBeforeDeclaration { .. }
            | Self::UndeclaredName { .. }
            | Self::ReadonlyViolation { .. } => ErrorCategory::Scope,

            Self::UnquoteOutsideQuote
            | Self::IncompatibleSyntax { .. }
            | Self::MacroAtRuntime { .. }
            | Self::ExpansionLimit { .. } => ErrorCategory::Expansion,

            Self::TooManyArguments { .. }
            | Self::NotEnoughArguments { .. }
            | Self::LastOutsideLoop
            | Self::NextOutsideLoop
            | Self::ReturnOutsideRoutine
            | Self::DivisionByZero
            | Self::TypeMismatch { .. }
            | Self::IndexOutOfBounds { .. }
            | Self::NotCallable { .. }
            | Self::OutOfFuel { .. }
            | Self::RecursionLimit { .. }
            | Self::Io { .. } => ErrorCategory::Runtime,

            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Get error code suffix for diagnostic codes
    pub const fn code_suffix(&self) -> &'static str {
        match self {
            Self::Syntax { .. } => "syntax",
            Self::InvalidLiteral { .. } => "invalid_literal",
            Self::Redeclaration { .. } => "redeclaration",
            Self::UseBeforeDeclaration { .. } => "use_before_declaration",
            Self::UndeclaredName { .. } => "undeclared_name",
            Self::ReadonlyViolation { .. } => "readonly_violation",
            Self::UnquoteOutsideQuote => "unquote_outside_quote",
            Self::IncompatibleSyntax { .. } => "incompatible_syntax",
            Self::MacroAtRuntime { .. } => "macro_at_runtime",
            Self::ExpansionLimit { .. } => "expansion_limit",
            Self::TooManyArguments { .. } => "too_many_arguments",
            Self::NotEnoughArguments { .. } => "not_enough_arguments",
            Self::LastOutsideLoop => "last_outside_loop",
            Self::NextOutsideLoop => "next_outside_loop",
            Self::ReturnOutsideRoutine => "return_outside_routine",
            Self::DivisionByZero => "division_by_zero",
            Self::TypeMismatch { .. } => "type_mismatch",
            Self::IndexOutOfBounds { .. } => "index_out_of_bounds",
            Self::NotCallable { .. } => "not_callable",
            Self::OutOfFuel { .. } => "out_of_fuel",
            Self::RecursionLimit { .. } => "recursion_limit",
            Self::Internal { .. } => "internal",
            Self::Io { .. } => "io",
        }
    }

    fn primary_label(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Parse => "cannot parse this",
            ErrorCategory::Scope => "name used here",
            ErrorCategory::Expansion => "while expanding this",
            ErrorCategory::Runtime => "while evaluating this",
            ErrorCategory::Internal => "engine failed here",
        }
    }
}

impl std::error::Error for QuillError {}

impl fmt::Display for QuillError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl Diagnostic for QuillError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(&self.diagnostic_info.error_code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.diagnostic_info
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display + 'a>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let labels = vec![LabeledSpan::new_with_span(
            Some(self.kind.primary_label().to_string()),
            self.source_info.primary_span,
        )];
        Some(Box::new(labels.into_iter()))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&*self.source_info.source)
    }
}

// ============================================================================
// ERROR REPORTING CONTEXTS
// ============================================================================

/// Context-aware error creation - each context knows how to create appropriate errors
pub trait ErrorReporting {
    /// Create an error with context-appropriate enhancements
    fn report(&self, kind: ErrorKind, span: Span) -> QuillError;

    fn type_mismatch(&self, operation: &str, expected: &str, actual: &str, span: Span) -> QuillError {
        self.report(
            ErrorKind::TypeMismatch {
                operation: operation.into(),
                expected: expected.into(),
                actual: actual.into(),
            },
            span,
        )
    }

    /// Creates an internal error - these indicate engine bugs, not user errors.
    fn internal_error(&self, message: &str, span: Span) -> QuillError {
        let mut error = self.report(
            ErrorKind::Internal {
                message: message.into(),
            },
            span,
        );
        error.diagnostic_info.help =
            Some("This is an internal engine error. Please report this as a bug.".into());
        error
    }
}

/// General-purpose error creation context for a named pipeline phase.
#[derive(Debug, Clone)]
pub struct PhaseContext {
    pub source: SourceContext,
    pub phase: &'static str,
}

impl PhaseContext {
    pub fn new(source: SourceContext, phase: &'static str) -> Self {
        Self { source, phase }
    }
}

impl ErrorReporting for PhaseContext {
    fn report(&self, kind: ErrorKind, span: Span) -> QuillError {
        build_error(&self.source, self.phase, kind, span)
    }
}

/// Shared constructor used by every `ErrorReporting` implementation.
pub(crate) fn build_error(
    source: &SourceContext,
    phase: &str,
    kind: ErrorKind,
    span: Span,
) -> QuillError {
    let error_code = format!("quill::{}::{}", phase, kind.code_suffix());
    let help = help_for(&kind);
    QuillError {
        kind,
        source_info: SourceInfo {
            source: source.to_named_source(),
            primary_span: to_source_span(span),
            phase: phase.to_string(),
        },
        diagnostic_info: DiagnosticInfo { help, error_code },
    }
}

fn help_for(kind: &ErrorKind) -> Option<String> {
    match kind {
        ErrorKind::UnquoteOutsideQuote => {
            Some("`${...}` is only meaningful inside a code`...` quote".into())
        }
        ErrorKind::MacroAtRuntime { .. } => {
            Some("macros can only be called directly by name; they do not exist at runtime".into())
        }
        ErrorKind::ExpansionLimit { .. } => {
            Some("a macro keeps expanding into further macro calls; raise --max-expansion-depth if this is intended".into())
        }
        ErrorKind::UseBeforeDeclaration { name } => {
            Some(format!("move the declaration of '{}' before its first use", name))
        }
        _ => None,
    }
}

/// Converts a Quill AST Span to a miette SourceSpan.
pub fn to_source_span(span: Span) -> SourceSpan {
    SourceSpan::from(span.start..span.end.max(span.start))
}

// ============================================================================
// ERROR FORMATTING UTILITIES
// ============================================================================

/// Prints a QuillError with full miette diagnostics
pub fn print_error(error: QuillError) {
    use miette::Report;
    let report = Report::new(error);
    eprintln!("{report:?}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_includes_phase_and_suffix() {
        let ctx = PhaseContext::new(SourceContext::from_file("t.ql", "m()"), "expand");
        let err = ctx.report(ErrorKind::UnquoteOutsideQuote, Span::new(0, 3));
        assert_eq!(err.diagnostic_info.error_code, "quill::expand::unquote_outside_quote");
        assert_eq!(err.kind.category(), ErrorCategory::Expansion);
        assert!(err.diagnostic_info.help.is_some());
    }

    #[test]
    fn internal_errors_ask_for_a_bug_report() {
        let ctx = PhaseContext::new(SourceContext::default(), "absorb");
        let err = ctx.internal_error("abstract kind", Span::default());
        let report = format!("{:?}", miette::Report::new(err));
        assert!(report.contains("Please report this as a bug"));
    }

    #[test]
    fn display_uses_kind_message() {
        let ctx = PhaseContext::new(SourceContext::default(), "eval");
        let err = ctx.report(
            ErrorKind::NotEnoughArguments {
                name: "m".into(),
                expected: 1,
                actual: 0,
            },
            Span::default(),
        );
        assert_eq!(
            err.to_string(),
            "Runtime error: not enough arguments to 'm' (expected 1, got 0)"
        );
    }
}
