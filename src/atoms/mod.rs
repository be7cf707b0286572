//! # Quill Atom System
//!
//! Atoms are the built-in functions bound in the global frame. They receive
//! already-evaluated arguments and are available to ordinary code and to
//! macro bodies alike.
//!
//! ## Module Structure
//!
//! - **`core`**: general-purpose atoms (`say`, `str`, `len`, `push`, `type`)
//! - **`syntax`**: the syntax toolkit used by macros (`kind`, `children`, `syntax`, ...)

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use crate::{
    ast::Span,
    errors::{ErrorKind, ErrorReporting, QuillError},
    runtime::{Env, Interpreter, Value},
};

pub mod core;
pub mod syntax;

// ============================================================================
// CORE TYPES AND TRAITS
// ============================================================================

/// Atom function type: evaluated arguments, the interpreter (for output and
/// error reporting) and the span of the call expression.
pub type AtomFn = fn(args: &[Value], interp: &mut Interpreter, span: Span) -> Result<Value, QuillError>;

#[derive(Clone, Copy)]
pub struct Atom {
    pub name: &'static str,
    pub func: AtomFn,
}

// Output sink for `say`, to make I/O testable and injectable.
pub trait OutputSink {
    fn emit(&mut self, text: &str);
}

/// Shared handle to the active output sink.
#[derive(Clone)]
pub struct SharedOutput(pub Rc<RefCell<dyn OutputSink>>);

impl SharedOutput {
    pub fn new<T: OutputSink + 'static>(sink: T) -> Self {
        SharedOutput(Rc::new(RefCell::new(sink)))
    }

    pub fn emit(&self, text: &str) {
        self.0.borrow_mut().emit(text);
    }
}

// Registry for all atoms, inspectable at runtime.
#[derive(Default)]
pub struct AtomRegistry {
    pub atoms: HashMap<&'static str, Atom>,
}

impl AtomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &'static str, func: AtomFn) {
        self.atoms.insert(name, Atom { name, func });
    }

    pub fn get(&self, name: &str) -> Option<&Atom> {
        self.atoms.get(name)
    }

    /// Sorted atom names.
    pub fn list(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.atoms.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Binds every atom, readonly, in `frame`.
    pub fn install(&self, frame: &Env) {
        for atom in self.atoms.values() {
            frame.define(atom.name, Value::Builtin(*atom), true);
        }
    }
}

/// Registers all standard atoms from all modules with the given registry.
pub fn register_all_atoms(registry: &mut AtomRegistry) {
    core::register_core_atoms(registry);
    syntax::register_syntax_atoms(registry);
}

pub fn standard_registry() -> AtomRegistry {
    let mut registry = AtomRegistry::new();
    register_all_atoms(&mut registry);
    registry
}

// ============================================================================
// SHARED HELPERS
// ============================================================================

pub(crate) fn check_arity(
    name: &str,
    args: &[Value],
    expected: usize,
    interp: &Interpreter,
    span: Span,
) -> Result<(), QuillError> {
    let actual = args.len();
    let kind = if actual > expected {
        ErrorKind::TooManyArguments {
            name: name.into(),
            expected,
            actual,
        }
    } else if actual < expected {
        ErrorKind::NotEnoughArguments {
            name: name.into(),
            expected,
            actual,
        }
    } else {
        return Ok(());
    };
    Err(interp.report(kind, span))
}
