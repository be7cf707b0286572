//! Lexical environments.
//!
//! The same frame structure serves the static (compile-time) scopes built
//! before macro expansion and the runtime scopes created by the evaluator.
//! Frame operations return bare [`ErrorKind`]s; callers attach the span.

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    fmt,
    rc::Rc,
};

use crate::{errors::ErrorKind, runtime::Value};

pub type Env = Rc<Frame>;

#[derive(Debug, Clone)]
pub struct Binding {
    pub value: Value,
    pub readonly: bool,
}

#[derive(Default)]
pub struct Frame {
    bindings: RefCell<HashMap<String, Binding>>,
    /// Names looked up through this frame before it declared them.
    observed: RefCell<HashSet<String>>,
    parent: Option<Env>,
}

impl Frame {
    pub fn root() -> Env {
        Rc::new(Frame::default())
    }

    pub fn child(parent: &Env) -> Env {
        Rc::new(Frame {
            parent: Some(parent.clone()),
            ..Frame::default()
        })
    }

    pub fn parent(&self) -> Option<&Env> {
        self.parent.as_ref()
    }

    /// Checked declaration used by the static passes.
    pub fn declare(&self, name: &str, value: Value, readonly: bool) -> Result<(), ErrorKind> {
        if self.bindings.borrow().contains_key(name) {
            return Err(ErrorKind::Redeclaration { name: name.into() });
        }
        if self.observed.borrow().contains(name) {
            return Err(ErrorKind::UseBeforeDeclaration { name: name.into() });
        }
        self.define(name, value, readonly);
        Ok(())
    }

    /// Inserts or overwrites a binding in this frame.
    pub fn define(&self, name: &str, value: Value, readonly: bool) {
        self.bindings
            .borrow_mut()
            .insert(name.to_string(), Binding { value, readonly });
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
    }

    pub fn binding(&self, name: &str) -> Option<Binding> {
        if let Some(binding) = self.bindings.borrow().get(name) {
            return Some(binding.clone());
        }
        self.parent.as_ref().and_then(|p| p.binding(name))
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.binding(name).map(|b| b.value)
    }

    /// Like [`Frame::binding`], but every frame passed on the way out records
    /// `name` as observed so a later declaration there is rejected.
    pub fn binding_marking(&self, name: &str) -> Option<Binding> {
        if let Some(binding) = self.bindings.borrow().get(name) {
            return Some(binding.clone());
        }
        self.observed.borrow_mut().insert(name.to_string());
        self.parent.as_ref().and_then(|p| p.binding_marking(name))
    }

    pub fn assign(&self, name: &str, value: Value) -> Result<(), ErrorKind> {
        if let Some(binding) = self.bindings.borrow_mut().get_mut(name) {
            if binding.readonly {
                return Err(ErrorKind::ReadonlyViolation { name: name.into() });
            }
            if matches!(binding.value, Value::Uninit) {
                return Err(ErrorKind::UseBeforeDeclaration { name: name.into() });
            }
            binding.value = value;
            return Ok(());
        }
        match &self.parent {
            Some(parent) => parent.assign(name, value),
            None => Err(ErrorKind::UndeclaredName { name: name.into() }),
        }
    }

    /// Names bound directly in this frame, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.bindings.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("names", &self.names())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}
