//! # General-purpose Atoms
//!
//! - **`say`**: writes its arguments, space separated, to the output sink.
//! - **`str`**: converts any value to its display string.
//! - **`len`**: length of an array or string.
//! - **`push`**: appends to an array in place.
//! - **`type`**: the type name of a value.

use crate::{
    atoms::{check_arity, AtomFn, AtomRegistry},
    errors::ErrorReporting,
    runtime::Value,
};

/// Writes its arguments to the output sink.
///
/// Usage: say(<value>, ...)
///
/// Returns: none.
pub const ATOM_SAY: AtomFn = |args, interp, _span| {
    let line = args
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    interp.output.emit(&line);
    Ok(Value::None)
};

/// Converts any value to its string representation.
///
/// Usage: str(<value>)
pub const ATOM_STR: AtomFn = |args, interp, span| {
    check_arity("str", args, 1, interp, span)?;
    Ok(Value::Str(args[0].to_string()))
};

/// Usage: len(<array or string>)
///
/// Example: len([1, 2]) => 2, len("héllo") => 5
pub const ATOM_LEN: AtomFn = |args, interp, span| {
    check_arity("len", args, 1, interp, span)?;
    match &args[0] {
        Value::Array(items) => Ok(Value::int(items.borrow().len())),
        Value::Str(s) => Ok(Value::int(s.chars().count())),
        other => Err(interp.type_mismatch("len", "array or str", other.type_name(), span)),
    }
};

/// Appends a value to an array and returns the same array.
///
/// Usage: push(<array>, <value>)
pub const ATOM_PUSH: AtomFn = |args, interp, span| {
    check_arity("push", args, 2, interp, span)?;
    match &args[0] {
        Value::Array(items) => {
            items.borrow_mut().push(args[1].clone());
            Ok(args[0].clone())
        }
        other => Err(interp.type_mismatch("push", "array", other.type_name(), span)),
    }
};

/// Usage: type(<value>)
///
/// Example: type(code`1`) => "syntax"
pub const ATOM_TYPE: AtomFn = |args, interp, span| {
    check_arity("type", args, 1, interp, span)?;
    Ok(Value::Str(args[0].type_name().to_string()))
};

pub fn register_core_atoms(registry: &mut AtomRegistry) {
    registry.register("say", ATOM_SAY);
    registry.register("str", ATOM_STR);
    registry.register("len", ATOM_LEN);
    registry.register("push", ATOM_PUSH);
    registry.register("type", ATOM_TYPE);
}
