//! # Syntax Toolkit Atoms
//!
//! Inspection and construction of reified syntax, for use in macro bodies.
//! Kinds may be given either by name (`"CallExpr"`) or by numeric tag.
//! Constructed values are not shape-checked here; absorption checks them
//! when a macro returns them.

use crate::{
    ast::{Span, SyntaxKind, TokenKind},
    atoms::{check_arity, AtomFn, AtomRegistry},
    errors::{ErrorReporting, QuillError},
    runtime::{Interpreter, SyntaxValue, Value},
};

fn expect_syntax<'v>(
    op: &str,
    value: &'v Value,
    interp: &Interpreter,
    span: Span,
) -> Result<&'v SyntaxValue, QuillError> {
    value
        .as_syntax()
        .ok_or_else(|| interp.type_mismatch(op, "syntax", value.type_name(), span))
}

fn expect_kind(
    op: &str,
    value: &Value,
    interp: &Interpreter,
    span: Span,
) -> Result<SyntaxKind, QuillError> {
    let kind = match value {
        Value::Str(name) => SyntaxKind::from_name(name),
        Value::Int(tag) => u16::try_from(tag).ok().and_then(SyntaxKind::from_tag),
        _ => None,
    };
    kind.ok_or_else(|| interp.type_mismatch(op, "syntax kind name or tag", &value.to_string(), span))
}

/// Name of a syntax value's kind.
///
/// Usage: kind(<syntax>)
///
/// Example: kind(code`f(1)`) => "CallExpr"
pub const ATOM_KIND: AtomFn = |args, interp, span| {
    check_arity("kind", args, 1, interp, span)?;
    let node = expect_syntax("kind", &args[0], interp, span)?;
    Ok(Value::Str(node.kind.name().to_string()))
};

/// Numeric tag of a syntax value's kind.
///
/// Usage: kind_tag(<syntax>)
pub const ATOM_KIND_TAG: AtomFn = |args, interp, span| {
    check_arity("kind_tag", args, 1, interp, span)?;
    let node = expect_syntax("kind_tag", &args[0], interp, span)?;
    Ok(Value::int(node.kind.tag()))
};

/// Usage: kind_tag_of(<kind name>)
///
/// Example: kind_tag_of("IntLitExpr") => 130
pub const ATOM_KIND_TAG_OF: AtomFn = |args, interp, span| {
    check_arity("kind_tag_of", args, 1, interp, span)?;
    let kind = expect_kind("kind_tag_of", &args[0], interp, span)?;
    Ok(Value::int(kind.tag()))
};

/// Whether a value is syntax of the given kind. Abstract kinds
/// (`Statement`, `Expression`, `Declaration`) match their members.
///
/// Usage: kind_is(<value>, <kind>)
///
/// Example: kind_is(code`1`, "Expression") => true
pub const ATOM_KIND_IS: AtomFn = |args, interp, span| {
    check_arity("kind_is", args, 2, interp, span)?;
    let kind = expect_kind("kind_is", &args[1], interp, span)?;
    Ok(Value::Bool(
        args[0]
            .as_syntax()
            .is_some_and(|node| node.kind.conforms_to(kind)),
    ))
};

/// Reified children of a syntax value, `none` for absent ones.
///
/// Usage: children(<syntax>)
pub const ATOM_CHILDREN: AtomFn = |args, interp, span| {
    check_arity("children", args, 1, interp, span)?;
    let node = expect_syntax("children", &args[0], interp, span)?;
    Ok(Value::array(node.children.clone()))
};

/// Scalar payload of a token, `none` for composite nodes.
///
/// Usage: payload(<syntax>)
///
/// Example: payload(children(code`7`)[0]) => 7
pub const ATOM_PAYLOAD: AtomFn = |args, interp, span| {
    check_arity("payload", args, 1, interp, span)?;
    let node = expect_syntax("payload", &args[0], interp, span)?;
    Ok(node.payload.as_ref().map(Value::from_payload).unwrap_or_default())
};

/// Builds a composite syntax value.
///
/// Usage: syntax(<kind>, <array of children>)
///
/// Example: syntax("ReturnStatement", [none])
pub const ATOM_SYNTAX: AtomFn = |args, interp, span| {
    check_arity("syntax", args, 2, interp, span)?;
    let kind = expect_kind("syntax", &args[0], interp, span)?;
    if kind.is_token() {
        return Err(interp.type_mismatch("syntax", "composite kind (use token for tokens)", kind.name(), span));
    }
    let Value::Array(children) = &args[1] else {
        return Err(interp.type_mismatch("syntax", "array of children", args[1].type_name(), span));
    };
    let children = children.borrow().clone();
    Ok(Value::syntax(SyntaxValue::node(kind, children)))
};

/// Builds a token.
///
/// Usage: token(<token kind>, <payload>)
///
/// Example: token("Identifier", "x")
pub const ATOM_TOKEN: AtomFn = |args, interp, span| {
    check_arity("token", args, 2, interp, span)?;
    let kind = expect_kind("token", &args[0], interp, span)?;
    let Some(token_kind) = TokenKind::from_syntax_kind(kind) else {
        return Err(interp.type_mismatch("token", "token kind", kind.name(), span));
    };
    let payload = args[1]
        .to_payload()
        .filter(|p| token_kind.accepts(p))
        .ok_or_else(|| {
            interp.type_mismatch("token", "payload matching the token kind", args[1].type_name(), span)
        })?;
    Ok(Value::syntax(SyntaxValue::token(token_kind, payload)))
};

pub fn register_syntax_atoms(registry: &mut AtomRegistry) {
    registry.register("kind", ATOM_KIND);
    registry.register("kind_tag", ATOM_KIND_TAG);
    registry.register("kind_tag_of", ATOM_KIND_TAG_OF);
    registry.register("kind_is", ATOM_KIND_IS);
    registry.register("children", ATOM_CHILDREN);
    registry.register("payload", ATOM_PAYLOAD);
    registry.register("syntax", ATOM_SYNTAX);
    registry.register("token", ATOM_TOKEN);
}
