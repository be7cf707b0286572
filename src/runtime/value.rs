use std::{cell::RefCell, collections::HashSet, fmt, rc::Rc};

use num_bigint::BigInt;

use crate::{
    ast::{pretty, Block, ParameterList, Payload, SyntaxKind, TokenKind},
    atoms::Atom,
    runtime::env::Env,
};

/// Shared, mutable array cell. Aliases observe each other's writes.
pub type ArrayRef = Rc<RefCell<Vec<Value>>>;

/// Represents a value in the Quill runtime.
///
/// # Examples
///
/// ```rust
/// use quill::runtime::Value;
/// let v = Value::array(vec![Value::int(1), Value::Str("a".into())]);
/// assert_eq!(v.to_string(), "[1, \"a\"]");
/// assert_eq!(v.type_name(), "array");
/// ```
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    None,
    Int(BigInt),
    Str(String),
    Bool(bool),
    Array(ArrayRef),
    Func(Rc<Callable>),
    Macro(Rc<Callable>),
    Builtin(Atom),
    Syntax(Rc<SyntaxValue>),
    /// Reserved but not yet initialised. Never user-visible.
    Uninit,
}

/// A user-defined function or macro together with its defining environment.
pub struct Callable {
    pub name: Option<String>,
    pub params: ParameterList,
    pub body: Block,
    pub env: Env,
}

impl Callable {
    pub fn new(name: Option<&str>, params: &ParameterList, body: &Block, env: &Env) -> Rc<Self> {
        Rc::new(Callable {
            name: name.map(str::to_string),
            params: params.clone(),
            body: body.clone(),
            env: env.clone(),
        })
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("name", &self.name)
            .field("params", &self.params.names())
            .finish_non_exhaustive()
    }
}

/// A reified syntax node: kind, reified children and, for tokens, a payload.
///
/// Children are arbitrary values. A child is usually another syntax value or
/// `none` for an absent optional child, but unquote holes splice in whatever
/// the hole evaluated to.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxValue {
    pub kind: SyntaxKind,
    pub children: Vec<Value>,
    pub payload: Option<Payload>,
}

impl SyntaxValue {
    pub fn node(kind: SyntaxKind, children: Vec<Value>) -> Self {
        SyntaxValue {
            kind,
            children,
            payload: None,
        }
    }

    pub fn token(kind: TokenKind, payload: Payload) -> Self {
        SyntaxValue {
            kind: kind.syntax_kind(),
            children: Vec::new(),
            payload: Some(payload),
        }
    }
}

impl Value {
    pub fn int(n: impl Into<BigInt>) -> Self {
        Value::Int(n.into())
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn syntax(value: SyntaxValue) -> Self {
        Value::Syntax(Rc::new(value))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Int(_) => "int",
            Value::Str(_) => "str",
            Value::Bool(_) => "bool",
            Value::Array(_) => "array",
            Value::Func(_) => "func",
            Value::Macro(_) => "macro",
            Value::Builtin(_) => "builtin",
            Value::Syntax(_) => "syntax",
            Value::Uninit => "uninit",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Only `false` and `none` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::None | Value::Bool(false))
    }

    pub fn as_syntax(&self) -> Option<&SyntaxValue> {
        match self {
            Value::Syntax(s) => Some(s),
            _ => None,
        }
    }

    pub fn from_payload(payload: &Payload) -> Self {
        match payload {
            Payload::Int(n) => Value::Int(n.clone()),
            Payload::Str(s) => Value::Str(s.clone()),
            Payload::Bool(b) => Value::Bool(*b),
        }
    }

    pub fn to_payload(&self) -> Option<Payload> {
        match self {
            Value::Int(n) => Some(Payload::Int(n.clone())),
            Value::Str(s) => Some(Payload::Str(s.clone())),
            Value::Bool(b) => Some(Payload::Bool(*b)),
            _ => None,
        }
    }

    // ------------------------------------------------------------------------
    // Formatting helpers
    // ------------------------------------------------------------------------

    fn write_repr(
        &self,
        f: &mut fmt::Formatter<'_>,
        nested: bool,
        open: &mut Vec<*const RefCell<Vec<Value>>>,
    ) -> fmt::Result {
        match self {
            Value::None => f.write_str("none"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Str(s) if nested => f.write_str(&pretty::quote_string(s)),
            Value::Str(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Array(items) => {
                let ptr = Rc::as_ptr(items);
                if open.contains(&ptr) {
                    return f.write_str("[...]");
                }
                open.push(ptr);
                f.write_str("[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.write_repr(f, true, open)?;
                }
                open.pop();
                f.write_str("]")
            }
            Value::Func(c) => match &c.name {
                Some(name) => write!(f, "<func {name}>"),
                None => f.write_str("<func>"),
            },
            Value::Macro(c) => write!(f, "<macro {}>", c.display_name()),
            Value::Builtin(atom) => write!(f, "<builtin {}>", atom.name),
            Value::Syntax(s) => write!(f, "<syntax {}>", s.kind),
            Value::Uninit => f.write_str("<uninit>"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_repr(f, false, &mut Vec::new())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Syntax(s) => write!(f, "{s:?}"),
            other => other.write_repr(f, true, &mut Vec::new()),
        }
    }
}

// ============================================================================
// EQUALITY
// ============================================================================

type ArrayPair = (*const RefCell<Vec<Value>>, *const RefCell<Vec<Value>>);

fn values_equal(a: &Value, b: &Value, seen: &mut HashSet<ArrayPair>) -> bool {
    match (a, b) {
        (Value::None, Value::None) | (Value::Uninit, Value::Uninit) => true,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => {
            if Rc::ptr_eq(x, y) || !seen.insert((Rc::as_ptr(x), Rc::as_ptr(y))) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| values_equal(a, b, seen))
        }
        (Value::Func(x), Value::Func(y)) | (Value::Macro(x), Value::Macro(y)) => Rc::ptr_eq(x, y),
        (Value::Builtin(x), Value::Builtin(y)) => x.name == y.name,
        (Value::Syntax(x), Value::Syntax(y)) => {
            x.kind == y.kind
                && x.payload == y.payload
                && x.children.len() == y.children.len()
                && x
                    .children
                    .iter()
                    .zip(y.children.iter())
                    .all(|(a, b)| values_equal(a, b, seen))
        }
        _ => false,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        values_equal(self, other, &mut HashSet::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_are_quoted_only_inside_arrays() {
        assert_eq!(Value::Str("hi".into()).to_string(), "hi");
        let arr = Value::array(vec![Value::Str("hi".into()), Value::None, Value::Bool(true)]);
        assert_eq!(arr.to_string(), "[\"hi\", none, true]");
    }

    #[test]
    fn self_referential_arrays_display_and_compare() {
        let arr = Value::array(vec![Value::int(1)]);
        if let Value::Array(cell) = &arr {
            cell.borrow_mut().push(arr.clone());
        }
        assert_eq!(arr.to_string(), "[1, [...]]");
        assert!(arr == arr.clone());
    }

    #[test]
    fn arrays_are_shared_between_aliases() {
        let a = Value::array(vec![]);
        let b = a.clone();
        if let Value::Array(cell) = &b {
            cell.borrow_mut().push(Value::int(7));
        }
        assert_eq!(a.to_string(), "[7]");
    }

    #[test]
    fn syntax_values_compare_structurally() {
        let one = || {
            Value::syntax(SyntaxValue::node(
                SyntaxKind::IntLitExpr,
                vec![Value::syntax(SyntaxValue::token(
                    TokenKind::IntLiteral,
                    Payload::Int(1.into()),
                ))],
            ))
        };
        assert_eq!(one(), one());
        assert_eq!(one().to_string(), "<syntax IntLitExpr>");
    }

    #[test]
    fn truthiness() {
        assert!(!Value::None.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::int(0).is_truthy());
        assert!(Value::Str(String::new()).is_truthy());
    }
}
