//! AST module for the Quill language
//!
//! Syntax nodes are immutable once built. Rewriting passes (macro expansion)
//! never mutate a node: they build a new parent around new children and share
//! every untouched subtree through `Rc`. Scope-introducing nodes carry a
//! [`NodeId`] that survives rebuilding, so side tables keyed by it (the static
//! frame table) stay valid across rewrites.

// ============================================================================
// IMPORTS
// ============================================================================

use num_bigint::BigInt;
use serde::Serialize;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

pub mod kind;
pub mod pretty;

pub use kind::SyntaxKind;

// ============================================================================
// SPANS AND IDENTITIES
// ============================================================================

/// Represents a span in the source code.
///
/// # Examples
///
/// ```rust
/// use quill::ast::Span;
/// let span = Span::new(0, 5).join(Span::new(7, 9));
/// assert_eq!((span.start, span.end), (0, 9));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn join(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Stable identity of a scope-introducing node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u32);

static NEXT_NODE_ID: AtomicU32 = AtomicU32::new(1);

impl NodeId {
    /// Allocates an id never handed out before in this process.
    pub fn fresh() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

// ============================================================================
// TOKENS
// ============================================================================

/// Leaf token kinds. Each maps onto the token band of [`SyntaxKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    Identifier,
    IntLiteral,
    StrLiteral,
    BoolLiteral,
    InfixOperator,
    PrefixOperator,
}

impl TokenKind {
    pub fn syntax_kind(self) -> SyntaxKind {
        match self {
            TokenKind::Identifier => SyntaxKind::Identifier,
            TokenKind::IntLiteral => SyntaxKind::IntLiteral,
            TokenKind::StrLiteral => SyntaxKind::StrLiteral,
            TokenKind::BoolLiteral => SyntaxKind::BoolLiteral,
            TokenKind::InfixOperator => SyntaxKind::InfixOperator,
            TokenKind::PrefixOperator => SyntaxKind::PrefixOperator,
        }
    }

    pub fn from_syntax_kind(kind: SyntaxKind) -> Option<Self> {
        match kind {
            SyntaxKind::Identifier => Some(TokenKind::Identifier),
            SyntaxKind::IntLiteral => Some(TokenKind::IntLiteral),
            SyntaxKind::StrLiteral => Some(TokenKind::StrLiteral),
            SyntaxKind::BoolLiteral => Some(TokenKind::BoolLiteral),
            SyntaxKind::InfixOperator => Some(TokenKind::InfixOperator),
            SyntaxKind::PrefixOperator => Some(TokenKind::PrefixOperator),
            _ => None,
        }
    }

    /// Whether `payload` has the scalar type this token kind carries.
    pub fn accepts(self, payload: &Payload) -> bool {
        matches!(
            (self, payload),
            (TokenKind::IntLiteral, Payload::Int(_))
                | (TokenKind::BoolLiteral, Payload::Bool(_))
                | (
                    TokenKind::Identifier
                        | TokenKind::StrLiteral
                        | TokenKind::InfixOperator
                        | TokenKind::PrefixOperator,
                    Payload::Str(_)
                )
        )
    }
}

/// Scalar payload of a leaf token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Payload {
    Int(BigInt),
    Str(String),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub payload: Payload,
    pub span: Span,
}

impl Token {
    pub fn ident(name: impl Into<String>, span: Span) -> Self {
        Self::text(TokenKind::Identifier, name, span)
    }

    pub fn int(value: impl Into<BigInt>, span: Span) -> Self {
        Token {
            kind: TokenKind::IntLiteral,
            payload: Payload::Int(value.into()),
            span,
        }
    }

    pub fn string(value: impl Into<String>, span: Span) -> Self {
        Self::text(TokenKind::StrLiteral, value, span)
    }

    pub fn boolean(value: bool, span: Span) -> Self {
        Token {
            kind: TokenKind::BoolLiteral,
            payload: Payload::Bool(value),
            span,
        }
    }

    pub fn infix(op: impl Into<String>, span: Span) -> Self {
        Self::text(TokenKind::InfixOperator, op, span)
    }

    pub fn prefix(op: impl Into<String>, span: Span) -> Self {
        Self::text(TokenKind::PrefixOperator, op, span)
    }

    fn text(kind: TokenKind, text: impl Into<String>, span: Span) -> Self {
        Token {
            kind,
            payload: Payload::Str(text.into()),
            span,
        }
    }

    /// The textual payload (identifier name, string contents or operator).
    /// Empty for integer and boolean tokens.
    pub fn text_value(&self) -> &str {
        match &self.payload {
            Payload::Str(s) => s,
            Payload::Int(_) | Payload::Bool(_) => "",
        }
    }
}

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

pub type ExprNode = Rc<Expr>;
pub type StmtNode = Rc<Stmt>;

/// Root of a whole program.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompUnit {
    pub id: NodeId,
    pub statements: Vec<StmtNode>,
    pub span: Span,
}

/// A braced statement sequence with its own lexical scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    pub id: NodeId,
    pub statements: Vec<StmtNode>,
    pub span: Span,
}

/// Parameters of a function, macro or function expression. Introduces the
/// scope the parameters are bound in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterList {
    pub id: NodeId,
    pub params: Vec<Token>,
    pub span: Span,
}

/// One `cond { ... }` arm of an `if` statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IfClause {
    pub condition: ExprNode,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    IntLit(Token),
    StrLit(Token),
    BoolLit(Token),
    NoneLit(Span),
    Ident(Token),
    ArrayLit {
        elements: Vec<ExprNode>,
        span: Span,
    },
    Infix {
        lhs: ExprNode,
        op: Token,
        rhs: ExprNode,
        span: Span,
    },
    Prefix {
        op: Token,
        operand: ExprNode,
        span: Span,
    },
    Assign {
        target: ExprNode,
        value: ExprNode,
        span: Span,
    },
    Call {
        callee: ExprNode,
        args: Vec<ExprNode>,
        span: Span,
    },
    Index {
        target: ExprNode,
        index: ExprNode,
        span: Span,
    },
    Func {
        name: Option<Token>,
        params: ParameterList,
        body: Block,
        span: Span,
    },
    /// ``code`...` ``: literal code, never expanded in place.
    Quote {
        block: Block,
        span: Span,
    },
    /// `${expr}`: a hole inside a quote.
    Unquote {
        expr: ExprNode,
        span: Span,
    },
    Do {
        stmt: StmtNode,
        span: Span,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Stmt {
    Expr {
        expr: ExprNode,
        span: Span,
    },
    Block {
        block: Block,
        span: Span,
    },
    VarDecl {
        name: Token,
        init: Option<ExprNode>,
        span: Span,
    },
    FuncDecl {
        name: Token,
        params: ParameterList,
        body: Block,
        span: Span,
    },
    MacroDecl {
        name: Token,
        params: ParameterList,
        body: Block,
        span: Span,
    },
    If {
        clauses: Vec<IfClause>,
        else_block: Option<Block>,
        span: Span,
    },
    While {
        condition: ExprNode,
        body: Block,
        span: Span,
    },
    /// `for var in iterable { ... }`; `id` keys the loop-variable frame.
    For {
        id: NodeId,
        var: Token,
        iterable: ExprNode,
        body: Block,
        span: Span,
    },
    Return {
        value: Option<ExprNode>,
        span: Span,
    },
    Last {
        span: Span,
    },
    Next {
        span: Span,
    },
}

// ============================================================================
// PUBLIC API IMPLEMENTATION
// ============================================================================

impl CompUnit {
    pub fn new(statements: Vec<StmtNode>, span: Span) -> Self {
        CompUnit {
            id: NodeId::fresh(),
            statements,
            span,
        }
    }
}

impl Block {
    pub fn new(statements: Vec<StmtNode>, span: Span) -> Self {
        Block {
            id: NodeId::fresh(),
            statements,
            span,
        }
    }
}

impl ParameterList {
    pub fn new(params: Vec<Token>, span: Span) -> Self {
        ParameterList {
            id: NodeId::fresh(),
            params,
            span,
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.params.iter().map(|p| p.text_value().to_string()).collect()
    }
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::IntLit(token) | Expr::StrLit(token) | Expr::BoolLit(token) | Expr::Ident(token) => {
                token.span
            }
            Expr::NoneLit(span) => *span,
            Expr::ArrayLit { span, .. }
            | Expr::Infix { span, .. }
            | Expr::Prefix { span, .. }
            | Expr::Assign { span, .. }
            | Expr::Call { span, .. }
            | Expr::Index { span, .. }
            | Expr::Func { span, .. }
            | Expr::Quote { span, .. }
            | Expr::Unquote { span, .. }
            | Expr::Do { span, .. } => *span,
        }
    }

    pub fn kind(&self) -> SyntaxKind {
        match self {
            Expr::IntLit(_) => SyntaxKind::IntLitExpr,
            Expr::StrLit(_) => SyntaxKind::StrLitExpr,
            Expr::BoolLit(_) => SyntaxKind::BoolLitExpr,
            Expr::NoneLit(_) => SyntaxKind::NoneLitExpr,
            Expr::Ident(_) => SyntaxKind::IdentExpr,
            Expr::ArrayLit { .. } => SyntaxKind::ArrayLitExpr,
            Expr::Infix { .. } => SyntaxKind::InfixOpExpr,
            Expr::Prefix { .. } => SyntaxKind::PrefixOpExpr,
            Expr::Assign { .. } => SyntaxKind::AssignExpr,
            Expr::Call { .. } => SyntaxKind::CallExpr,
            Expr::Index { .. } => SyntaxKind::IndexExpr,
            Expr::Func { .. } => SyntaxKind::FuncExpr,
            Expr::Quote { .. } => SyntaxKind::QuoteExpr,
            Expr::Unquote { .. } => SyntaxKind::UnquoteExpr,
            Expr::Do { .. } => SyntaxKind::DoExpr,
        }
    }

    /// The callee name of a call whose callee is a bare identifier.
    pub fn bare_callee(&self) -> Option<&Token> {
        let Expr::Call { callee, .. } = self else {
            return None;
        };
        match &**callee {
            Expr::Ident(name) => Some(name),
            _ => None,
        }
    }
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Expr { span, .. }
            | Stmt::Block { span, .. }
            | Stmt::VarDecl { span, .. }
            | Stmt::FuncDecl { span, .. }
            | Stmt::MacroDecl { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::For { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::Last { span }
            | Stmt::Next { span } => *span,
        }
    }

    pub fn kind(&self) -> SyntaxKind {
        match self {
            Stmt::Expr { .. } => SyntaxKind::ExprStatement,
            Stmt::Block { .. } => SyntaxKind::BlockStatement,
            Stmt::VarDecl { .. } => SyntaxKind::VarDecl,
            Stmt::FuncDecl { .. } => SyntaxKind::FuncDecl,
            Stmt::MacroDecl { .. } => SyntaxKind::MacroDecl,
            Stmt::If { .. } => SyntaxKind::IfStatement,
            Stmt::While { .. } => SyntaxKind::WhileStatement,
            Stmt::For { .. } => SyntaxKind::ForStatement,
            Stmt::Return { .. } => SyntaxKind::ReturnStatement,
            Stmt::Last { .. } => SyntaxKind::LastStatement,
            Stmt::Next { .. } => SyntaxKind::NextStatement,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_are_unique() {
        let a = Block::new(vec![], Span::default());
        let b = Block::new(vec![], Span::default());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn token_payload_types_are_checked() {
        assert!(TokenKind::IntLiteral.accepts(&Payload::Int(3.into())));
        assert!(!TokenKind::IntLiteral.accepts(&Payload::Str("3".into())));
        assert!(TokenKind::InfixOperator.accepts(&Payload::Str("+".into())));
        assert!(!TokenKind::Identifier.accepts(&Payload::Bool(true)));
    }

    #[test]
    fn bare_callee_only_matches_identifiers() {
        let span = Span::default();
        let call = Expr::Call {
            callee: Rc::new(Expr::Ident(Token::ident("m", span))),
            args: vec![],
            span,
        };
        assert_eq!(call.bare_callee().map(Token::text_value), Some("m"));
        let indirect = Expr::Call {
            callee: Rc::new(Expr::IntLit(Token::int(1, span))),
            args: vec![],
            span,
        };
        assert!(indirect.bare_callee().is_none());
    }
}
