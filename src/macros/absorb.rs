//! Absorption: runtime value back into syntax tree.
//!
//! The inverse of reification, checked against the slot the value lands in.
//! Values that do not fit are coerced where the language allows it:
//!
//! | slot       | value                     | becomes                         |
//! |------------|---------------------------|---------------------------------|
//! | expression | statement                 | `DoExpr` around it              |
//! | expression | `Block`                   | `DoExpr` around a block stmt    |
//! | expression | int / str / bool / none   | the matching literal            |
//! | statement  | expression (or scalar)    | `ExprStatement` around it       |
//! | statement  | `Block`                   | `BlockStatement` around it      |
//!
//! Anything else raises `IncompatibleSyntax`. A node with the wrong number
//! of children, or carrying an abstract kind, is an engine bug and raises
//! an internal error. Every absorbed node takes the span of the macro call
//! and scope-introducing nodes get fresh ids.

use std::rc::Rc;

use tracing::trace;

use crate::{
    ast::{
        pretty, Block, CompUnit, Expr, ExprNode, IfClause, NodeId, ParameterList, Span, Stmt,
        StmtNode, SyntaxKind, Token, TokenKind,
    },
    errors::{ErrorKind, ErrorReporting, QuillError},
    runtime::{SyntaxValue, Value},
};

type AbsorbResult<T> = Result<T, QuillError>;

/// Absorbs a macro result in expression position.
pub fn expression(value: &Value, span: Span, reporter: &dyn ErrorReporting) -> AbsorbResult<ExprNode> {
    Absorber { span, reporter }.expr(value)
}

/// Absorbs a value in statement position.
pub fn statement(value: &Value, span: Span, reporter: &dyn ErrorReporting) -> AbsorbResult<StmtNode> {
    Absorber { span, reporter }.stmt(value)
}

pub fn block(value: &Value, span: Span, reporter: &dyn ErrorReporting) -> AbsorbResult<Block> {
    Absorber { span, reporter }.block(value)
}

pub fn comp_unit(value: &Value, span: Span, reporter: &dyn ErrorReporting) -> AbsorbResult<CompUnit> {
    let absorber = Absorber { span, reporter };
    let node = absorber.composite(value, SyntaxKind::CompUnit, "program")?;
    absorber.arity(node, 1)?;
    let statements = absorber.statement_list(&node.children[0])?;
    Ok(CompUnit::new(statements, span))
}

struct Absorber<'r> {
    span: Span,
    reporter: &'r dyn ErrorReporting,
}

/// Short description of a value for error messages.
fn describe(value: &Value) -> String {
    match value {
        Value::Syntax(node) => node.kind.name().to_string(),
        other => other.type_name().to_string(),
    }
}

impl Absorber<'_> {
    fn incompatible(&self, value: &Value, position: &str) -> QuillError {
        self.reporter.report(
            ErrorKind::IncompatibleSyntax {
                found: describe(value),
                position: position.into(),
            },
            self.span,
        )
    }

    fn arity(&self, node: &SyntaxValue, expected: usize) -> AbsorbResult<()> {
        if node.children.len() != expected {
            return Err(self.reporter.internal_error(
                &format!(
                    "{} expects {} children, found {}",
                    node.kind.name(),
                    expected,
                    node.children.len()
                ),
                self.span,
            ));
        }
        Ok(())
    }

    fn check_concrete(&self, node: &SyntaxValue) -> AbsorbResult<()> {
        if node.kind.is_abstract() {
            return Err(self.reporter.internal_error(
                &format!("abstract kind {} attached to a node", node.kind.name()),
                self.span,
            ));
        }
        Ok(())
    }

    /// The syntax node of exactly `kind`, or `IncompatibleSyntax`.
    fn composite<'v>(&self, value: &'v Value, kind: SyntaxKind, position: &str) -> AbsorbResult<&'v SyntaxValue> {
        match value.as_syntax() {
            Some(node) if node.kind == kind => Ok(node),
            Some(node) => {
                self.check_concrete(node)?;
                Err(self.incompatible(value, position))
            }
            None => Err(self.incompatible(value, position)),
        }
    }

    // ------------------------------------------------------------------------
    // Slots
    // ------------------------------------------------------------------------

    fn expr(&self, value: &Value) -> AbsorbResult<ExprNode> {
        let expr = match value {
            Value::Int(n) => Expr::IntLit(Token::int(n.clone(), self.span)),
            Value::Str(s) => Expr::StrLit(Token::string(s.clone(), self.span)),
            Value::Bool(b) => Expr::BoolLit(Token::boolean(*b, self.span)),
            Value::None => Expr::NoneLit(self.span),
            Value::Syntax(node) => {
                self.check_concrete(node)?;
                if node.kind.is_expression() {
                    return self.expr_node(node);
                }
                if node.kind.is_statement() {
                    Expr::Do {
                        stmt: self.stmt_node(node)?,
                        span: self.span,
                    }
                } else if node.kind == SyntaxKind::Block {
                    Expr::Do {
                        stmt: Rc::new(Stmt::Block {
                            block: self.block_node(node)?,
                            span: self.span,
                        }),
                        span: self.span,
                    }
                } else {
                    return Err(self.incompatible(value, "expression"));
                }
            }
            other => return Err(self.incompatible(other, "expression")),
        };
        Ok(Rc::new(expr))
    }

    fn opt_expr(&self, value: &Value) -> AbsorbResult<Option<ExprNode>> {
        match value {
            Value::None => Ok(None),
            other => self.expr(other).map(Some),
        }
    }

    fn stmt(&self, value: &Value) -> AbsorbResult<StmtNode> {
        if let Value::Syntax(node) = value {
            self.check_concrete(node)?;
            if node.kind.is_statement() {
                return self.stmt_node(node);
            }
            if node.kind == SyntaxKind::Block {
                return Ok(Rc::new(Stmt::Block {
                    block: self.block_node(node)?,
                    span: self.span,
                }));
            }
            if !node.kind.is_expression() {
                return Err(self.incompatible(value, "statement"));
            }
        }
        let expr = match value {
            Value::Syntax(_) | Value::Int(_) | Value::Str(_) | Value::Bool(_) | Value::None => {
                self.expr(value)?
            }
            other => return Err(self.incompatible(other, "statement")),
        };
        Ok(Rc::new(Stmt::Expr {
            expr,
            span: self.span,
        }))
    }

    fn block(&self, value: &Value) -> AbsorbResult<Block> {
        let node = self.composite(value, SyntaxKind::Block, "block")?;
        self.block_node(node)
    }

    fn opt_block(&self, value: &Value) -> AbsorbResult<Option<Block>> {
        match value {
            Value::None => Ok(None),
            other => self.block(other).map(Some),
        }
    }

    fn token(&self, value: &Value, kind: TokenKind) -> AbsorbResult<Token> {
        let position = kind.syntax_kind().name();
        let node = self.composite(value, kind.syntax_kind(), position)?;
        match &node.payload {
            Some(payload) if node.children.is_empty() && kind.accepts(payload) => Ok(Token {
                kind,
                payload: payload.clone(),
                span: self.span,
            }),
            _ => Err(self.reporter.internal_error(
                &format!("malformed {} token", node.kind.name()),
                self.span,
            )),
        }
    }

    fn opt_token(&self, value: &Value, kind: TokenKind) -> AbsorbResult<Option<Token>> {
        match value {
            Value::None => Ok(None),
            other => self.token(other, kind).map(Some),
        }
    }

    fn operator(&self, value: &Value, kind: TokenKind) -> AbsorbResult<Token> {
        let token = self.token(value, kind)?;
        let op = token.text_value();
        let known = match kind {
            TokenKind::InfixOperator => pretty::precedence(op) > 0,
            _ => matches!(op, "-" | "!"),
        };
        if !known {
            return Err(self.reporter.report(
                ErrorKind::IncompatibleSyntax {
                    found: format!("operator '{op}'"),
                    position: kind.syntax_kind().name().into(),
                },
                self.span,
            ));
        }
        Ok(token)
    }

    fn list<'v>(&self, value: &'v Value, kind: SyntaxKind) -> AbsorbResult<&'v [Value]> {
        Ok(&self.composite(value, kind, kind.name())?.children)
    }

    fn exprs(&self, value: &Value, kind: SyntaxKind) -> AbsorbResult<Vec<ExprNode>> {
        self.list(value, kind)?.iter().map(|v| self.expr(v)).collect()
    }

    fn statement_list(&self, value: &Value) -> AbsorbResult<Vec<StmtNode>> {
        self.list(value, SyntaxKind::StatementList)?
            .iter()
            .map(|v| self.stmt(v))
            .collect()
    }

    fn params(&self, value: &Value) -> AbsorbResult<ParameterList> {
        let params = self
            .list(value, SyntaxKind::ParameterList)?
            .iter()
            .map(|item| {
                let param = self.composite(item, SyntaxKind::Parameter, "parameter")?;
                self.arity(param, 1)?;
                self.token(&param.children[0], TokenKind::Identifier)
            })
            .collect::<AbsorbResult<Vec<_>>>()?;
        Ok(ParameterList::new(params, self.span))
    }

    fn if_clauses(&self, value: &Value) -> AbsorbResult<Vec<IfClause>> {
        let items = self.list(value, SyntaxKind::IfClauseList)?;
        if items.is_empty() {
            return Err(self.incompatible(value, "if statement"));
        }
        items
            .iter()
            .map(|item| {
                let clause = self.composite(item, SyntaxKind::IfClause, "if clause")?;
                self.arity(clause, 2)?;
                Ok(IfClause {
                    condition: self.expr(&clause.children[0])?,
                    body: self.block(&clause.children[1])?,
                    span: self.span,
                })
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------------

    fn block_node(&self, node: &SyntaxValue) -> AbsorbResult<Block> {
        self.arity(node, 1)?;
        let statements = self.statement_list(&node.children[0])?;
        Ok(Block::new(statements, self.span))
    }

    fn expr_node(&self, node: &SyntaxValue) -> AbsorbResult<ExprNode> {
        trace!(kind = %node.kind, "absorb");
        let span = self.span;
        let c = &node.children;
        let expr = match node.kind {
            SyntaxKind::IntLitExpr => {
                self.arity(node, 1)?;
                Expr::IntLit(self.token(&c[0], TokenKind::IntLiteral)?)
            }
            SyntaxKind::StrLitExpr => {
                self.arity(node, 1)?;
                Expr::StrLit(self.token(&c[0], TokenKind::StrLiteral)?)
            }
            SyntaxKind::BoolLitExpr => {
                self.arity(node, 1)?;
                Expr::BoolLit(self.token(&c[0], TokenKind::BoolLiteral)?)
            }
            SyntaxKind::NoneLitExpr => {
                self.arity(node, 0)?;
                Expr::NoneLit(span)
            }
            SyntaxKind::IdentExpr => {
                self.arity(node, 1)?;
                Expr::Ident(self.token(&c[0], TokenKind::Identifier)?)
            }
            SyntaxKind::ArrayLitExpr => {
                self.arity(node, 1)?;
                Expr::ArrayLit {
                    elements: self.exprs(&c[0], SyntaxKind::ElementList)?,
                    span,
                }
            }
            SyntaxKind::InfixOpExpr => {
                self.arity(node, 3)?;
                Expr::Infix {
                    lhs: self.expr(&c[0])?,
                    op: self.operator(&c[1], TokenKind::InfixOperator)?,
                    rhs: self.expr(&c[2])?,
                    span,
                }
            }
            SyntaxKind::PrefixOpExpr => {
                self.arity(node, 2)?;
                Expr::Prefix {
                    op: self.operator(&c[0], TokenKind::PrefixOperator)?,
                    operand: self.expr(&c[1])?,
                    span,
                }
            }
            SyntaxKind::AssignExpr => {
                self.arity(node, 2)?;
                Expr::Assign {
                    target: self.expr(&c[0])?,
                    value: self.expr(&c[1])?,
                    span,
                }
            }
            SyntaxKind::CallExpr => {
                self.arity(node, 2)?;
                Expr::Call {
                    callee: self.expr(&c[0])?,
                    args: self.exprs(&c[1], SyntaxKind::ArgumentList)?,
                    span,
                }
            }
            SyntaxKind::IndexExpr => {
                self.arity(node, 2)?;
                Expr::Index {
                    target: self.expr(&c[0])?,
                    index: self.expr(&c[1])?,
                    span,
                }
            }
            SyntaxKind::FuncExpr => {
                self.arity(node, 3)?;
                Expr::Func {
                    name: self.opt_token(&c[0], TokenKind::Identifier)?,
                    params: self.params(&c[1])?,
                    body: self.block(&c[2])?,
                    span,
                }
            }
            SyntaxKind::QuoteExpr => {
                self.arity(node, 1)?;
                Expr::Quote {
                    block: self.block(&c[0])?,
                    span,
                }
            }
            SyntaxKind::UnquoteExpr => {
                self.arity(node, 1)?;
                Expr::Unquote {
                    expr: self.expr(&c[0])?,
                    span,
                }
            }
            SyntaxKind::DoExpr => {
                self.arity(node, 1)?;
                Expr::Do {
                    stmt: self.stmt(&c[0])?,
                    span,
                }
            }
            other => {
                return Err(self.reporter.internal_error(
                    &format!("{} is not an expression kind", other.name()),
                    span,
                ))
            }
        };
        Ok(Rc::new(expr))
    }

    fn stmt_node(&self, node: &SyntaxValue) -> AbsorbResult<StmtNode> {
        trace!(kind = %node.kind, "absorb");
        let span = self.span;
        let c = &node.children;
        let stmt = match node.kind {
            SyntaxKind::ExprStatement => {
                self.arity(node, 1)?;
                Stmt::Expr {
                    expr: self.expr(&c[0])?,
                    span,
                }
            }
            SyntaxKind::BlockStatement => {
                self.arity(node, 1)?;
                Stmt::Block {
                    block: self.block(&c[0])?,
                    span,
                }
            }
            SyntaxKind::VarDecl => {
                self.arity(node, 2)?;
                Stmt::VarDecl {
                    name: self.token(&c[0], TokenKind::Identifier)?,
                    init: self.opt_expr(&c[1])?,
                    span,
                }
            }
            SyntaxKind::FuncDecl => {
                self.arity(node, 3)?;
                Stmt::FuncDecl {
                    name: self.token(&c[0], TokenKind::Identifier)?,
                    params: self.params(&c[1])?,
                    body: self.block(&c[2])?,
                    span,
                }
            }
            SyntaxKind::MacroDecl => {
                self.arity(node, 3)?;
                Stmt::MacroDecl {
                    name: self.token(&c[0], TokenKind::Identifier)?,
                    params: self.params(&c[1])?,
                    body: self.block(&c[2])?,
                    span,
                }
            }
            SyntaxKind::IfStatement => {
                self.arity(node, 2)?;
                Stmt::If {
                    clauses: self.if_clauses(&c[0])?,
                    else_block: self.opt_block(&c[1])?,
                    span,
                }
            }
            SyntaxKind::WhileStatement => {
                self.arity(node, 2)?;
                Stmt::While {
                    condition: self.expr(&c[0])?,
                    body: self.block(&c[1])?,
                    span,
                }
            }
            SyntaxKind::ForStatement => {
                self.arity(node, 3)?;
                Stmt::For {
                    id: NodeId::fresh(),
                    var: self.token(&c[0], TokenKind::Identifier)?,
                    iterable: self.expr(&c[1])?,
                    body: self.block(&c[2])?,
                    span,
                }
            }
            SyntaxKind::ReturnStatement => {
                self.arity(node, 1)?;
                Stmt::Return {
                    value: self.opt_expr(&c[0])?,
                    span,
                }
            }
            SyntaxKind::LastStatement => {
                self.arity(node, 0)?;
                Stmt::Last { span }
            }
            SyntaxKind::NextStatement => {
                self.arity(node, 0)?;
                Stmt::Next { span }
            }
            other => {
                return Err(self.reporter.internal_error(
                    &format!("{} is not a statement kind", other.name()),
                    span,
                ))
            }
        };
        Ok(Rc::new(stmt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::Payload,
        errors::{ErrorCategory, PhaseContext, SourceContext},
    };

    fn ctx() -> PhaseContext {
        PhaseContext::new(SourceContext::default(), "expand")
    }

    fn syn(kind: SyntaxKind, children: Vec<Value>) -> Value {
        Value::syntax(SyntaxValue::node(kind, children))
    }

    fn ident(name: &str) -> Value {
        Value::syntax(SyntaxValue::token(TokenKind::Identifier, Payload::Str(name.into())))
    }

    #[test]
    fn scalars_become_literals() {
        let span = Span::new(3, 9);
        let expr = expression(&Value::int(4), span, &ctx()).unwrap();
        assert!(matches!(&*expr, Expr::IntLit(t) if t.span == span));
        let expr = expression(&Value::None, span, &ctx()).unwrap();
        assert!(matches!(&*expr, Expr::NoneLit(_)));
        let expr = expression(&Value::Str("hi".into()), span, &ctx()).unwrap();
        assert_eq!(pretty::expr(&expr), "\"hi\"");
    }

    #[test]
    fn statements_in_expression_position_are_wrapped_in_do() {
        let ret = syn(SyntaxKind::ReturnStatement, vec![Value::None]);
        let expr = expression(&ret, Span::default(), &ctx()).unwrap();
        assert!(matches!(&*expr, Expr::Do { stmt, .. } if matches!(&**stmt, Stmt::Return { .. })));

        let block = syn(
            SyntaxKind::Block,
            vec![syn(SyntaxKind::StatementList, vec![])],
        );
        let expr = expression(&block, Span::default(), &ctx()).unwrap();
        assert!(matches!(&*expr, Expr::Do { stmt, .. } if matches!(&**stmt, Stmt::Block { .. })));
    }

    #[test]
    fn expressions_in_statement_position_are_wrapped() {
        let stmt = statement(&syn(SyntaxKind::IdentExpr, vec![ident("x")]), Span::default(), &ctx()).unwrap();
        assert!(matches!(&*stmt, Stmt::Expr { .. }));
    }

    #[test]
    fn misplaced_kinds_are_incompatible() {
        let err = expression(&ident("x"), Span::default(), &ctx()).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::IncompatibleSyntax {
                found: "Identifier".into(),
                position: "expression".into()
            }
        );

        let array = Value::array(vec![]);
        let err = expression(&array, Span::default(), &ctx()).unwrap_err();
        assert_eq!(err.kind.category(), ErrorCategory::Expansion);

        // An integer where an identifier token is required.
        let decl = syn(SyntaxKind::VarDecl, vec![Value::int(1), Value::None]);
        let err = statement(&decl, Span::default(), &ctx()).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::IncompatibleSyntax { .. }));
    }

    #[test]
    fn wrong_child_count_is_internal() {
        let bad = syn(SyntaxKind::CallExpr, vec![syn(SyntaxKind::IdentExpr, vec![ident("f")])]);
        let err = expression(&bad, Span::default(), &ctx()).unwrap_err();
        assert_eq!(err.kind.category(), ErrorCategory::Internal);

        let abstract_node = syn(SyntaxKind::Expression, vec![]);
        let err = expression(&abstract_node, Span::default(), &ctx()).unwrap_err();
        assert_eq!(err.kind.category(), ErrorCategory::Internal);
    }

    #[test]
    fn unknown_operators_are_rejected() {
        let op = Value::syntax(SyntaxValue::token(TokenKind::InfixOperator, Payload::Str("<>".into())));
        let bad = syn(SyntaxKind::InfixOpExpr, vec![Value::int(1), op, Value::int(2)]);
        let err = expression(&bad, Span::default(), &ctx()).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::IncompatibleSyntax { .. }));
    }

    #[test]
    fn absorbed_scopes_get_fresh_ids() {
        let block = syn(
            SyntaxKind::Block,
            vec![syn(SyntaxKind::StatementList, vec![])],
        );
        let a = super::block(&block, Span::default(), &ctx()).unwrap();
        let b = super::block(&block, Span::default(), &ctx()).unwrap();
        assert_ne!(a.id, b.id);
    }
}
