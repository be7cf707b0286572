//! Reification: syntax tree to runtime value.
//!
//! Every node becomes a [`SyntaxValue`] tagged with its kind; children are
//! reified in order, absent optional children become `none`, and tokens
//! carry their scalar payload. Lists (statements, arguments, parameters,
//! if-clauses) are explicit `...List` nodes.
//!
//! The quote depth says how many quotes enclose the node being reified,
//! counted from the quote being evaluated:
//!
//! - depth 0: plain reification (macro arguments); an unquote is an error.
//! - depth 1: an unquote hole is evaluated now and its value spliced in;
//!   an int, str, bool or none value is spliced as the matching literal.
//! - depth > 1: the hole belongs to an inner quote; it stays an `UnquoteExpr`
//!   whose body is reified one level shallower.

use tracing::trace;

use crate::{
    ast::{Block, CompUnit, Expr, IfClause, ParameterList, Stmt, SyntaxKind, Token, TokenKind},
    errors::{ErrorKind, ErrorReporting},
    runtime::{Env, EvalResult, Interpreter, SyntaxValue, Value},
};

/// Evaluates a quote: reifies its contents at depth 1. One expression
/// statement yields the expression, one other statement yields that
/// statement, anything else yields a `Block`.
pub fn quote(interp: &mut Interpreter, block: &Block, env: &Env) -> EvalResult {
    let mut reifier = Reifier { interp, env };
    let mut items = reifier.statements(&block.statements, 1)?;
    if let [only] = block.statements.as_slice() {
        let item = items.remove(0);
        if let (Stmt::Expr { .. }, Value::Syntax(stmt)) = (&**only, &item) {
            if stmt.kind == SyntaxKind::ExprStatement {
                return Ok(stmt.children.first().cloned().unwrap_or_default());
            }
        }
        return Ok(item);
    }
    Ok(node(
        SyntaxKind::Block,
        vec![node(SyntaxKind::StatementList, items)],
    ))
}

pub fn reify_expr(interp: &mut Interpreter, expr: &Expr, env: &Env, depth: usize) -> EvalResult {
    Reifier { interp, env }.expr(expr, depth)
}

pub fn reify_stmt(interp: &mut Interpreter, stmt: &Stmt, env: &Env, depth: usize) -> EvalResult {
    Reifier { interp, env }.stmt(stmt, depth)
}

pub fn reify_block(interp: &mut Interpreter, block: &Block, env: &Env, depth: usize) -> EvalResult {
    Reifier { interp, env }.block(block, depth)
}

pub fn reify_comp_unit(
    interp: &mut Interpreter,
    unit: &CompUnit,
    env: &Env,
    depth: usize,
) -> EvalResult {
    let mut reifier = Reifier { interp, env };
    let statements = reifier.statements(&unit.statements, depth)?;
    Ok(node(
        SyntaxKind::CompUnit,
        vec![node(SyntaxKind::StatementList, statements)],
    ))
}

fn node(kind: SyntaxKind, children: Vec<Value>) -> Value {
    Value::syntax(SyntaxValue::node(kind, children))
}

fn token(token: &Token) -> Value {
    Value::syntax(SyntaxValue::token(token.kind, token.payload.clone()))
}

/// Lifts a scalar hole value into literal syntax so the reified tree only
/// holds syntax values and `none` placeholders.
fn literal(value: Value) -> Value {
    let (expr_kind, token_kind) = match &value {
        Value::None => return node(SyntaxKind::NoneLitExpr, Vec::new()),
        Value::Int(_) => (SyntaxKind::IntLitExpr, TokenKind::IntLiteral),
        Value::Str(_) => (SyntaxKind::StrLitExpr, TokenKind::StrLiteral),
        Value::Bool(_) => (SyntaxKind::BoolLitExpr, TokenKind::BoolLiteral),
        _ => return value,
    };
    match value.to_payload() {
        Some(payload) => node(expr_kind, vec![Value::syntax(SyntaxValue::token(token_kind, payload))]),
        None => value,
    }
}

fn opt_token(token_opt: Option<&Token>) -> Value {
    token_opt.map(token).unwrap_or_default()
}

fn params(params: &ParameterList) -> Value {
    let items = params
        .params
        .iter()
        .map(|p| node(SyntaxKind::Parameter, vec![token(p)]))
        .collect();
    node(SyntaxKind::ParameterList, items)
}

struct Reifier<'a> {
    interp: &'a mut Interpreter,
    env: &'a Env,
}

impl Reifier<'_> {
    fn statements(&mut self, statements: &[crate::ast::StmtNode], depth: usize) -> EvalResult<Vec<Value>> {
        statements.iter().map(|s| self.stmt(s, depth)).collect()
    }

    fn block(&mut self, block: &Block, depth: usize) -> EvalResult {
        let statements = self.statements(&block.statements, depth)?;
        Ok(node(
            SyntaxKind::Block,
            vec![node(SyntaxKind::StatementList, statements)],
        ))
    }

    fn opt_block(&mut self, block: Option<&Block>, depth: usize) -> EvalResult {
        match block {
            Some(block) => self.block(block, depth),
            None => Ok(Value::None),
        }
    }

    fn opt_expr(&mut self, expr: Option<&Expr>, depth: usize) -> EvalResult {
        match expr {
            Some(expr) => self.expr(expr, depth),
            None => Ok(Value::None),
        }
    }

    fn list(&mut self, kind: SyntaxKind, exprs: &[crate::ast::ExprNode], depth: usize) -> EvalResult {
        let items = exprs
            .iter()
            .map(|e| self.expr(e, depth))
            .collect::<EvalResult<Vec<_>>>()?;
        Ok(node(kind, items))
    }

    fn if_clause(&mut self, clause: &IfClause, depth: usize) -> EvalResult {
        let condition = self.expr(&clause.condition, depth)?;
        let body = self.block(&clause.body, depth)?;
        Ok(node(SyntaxKind::IfClause, vec![condition, body]))
    }

    fn stmt(&mut self, stmt: &Stmt, depth: usize) -> EvalResult {
        let kind = stmt.kind();
        let children = match stmt {
            Stmt::Expr { expr, .. } => vec![self.expr(expr, depth)?],
            Stmt::Block { block, .. } => vec![self.block(block, depth)?],
            Stmt::VarDecl { name, init, .. } => {
                vec![token(name), self.opt_expr(init.as_deref(), depth)?]
            }
            Stmt::FuncDecl {
                name, params: p, body, ..
            }
            | Stmt::MacroDecl {
                name, params: p, body, ..
            } => vec![token(name), params(p), self.block(body, depth)?],
            Stmt::If {
                clauses,
                else_block,
                ..
            } => {
                let clauses = clauses
                    .iter()
                    .map(|c| self.if_clause(c, depth))
                    .collect::<EvalResult<Vec<_>>>()?;
                vec![
                    node(SyntaxKind::IfClauseList, clauses),
                    self.opt_block(else_block.as_ref(), depth)?,
                ]
            }
            Stmt::While {
                condition, body, ..
            } => vec![self.expr(condition, depth)?, self.block(body, depth)?],
            Stmt::For {
                var,
                iterable,
                body,
                ..
            } => vec![
                token(var),
                self.expr(iterable, depth)?,
                self.block(body, depth)?,
            ],
            Stmt::Return { value, .. } => vec![self.opt_expr(value.as_deref(), depth)?],
            Stmt::Last { .. } | Stmt::Next { .. } => Vec::new(),
        };
        Ok(node(kind, children))
    }

    fn expr(&mut self, expr: &Expr, depth: usize) -> EvalResult {
        let kind = expr.kind();
        trace!(%kind, depth, "reify");
        let children = match expr {
            Expr::IntLit(t) | Expr::StrLit(t) | Expr::BoolLit(t) | Expr::Ident(t) => vec![token(t)],
            Expr::NoneLit(_) => Vec::new(),
            Expr::ArrayLit { elements, .. } => {
                vec![self.list(SyntaxKind::ElementList, elements, depth)?]
            }
            Expr::Infix { lhs, op, rhs, .. } => {
                vec![self.expr(lhs, depth)?, token(op), self.expr(rhs, depth)?]
            }
            Expr::Prefix { op, operand, .. } => vec![token(op), self.expr(operand, depth)?],
            Expr::Assign { target, value, .. } => {
                vec![self.expr(target, depth)?, self.expr(value, depth)?]
            }
            Expr::Call { callee, args, .. } => vec![
                self.expr(callee, depth)?,
                self.list(SyntaxKind::ArgumentList, args, depth)?,
            ],
            Expr::Index { target, index, .. } => {
                vec![self.expr(target, depth)?, self.expr(index, depth)?]
            }
            Expr::Func {
                name,
                params: p,
                body,
                ..
            } => vec![opt_token(name.as_ref()), params(p), self.block(body, depth)?],
            Expr::Quote { block, .. } => vec![self.block(block, depth + 1)?],
            Expr::Unquote { expr: inner, span } => match depth {
                0 => return Err(self.interp.report(ErrorKind::UnquoteOutsideQuote, *span)),
                // The hole's body runs as ordinary code; a quote inside it
                // starts counting afresh.
                1 => return self.interp.eval(inner, self.env).map(literal),
                _ => vec![self.expr(inner, depth - 1)?],
            },
            Expr::Do { stmt, .. } => vec![self.stmt(stmt, depth)?],
        };
        Ok(node(kind, children))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        atoms::{OutputSink, SharedOutput},
        engine::EngineConfig,
        errors::SourceContext,
        runtime::Frame,
        syntax::parse_program,
    };

    struct Discard;
    impl OutputSink for Discard {
        fn emit(&mut self, _text: &str) {}
    }

    fn interp() -> Interpreter {
        Interpreter::new(
            SharedOutput::new(Discard),
            SourceContext::default(),
            &EngineConfig::default(),
        )
    }

    fn quoted(src: &str, env: &Env) -> Value {
        let unit = parse_program(src, "test").unwrap();
        let Stmt::Expr { expr, .. } = &*unit.statements[0] else {
            panic!("expected expression");
        };
        let Expr::Quote { block, .. } = &**expr else {
            panic!("expected quote");
        };
        quote(&mut interp(), block, env).unwrap()
    }

    #[test]
    fn quote_selects_its_contents() {
        let env = Frame::root();
        assert_eq!(quoted("code`9`", &env).to_string(), "<syntax IntLitExpr>");
        assert_eq!(quoted("code`1 + 2`", &env).to_string(), "<syntax InfixOpExpr>");
        assert_eq!(quoted("code``", &env).to_string(), "<syntax Block>");
        assert_eq!(quoted("code`return 1`", &env).to_string(), "<syntax ReturnStatement>");
        assert_eq!(quoted("code`1; 2`", &env).to_string(), "<syntax Block>");
    }

    #[test]
    fn holes_are_evaluated_at_depth_one() {
        let env = Frame::root();
        env.define("x", Value::int(5), false);
        let value = quoted("code`${x} + 1`", &env);
        let syntax = value.as_syntax().unwrap();
        let lhs = syntax.children[0].as_syntax().unwrap();
        assert_eq!(lhs.kind, SyntaxKind::IntLitExpr);
        let literal = lhs.children[0].as_syntax().unwrap();
        assert_eq!(literal.payload, Value::int(5).to_payload());
    }

    #[test]
    fn scalar_holes_become_literals() {
        let env = Frame::root();
        env.define("s", Value::Str("hi".into()), false);
        assert_eq!(quoted("code`${s}`", &env).to_string(), "<syntax StrLitExpr>");
        assert_eq!(quoted("code`${true}`", &env).to_string(), "<syntax BoolLitExpr>");
        assert_eq!(quoted("code`${none}`", &env).to_string(), "<syntax NoneLitExpr>");
        let hole = quoted("code`${code`a`}`", &env);
        assert_eq!(hole.as_syntax().unwrap().kind, SyntaxKind::IdentExpr);
    }

    #[test]
    fn nested_holes_are_kept() {
        let env = Frame::root();
        let value = quoted("code`code`${y}``", &env);
        let outer = value.as_syntax().unwrap();
        assert_eq!(outer.kind, SyntaxKind::QuoteExpr);
        // QuoteExpr -> Block -> StatementList -> ExprStatement -> UnquoteExpr
        let block = outer.children[0].as_syntax().unwrap();
        let list = block.children[0].as_syntax().unwrap();
        let stmt = list.children[0].as_syntax().unwrap();
        let hole = stmt.children[0].as_syntax().unwrap();
        assert_eq!(hole.kind, SyntaxKind::UnquoteExpr);
    }

    #[test]
    fn unquote_outside_quote_is_an_error() {
        let unit = parse_program("${13}", "test").unwrap();
        let Stmt::Expr { expr, .. } = &*unit.statements[0] else {
            panic!("expected expression");
        };
        let err = reify_expr(&mut interp(), expr, &Frame::root(), 0).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnquoteOutsideQuote);
    }
}
