//! Quill Parser
//!
//! Converts Quill source text into a typed [`CompUnit`] with source spans.
//! Purely syntactic: names are not resolved and macros are not expanded here.

use std::rc::Rc;

use num_bigint::BigInt;
use once_cell::sync::Lazy;
use pest::{
    error::{Error, InputLocation},
    iterators::{Pair, Pairs},
    pratt_parser::{Assoc, Op, PrattParser},
    Parser,
};
use pest_derive::Parser;
use tracing::debug;

use crate::{
    ast::{
        Block, CompUnit, Expr, ExprNode, IfClause, NodeId, ParameterList, Span, Stmt, StmtNode,
        Token,
    },
    errors::{ErrorKind, ErrorReporting, PhaseContext, QuillError, SourceContext},
};

#[derive(Parser)]
#[grammar = "syntax/grammar.pest"]
struct QuillParser;

static PRATT: Lazy<PrattParser<Rule>> = Lazy::new(|| {
    let left = |rule| Op::infix(rule, Assoc::Left);
    PrattParser::new()
        .op(left(Rule::or))
        .op(left(Rule::and))
        .op(left(Rule::eq) | left(Rule::ne))
        .op(left(Rule::lt) | left(Rule::le) | left(Rule::gt) | left(Rule::ge))
        .op(left(Rule::add) | left(Rule::sub) | left(Rule::concat))
        .op(left(Rule::mul) | left(Rule::div) | left(Rule::rem))
        .op(Op::prefix(Rule::neg) | Op::prefix(Rule::not))
});

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parse a whole program.
pub fn parse(source: &SourceContext) -> Result<CompUnit, QuillError> {
    let builder = AstBuilder {
        ctx: PhaseContext::new(source.clone(), "parse"),
    };
    let text = source.content.as_str();
    let mut pairs =
        QuillParser::parse(Rule::program, text).map_err(|e| builder.convert_parse_error(e))?;

    let span = Span::new(0, text.len());
    let program = builder.expect_next(&mut pairs, "program", span)?;
    let statements = program
        .into_inner()
        .find(|p| p.as_rule() == Rule::statements)
        .map(|p| builder.statements(p))
        .transpose()?
        .unwrap_or_default();

    debug!(statements = statements.len(), "parsed program");
    Ok(CompUnit::new(statements, span))
}

// ============================================================================
// AST BUILDER
// ============================================================================

struct AstBuilder {
    ctx: PhaseContext,
}

type BuildResult<T> = Result<T, QuillError>;

impl AstBuilder {
    fn statements(&self, pair: Pair<Rule>) -> BuildResult<Vec<StmtNode>> {
        pair.into_inner()
            .map(|p| self.statement(p).map(Rc::new))
            .collect()
    }

    fn block(&self, pair: Pair<Rule>) -> BuildResult<Block> {
        let span = span_of(&pair);
        let statements = match pair.into_inner().next() {
            Some(inner) => self.statements(inner)?,
            None => Vec::new(),
        };
        Ok(Block::new(statements, span))
    }

    fn param_list(&self, pair: Pair<Rule>) -> ParameterList {
        let span = span_of(&pair);
        let params = pair.into_inner().map(|p| ident_token(&p)).collect();
        ParameterList::new(params, span)
    }

    fn statement(&self, pair: Pair<Rule>) -> BuildResult<Stmt> {
        let span = span_of(&pair);
        let rule = pair.as_rule();
        let mut inner = pair.into_inner();

        let stmt = match rule {
            Rule::expr_stmt => Stmt::Expr {
                expr: self.expr(self.expect_next(&mut inner, "expression", span)?)?,
                span,
            },
            Rule::block_stmt => Stmt::Block {
                block: self.block(self.expect_next(&mut inner, "block", span)?)?,
                span,
            },
            Rule::var_decl => {
                let name = ident_token(&self.expect_next(&mut inner, "variable name", span)?);
                let init = inner.next().map(|p| self.expr(p)).transpose()?;
                Stmt::VarDecl { name, init, span }
            }
            Rule::func_decl | Rule::macro_decl => {
                let name = ident_token(&self.expect_next(&mut inner, "name", span)?);
                let params = self.param_list(self.expect_next(&mut inner, "parameters", span)?);
                let body = self.block(self.expect_next(&mut inner, "body", span)?)?;
                if rule == Rule::func_decl {
                    Stmt::FuncDecl {
                        name,
                        params,
                        body,
                        span,
                    }
                } else {
                    Stmt::MacroDecl {
                        name,
                        params,
                        body,
                        span,
                    }
                }
            }
            Rule::if_stmt => {
                let mut clauses = Vec::new();
                let mut else_block = None;
                for part in inner {
                    match part.as_rule() {
                        Rule::if_clause => clauses.push(self.if_clause(part)?),
                        _ => else_block = Some(self.block(part)?),
                    }
                }
                Stmt::If {
                    clauses,
                    else_block,
                    span,
                }
            }
            Rule::while_stmt => {
                let condition = self.expr(self.expect_next(&mut inner, "condition", span)?)?;
                let body = self.block(self.expect_next(&mut inner, "body", span)?)?;
                Stmt::While {
                    condition,
                    body,
                    span,
                }
            }
            Rule::for_stmt => {
                let var = ident_token(&self.expect_next(&mut inner, "loop variable", span)?);
                let iterable = self.expr(self.expect_next(&mut inner, "iterable", span)?)?;
                let body = self.block(self.expect_next(&mut inner, "body", span)?)?;
                Stmt::For {
                    id: NodeId::fresh(),
                    var,
                    iterable,
                    body,
                    span,
                }
            }
            Rule::return_stmt => Stmt::Return {
                value: inner.next().map(|p| self.expr(p)).transpose()?,
                span,
            },
            Rule::last_stmt => Stmt::Last { span },
            Rule::next_stmt => Stmt::Next { span },
            other => return Err(self.unexpected(other, span)),
        };
        Ok(stmt)
    }

    fn if_clause(&self, pair: Pair<Rule>) -> BuildResult<IfClause> {
        let span = span_of(&pair);
        let mut inner = pair.into_inner();
        let condition = self.expr(self.expect_next(&mut inner, "condition", span)?)?;
        let body = self.block(self.expect_next(&mut inner, "body", span)?)?;
        Ok(IfClause {
            condition,
            body,
            span,
        })
    }

    fn expr(&self, pair: Pair<Rule>) -> BuildResult<ExprNode> {
        let span = span_of(&pair);
        match pair.as_rule() {
            Rule::expr => {
                let inner = self.expect_next(&mut pair.into_inner(), "expression", span)?;
                self.expr(inner)
            }
            Rule::assignment => {
                let mut inner = pair.into_inner();
                let target = self.postfix(self.expect_next(&mut inner, "target", span)?)?;
                let value = self.expr(self.expect_next(&mut inner, "value", span)?)?;
                Ok(Rc::new(Expr::Assign {
                    target,
                    value,
                    span,
                }))
            }
            Rule::infix_expr => self.infix(pair.into_inner()),
            _ => self.postfix(pair),
        }
    }

    fn infix(&self, pairs: Pairs<Rule>) -> BuildResult<ExprNode> {
        PRATT
            .map_primary(|primary| self.postfix(primary))
            .map_prefix(|op, operand| {
                let operand = operand?;
                let op_span = span_of(&op);
                Ok(Rc::new(Expr::Prefix {
                    op: Token::prefix(op.as_str(), op_span),
                    span: op_span.join(operand.span()),
                    operand,
                }))
            })
            .map_infix(|lhs, op, rhs| {
                let (lhs, rhs) = (lhs?, rhs?);
                Ok(Rc::new(Expr::Infix {
                    op: Token::infix(op.as_str(), span_of(&op)),
                    span: lhs.span().join(rhs.span()),
                    lhs,
                    rhs,
                }))
            })
            .parse(pairs)
    }

    fn postfix(&self, pair: Pair<Rule>) -> BuildResult<ExprNode> {
        if pair.as_rule() != Rule::postfix {
            return self.primary(pair);
        }
        let span = span_of(&pair);
        let mut inner = pair.into_inner();
        let mut node = self.primary(self.expect_next(&mut inner, "operand", span)?)?;
        for op in inner {
            let span = node.span().join(span_of(&op));
            node = match op.as_rule() {
                Rule::call_args => Rc::new(Expr::Call {
                    callee: node,
                    args: self.expr_list(op)?,
                    span,
                }),
                Rule::index => {
                    let index = self.expect_next(&mut op.into_inner(), "index", span)?;
                    Rc::new(Expr::Index {
                        target: node,
                        index: self.expr(index)?,
                        span,
                    })
                }
                other => return Err(self.unexpected(other, span)),
            };
        }
        Ok(node)
    }

    fn primary(&self, pair: Pair<Rule>) -> BuildResult<ExprNode> {
        let span = span_of(&pair);
        let expr = match pair.as_rule() {
            Rule::expr | Rule::postfix => return self.expr(pair),
            Rule::int_lit => {
                let text = pair.as_str();
                let value = text.parse::<BigInt>().map_err(|_| {
                    self.ctx.report(
                        ErrorKind::InvalidLiteral {
                            literal_type: "integer".into(),
                            value: text.into(),
                        },
                        span,
                    )
                })?;
                Expr::IntLit(Token::int(value, span))
            }
            Rule::str_lit => Expr::StrLit(Token::string(unescape_string(pair.as_str()), span)),
            Rule::bool_lit => Expr::BoolLit(Token::boolean(pair.as_str() == "true", span)),
            Rule::none_lit => Expr::NoneLit(span),
            Rule::ident => Expr::Ident(ident_token(&pair)),
            Rule::array_lit => Expr::ArrayLit {
                elements: self.expr_list(pair)?,
                span,
            },
            Rule::func_expr => {
                let mut name = None;
                let mut params = None;
                let mut body = None;
                for part in pair.into_inner() {
                    match part.as_rule() {
                        Rule::ident => name = Some(ident_token(&part)),
                        Rule::param_list => params = Some(self.param_list(part)),
                        _ => body = Some(self.block(part)?),
                    }
                }
                match (params, body) {
                    (Some(params), Some(body)) => Expr::Func {
                        name,
                        params,
                        body,
                        span,
                    },
                    _ => return Err(self.ctx.internal_error("malformed function literal", span)),
                }
            }
            Rule::do_expr => {
                let block = self.block(self.expect_next(&mut pair.into_inner(), "block", span)?)?;
                Expr::Do {
                    stmt: Rc::new(Stmt::Block {
                        span: block.span,
                        block,
                    }),
                    span,
                }
            }
            Rule::quote_expr => {
                let statements = match pair.into_inner().next() {
                    Some(inner) => self.statements(inner)?,
                    None => Vec::new(),
                };
                Expr::Quote {
                    block: Block::new(statements, span),
                    span,
                }
            }
            Rule::unquote_expr => Expr::Unquote {
                expr: self.expr(self.expect_next(&mut pair.into_inner(), "expression", span)?)?,
                span,
            },
            other => return Err(self.unexpected(other, span)),
        };
        Ok(Rc::new(expr))
    }

    fn expr_list(&self, pair: Pair<Rule>) -> BuildResult<Vec<ExprNode>> {
        pair.into_inner().map(|p| self.expr(p)).collect()
    }

    // ------------------------------------------------------------------------
    // Error helpers
    // ------------------------------------------------------------------------

    fn expect_next<'i>(
        &self,
        pairs: &mut Pairs<'i, Rule>,
        element: &str,
        span: Span,
    ) -> BuildResult<Pair<'i, Rule>> {
        pairs
            .next()
            .ok_or_else(|| self.ctx.internal_error(&format!("missing {element}"), span))
    }

    fn unexpected(&self, rule: Rule, span: Span) -> QuillError {
        self.ctx
            .internal_error(&format!("unexpected grammar rule {rule:?}"), span)
    }

    fn convert_parse_error(&self, error: Error<Rule>) -> QuillError {
        let span = match error.location {
            InputLocation::Pos(pos) => Span::new(pos, pos),
            InputLocation::Span((start, end)) => Span::new(start, end),
        };
        let message = error.variant.message().to_string();
        self.ctx.report(ErrorKind::Syntax { message }, span)
    }
}

// ============================================================================
// UTILITIES
// ============================================================================

fn span_of(pair: &Pair<Rule>) -> Span {
    Span::new(pair.as_span().start(), pair.as_span().end())
}

fn ident_token(pair: &Pair<Rule>) -> Token {
    Token::ident(pair.as_str(), span_of(pair))
}

fn unescape_string(text: &str) -> String {
    let inner = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text);
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('\\') => result.push('\\'),
            Some('"') => result.push('"'),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::SyntaxKind;

    fn parse_src(src: &str) -> Result<CompUnit, QuillError> {
        parse(&SourceContext::from_file("test", src))
    }

    fn only_expr(src: &str) -> ExprNode {
        let unit = parse_src(src).unwrap();
        assert_eq!(unit.statements.len(), 1);
        match &*unit.statements[0] {
            Stmt::Expr { expr, .. } => expr.clone(),
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn empty_input() {
        assert!(parse_src("").unwrap().statements.is_empty());
        assert!(parse_src("  # just a comment\n;;").unwrap().statements.is_empty());
    }

    #[test]
    fn precedence_and_associativity() {
        let e = only_expr("1 - 2 - 3 * 4");
        let Expr::Infix { lhs, op, rhs, .. } = &*e else {
            panic!("expected infix");
        };
        assert_eq!(op.text_value(), "-");
        assert_eq!(lhs.kind(), SyntaxKind::InfixOpExpr);
        assert_eq!(rhs.kind(), SyntaxKind::InfixOpExpr);
    }

    #[test]
    fn assignment_is_right_associative() {
        let e = only_expr("a = b = 3");
        let Expr::Assign { value, .. } = &*e else {
            panic!("expected assignment");
        };
        assert_eq!(value.kind(), SyntaxKind::AssignExpr);
        assert_eq!(only_expr("a == b").kind(), SyntaxKind::InfixOpExpr);
    }

    #[test]
    fn keywords_are_not_identifiers() {
        assert_eq!(only_expr("myself").kind(), SyntaxKind::IdentExpr);
        assert_eq!(only_expr("done").kind(), SyntaxKind::IdentExpr);
        assert_eq!(only_expr("none").kind(), SyntaxKind::NoneLitExpr);
        assert!(parse_src("my = 3;").is_err());
    }

    #[test]
    fn semicolons_are_optional_before_closers() {
        let unit = parse_src("macro m(x) { return code`${x} + ${x}`; }; m(2 * 3)").unwrap();
        assert_eq!(unit.statements.len(), 2);
        assert_eq!(unit.statements[0].kind(), SyntaxKind::MacroDecl);
        assert!(parse_src("1 2").is_err());
    }

    #[test]
    fn quotes_nest_and_hold_statements() {
        let e = only_expr("code`my a = 1; code`${a}``");
        let Expr::Quote { block, .. } = &*e else {
            panic!("expected quote");
        };
        assert_eq!(block.statements.len(), 2);
        assert_eq!(only_expr("code``").kind(), SyntaxKind::QuoteExpr);
    }

    #[test]
    fn if_chains_and_loops() {
        let unit = parse_src(
            "if a { 1 } else if b { 2 } else { 3 }\nwhile x { last; }\nfor i in [1, 2,] { next }",
        )
        .unwrap();
        let Stmt::If {
            clauses,
            else_block,
            ..
        } = &*unit.statements[0]
        else {
            panic!("expected if");
        };
        assert_eq!(clauses.len(), 2);
        assert!(else_block.is_some());
        assert_eq!(unit.statements[1].kind(), SyntaxKind::WhileStatement);
        assert_eq!(unit.statements[2].kind(), SyntaxKind::ForStatement);
    }

    #[test]
    fn postfix_chains() {
        let e = only_expr("f(1)(2)[0]");
        assert_eq!(e.kind(), SyntaxKind::IndexExpr);
        assert_eq!(only_expr("func (x) { return x; }(4)").kind(), SyntaxKind::CallExpr);
    }

    #[test]
    fn string_escapes() {
        let e = only_expr(r#""a\tb\"c""#);
        let Expr::StrLit(token) = &*e else {
            panic!("expected string");
        };
        assert_eq!(token.text_value(), "a\tb\"c");
    }

    #[test]
    fn syntax_errors_carry_a_span() {
        let err = parse_src("my x = (1 + ;").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Syntax { .. }));
        assert_eq!(err.diagnostic_info.error_code, "quill::parse::syntax");
    }
}
