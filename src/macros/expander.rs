//! The expansion traversal.
//!
//! Depth-first and left to right. Every expression slot is tested for a call
//! whose callee is a bare name bound to a macro in the enclosing static
//! frame; such a call is rewritten, and the replacement is tested again at
//! the same slot until it is no longer a macro call. Only then does the walk
//! descend into it. Quoted code is never entered.
//!
//! Visitors return `None` when nothing below them changed, so untouched
//! subtrees are shared with the input. Rebuilt scope nodes keep their
//! [`NodeId`](crate::ast::NodeId), which keeps the frame table valid.

use std::rc::Rc;

use crate::{
    ast::{Block, CompUnit, Expr, ExprNode, IfClause, ParameterList, Stmt, StmtNode, Token},
    errors::{PhaseContext, QuillError},
    macros::scope::FrameTable,
    runtime::{Env, Interpreter, Value},
};

type Visit<T> = Result<Option<T>, QuillError>;

pub struct Expander<'a> {
    interp: &'a mut Interpreter,
    table: &'a mut FrameTable,
    ctx: PhaseContext,
    frames: Vec<Env>,
}

/// The new value if there is one, otherwise a clone of the old.
fn pick<T: Clone>(new: Option<T>, old: &T) -> T {
    new.unwrap_or_else(|| old.clone())
}

impl<'a> Expander<'a> {
    pub fn new(interp: &'a mut Interpreter, table: &'a mut FrameTable) -> Self {
        let ctx = PhaseContext::new(interp.source.clone(), "expand");
        Self {
            interp,
            table,
            ctx,
            frames: Vec::new(),
        }
    }

    /// Expands a whole program; `None` if it contains no macro calls.
    pub fn comp_unit(&mut self, unit: &CompUnit) -> Visit<CompUnit> {
        let root = self.interp.globals().clone();
        let env = self.table.scope(unit.id, &unit.statements, &root, &self.ctx)?;
        self.frames.push(env);
        let statements = self.each(&unit.statements, Self::stmt);
        self.frames.pop();
        Ok(statements?.map(|statements| CompUnit {
            id: unit.id,
            statements,
            span: unit.span,
        }))
    }

    fn frame(&self) -> &Env {
        self.frames.last().unwrap_or_else(|| self.interp.globals())
    }

    /// Visits every item, collecting a new list only once something changed.
    fn each<T: Clone>(&mut self, items: &[T], mut visit: impl FnMut(&mut Self, &T) -> Visit<T>) -> Visit<Vec<T>> {
        let mut out: Option<Vec<T>> = None;
        for (i, item) in items.iter().enumerate() {
            if let Some(new) = visit(self, item)? {
                out.get_or_insert_with(|| items[..i].to_vec()).push(new);
            } else if let Some(out) = out.as_mut() {
                out.push(item.clone());
            }
        }
        Ok(out)
    }

    // ========================================================================
    // SCOPES
    // ========================================================================

    fn block(&mut self, block: &Block) -> Visit<Block> {
        let parent = self.frame().clone();
        let env = self.table.block(block, &parent, &self.ctx)?;
        self.frames.push(env);
        let statements = self.each(&block.statements, Self::stmt);
        self.frames.pop();
        Ok(statements?.map(|statements| Block {
            id: block.id,
            statements,
            span: block.span,
        }))
    }

    fn opt_block(&mut self, block: Option<&Block>) -> Visit<Option<Block>> {
        match block {
            Some(block) => Ok(self.block(block)?.map(Some)),
            None => Ok(None),
        }
    }

    /// Body of a function or macro, inside its parameter frame.
    fn routine(&mut self, name: Option<&Token>, params: &ParameterList, body: &Block) -> Visit<Block> {
        let parent = self.frame().clone();
        let env = self.table.params(params, name, &parent, &self.ctx)?;
        self.frames.push(env);
        let body = self.block(body);
        self.frames.pop();
        body
    }

    // ========================================================================
    // STATEMENTS
    // ========================================================================

    fn stmt(&mut self, stmt: &StmtNode) -> Visit<StmtNode> {
        let new = match &**stmt {
            Stmt::Expr { expr, span } => self.slot(expr)?.map(|expr| Stmt::Expr { expr, span: *span }),
            Stmt::Block { block, span } => self.block(block)?.map(|block| Stmt::Block { block, span: *span }),
            Stmt::VarDecl { name, init, span } => self.opt_slot(init.as_ref())?.map(|init| Stmt::VarDecl {
                name: name.clone(),
                init,
                span: *span,
            }),
            Stmt::FuncDecl {
                name,
                params,
                body,
                span,
            } => self.routine(None, params, body)?.map(|body| Stmt::FuncDecl {
                name: name.clone(),
                params: params.clone(),
                body,
                span: *span,
            }),
            Stmt::MacroDecl {
                name,
                params,
                body,
                span,
            } => self.routine(None, params, body)?.map(|body| Stmt::MacroDecl {
                name: name.clone(),
                params: params.clone(),
                body,
                span: *span,
            }),
            Stmt::If {
                clauses,
                else_block,
                span,
            } => {
                let new_clauses = self.each(clauses, Self::if_clause)?;
                let new_else = self.opt_block(else_block.as_ref())?;
                if new_clauses.is_none() && new_else.is_none() {
                    None
                } else {
                    Some(Stmt::If {
                        clauses: pick(new_clauses, clauses),
                        else_block: pick(new_else, else_block),
                        span: *span,
                    })
                }
            }
            Stmt::While {
                condition,
                body,
                span,
            } => {
                let new_condition = self.slot(condition)?;
                let new_body = self.block(body)?;
                if new_condition.is_none() && new_body.is_none() {
                    None
                } else {
                    Some(Stmt::While {
                        condition: pick(new_condition, condition),
                        body: pick(new_body, body),
                        span: *span,
                    })
                }
            }
            Stmt::For {
                id,
                var,
                iterable,
                body,
                span,
            } => {
                let new_iterable = self.slot(iterable)?;
                let parent = self.frame().clone();
                let env = self.table.loop_var(*id, var, &parent, &self.ctx)?;
                self.frames.push(env);
                let new_body = self.block(body);
                self.frames.pop();
                let new_body = new_body?;
                if new_iterable.is_none() && new_body.is_none() {
                    None
                } else {
                    Some(Stmt::For {
                        id: *id,
                        var: var.clone(),
                        iterable: pick(new_iterable, iterable),
                        body: pick(new_body, body),
                        span: *span,
                    })
                }
            }
            Stmt::Return { value, span } => self.opt_slot(value.as_ref())?.map(|value| Stmt::Return {
                value,
                span: *span,
            }),
            Stmt::Last { .. } | Stmt::Next { .. } => None,
        };
        Ok(new.map(Rc::new))
    }

    fn if_clause(&mut self, clause: &IfClause) -> Visit<IfClause> {
        let condition = self.slot(&clause.condition)?;
        let body = self.block(&clause.body)?;
        if condition.is_none() && body.is_none() {
            return Ok(None);
        }
        Ok(Some(IfClause {
            condition: pick(condition, &clause.condition),
            body: pick(body, &clause.body),
            span: clause.span,
        }))
    }

    // ========================================================================
    // EXPRESSIONS
    // ========================================================================

    /// An expression position: rewrites macro calls here to a fixed point,
    /// then descends into whatever is left.
    fn slot(&mut self, expr: &ExprNode) -> Visit<ExprNode> {
        let base = self.interp.expansion_depth;
        let result = self.rewrite_slot(expr);
        self.interp.expansion_depth = base;
        result
    }

    fn rewrite_slot(&mut self, expr: &ExprNode) -> Visit<ExprNode> {
        let mut current = expr.clone();
        let mut rewritten = false;
        loop {
            let Some(name) = current.bare_callee().map(|t| t.text_value().to_string()) else {
                break;
            };
            let Some(Value::Macro(mac)) = self.frame().lookup(&name) else {
                break;
            };
            let Expr::Call { args, span, .. } = &*current else {
                break;
            };
            let (args, span) = (args.clone(), *span);
            let env = self.frame().clone();
            self.interp.enter_expansion(span)?;
            current = self.interp.expand_call(&name, &mac, &args, &env, span)?;
            rewritten = true;
        }
        match self.expr(&current)? {
            Some(descended) => Ok(Some(descended)),
            None if rewritten => Ok(Some(current)),
            None => Ok(None),
        }
    }

    /// An optional expression position. The outer `Option` is the change
    /// signal, the inner one the slot's content.
    fn opt_slot(&mut self, expr: Option<&ExprNode>) -> Visit<Option<ExprNode>> {
        match expr {
            Some(expr) => Ok(self.slot(expr)?.map(Some)),
            None => Ok(None),
        }
    }

    fn slots(&mut self, exprs: &[ExprNode]) -> Visit<Vec<ExprNode>> {
        self.each(exprs, Self::slot)
    }

    /// Descends into the children of an expression without testing the
    /// expression itself.
    fn expr(&mut self, expr: &ExprNode) -> Visit<ExprNode> {
        let new = match &**expr {
            Expr::IntLit(_)
            | Expr::StrLit(_)
            | Expr::BoolLit(_)
            | Expr::NoneLit(_)
            | Expr::Ident(_)
            | Expr::Quote { .. } => None,
            Expr::ArrayLit { elements, span } => self.slots(elements)?.map(|elements| Expr::ArrayLit {
                elements,
                span: *span,
            }),
            Expr::Infix { lhs, op, rhs, span } => {
                let new_lhs = self.slot(lhs)?;
                let new_rhs = self.slot(rhs)?;
                if new_lhs.is_none() && new_rhs.is_none() {
                    None
                } else {
                    Some(Expr::Infix {
                        lhs: pick(new_lhs, lhs),
                        op: op.clone(),
                        rhs: pick(new_rhs, rhs),
                        span: *span,
                    })
                }
            }
            Expr::Prefix { op, operand, span } => self.slot(operand)?.map(|operand| Expr::Prefix {
                op: op.clone(),
                operand,
                span: *span,
            }),
            Expr::Assign {
                target,
                value,
                span,
            } => {
                let new_target = self.slot(target)?;
                let new_value = self.slot(value)?;
                if new_target.is_none() && new_value.is_none() {
                    None
                } else {
                    Some(Expr::Assign {
                        target: pick(new_target, target),
                        value: pick(new_value, value),
                        span: *span,
                    })
                }
            }
            Expr::Call { callee, args, span } => {
                let new_callee = self.slot(callee)?;
                let new_args = self.slots(args)?;
                if new_callee.is_none() && new_args.is_none() {
                    None
                } else {
                    Some(Expr::Call {
                        callee: pick(new_callee, callee),
                        args: pick(new_args, args),
                        span: *span,
                    })
                }
            }
            Expr::Index {
                target,
                index,
                span,
            } => {
                let new_target = self.slot(target)?;
                let new_index = self.slot(index)?;
                if new_target.is_none() && new_index.is_none() {
                    None
                } else {
                    Some(Expr::Index {
                        target: pick(new_target, target),
                        index: pick(new_index, index),
                        span: *span,
                    })
                }
            }
            Expr::Func {
                name,
                params,
                body,
                span,
            } => self.routine(name.as_ref(), params, body)?.map(|body| Expr::Func {
                name: name.clone(),
                params: params.clone(),
                body,
                span: *span,
            }),
            Expr::Unquote { expr: inner, span } => self.slot(inner)?.map(|inner| Expr::Unquote {
                expr: inner,
                span: *span,
            }),
            Expr::Do { stmt, span } => self.stmt(stmt)?.map(|stmt| Expr::Do { stmt, span: *span }),
        };
        Ok(new.map(Rc::new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::pretty,
        atoms::{OutputSink, SharedOutput},
        engine::EngineConfig,
        errors::SourceContext,
        macros::scope::build_frames,
        syntax::parse_program,
    };

    struct Discard;
    impl OutputSink for Discard {
        fn emit(&mut self, _text: &str) {}
    }

    fn expand(src: &str) -> (CompUnit, Option<CompUnit>) {
        let unit = parse_program(src, "test").unwrap();
        let mut interp = Interpreter::new(
            SharedOutput::new(Discard),
            SourceContext::from_file("test", src),
            &EngineConfig::default(),
        );
        let ctx = PhaseContext::new(interp.source.clone(), "scope");
        let root = interp.globals().clone();
        let mut table = build_frames(&unit, &root, &ctx).unwrap();
        let expanded = Expander::new(&mut interp, &mut table).comp_unit(&unit).unwrap();
        (unit, expanded)
    }

    #[test]
    fn programs_without_macro_calls_are_unchanged() {
        let (_, expanded) = expand("my x = 1; func f(a) { return a + x; } f(2);");
        assert!(expanded.is_none());
    }

    #[test]
    fn untouched_siblings_are_shared() {
        let (unit, expanded) = expand("macro one() { return code`1`; } my a = [2]; one();");
        let expanded = expanded.unwrap();
        assert_eq!(expanded.id, unit.id);
        assert!(Rc::ptr_eq(&unit.statements[1], &expanded.statements[1]));
        assert!(!Rc::ptr_eq(&unit.statements[2], &expanded.statements[2]));
        assert_eq!(pretty::stmt(&expanded.statements[2]), "1;");
    }

    #[test]
    fn quoted_calls_are_left_alone() {
        let (_, expanded) = expand("macro one() { return 1; } code`one()`;");
        assert!(expanded.is_none());
    }

    #[test]
    fn block_ids_survive_rebuilding() {
        let (unit, expanded) = expand("macro one() { return 1; } { one(); }");
        let expanded = expanded.unwrap();
        let (Stmt::Block { block: old, .. }, Stmt::Block { block: new, .. }) =
            (&*unit.statements[1], &*expanded.statements[1])
        else {
            panic!("expected block statements");
        };
        assert_eq!(old.id, new.id);
    }
}
