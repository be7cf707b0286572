//! Static (compile-time) scopes.
//!
//! Every scope-introducing node gets exactly one frame, keyed by its
//! [`NodeId`]. A statement-list frame is pre-populated before any of its
//! statements are visited: functions and macros are bound readonly to their
//! callable values (capturing the frame itself, so they can refer to each
//! other and to themselves), variables are reserved as `Uninit`. Loop
//! variables and parameters are reserved as `Uninit` too.
//!
//! The table is filled eagerly from the parsed program and lazily for nodes
//! that only appear once a macro has been expanded.

use std::collections::HashMap;

use tracing::debug;

use crate::{
    ast::{Block, CompUnit, Expr, NodeId, ParameterList, Stmt, StmtNode, Token},
    errors::{ErrorReporting, QuillError},
    runtime::{Callable, Env, Frame, Value},
};

#[derive(Debug, Default)]
pub struct FrameTable {
    frames: HashMap<NodeId, Env>,
}

impl FrameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: NodeId) -> Option<&Env> {
        self.frames.get(&id)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame of a statement list, built and pre-populated on first request.
    pub fn scope(
        &mut self,
        id: NodeId,
        statements: &[StmtNode],
        parent: &Env,
        reporter: &dyn ErrorReporting,
    ) -> Result<Env, QuillError> {
        if let Some(env) = self.frames.get(&id) {
            return Ok(env.clone());
        }
        let env = Frame::child(parent);
        for stmt in statements {
            match &**stmt {
                Stmt::FuncDecl {
                    name, params, body, ..
                } => {
                    let func = Callable::new(Some(name.text_value()), params, body, &env);
                    declare(&env, name, Value::Func(func), true, reporter)?;
                }
                Stmt::MacroDecl {
                    name, params, body, ..
                } => {
                    let mac = Callable::new(Some(name.text_value()), params, body, &env);
                    declare(&env, name, Value::Macro(mac), true, reporter)?;
                }
                Stmt::VarDecl { name, .. } => declare(&env, name, Value::Uninit, false, reporter)?,
                _ => {}
            }
        }
        debug!(id = id.0, names = ?env.names(), "built scope frame");
        self.frames.insert(id, env.clone());
        Ok(env)
    }

    pub fn block(&mut self, block: &Block, parent: &Env, reporter: &dyn ErrorReporting) -> Result<Env, QuillError> {
        self.scope(block.id, &block.statements, parent, reporter)
    }

    /// Frame holding a `for` loop's variable.
    pub fn loop_var(
        &mut self,
        id: NodeId,
        var: &Token,
        parent: &Env,
        reporter: &dyn ErrorReporting,
    ) -> Result<Env, QuillError> {
        if let Some(env) = self.frames.get(&id) {
            return Ok(env.clone());
        }
        let env = Frame::child(parent);
        declare(&env, var, Value::Uninit, false, reporter)?;
        self.frames.insert(id, env.clone());
        Ok(env)
    }

    /// Frame holding a parameter list. A named function literal also binds
    /// its own name here.
    pub fn params(
        &mut self,
        params: &ParameterList,
        self_name: Option<&Token>,
        parent: &Env,
        reporter: &dyn ErrorReporting,
    ) -> Result<Env, QuillError> {
        if let Some(env) = self.frames.get(&params.id) {
            return Ok(env.clone());
        }
        let env = Frame::child(parent);
        if let Some(name) = self_name {
            declare(&env, name, Value::Uninit, true, reporter)?;
        }
        for param in &params.params {
            declare(&env, param, Value::Uninit, false, reporter)?;
        }
        self.frames.insert(params.id, env.clone());
        Ok(env)
    }
}

fn declare(
    env: &Env,
    name: &Token,
    value: Value,
    readonly: bool,
    reporter: &dyn ErrorReporting,
) -> Result<(), QuillError> {
    env.declare(name.text_value(), value, readonly)
        .map_err(|kind| reporter.report(kind, name.span))
}

/// Builds the frame of every scope in `unit`, outside quoted code.
pub fn build_frames(unit: &CompUnit, root: &Env, reporter: &dyn ErrorReporting) -> Result<FrameTable, QuillError> {
    let mut builder = Builder {
        table: FrameTable::new(),
        reporter,
    };
    let env = builder.table.scope(unit.id, &unit.statements, root, reporter)?;
    builder.statements(&unit.statements, &env)?;
    Ok(builder.table)
}

struct Builder<'r> {
    table: FrameTable,
    reporter: &'r dyn ErrorReporting,
}

impl Builder<'_> {
    fn statements(&mut self, statements: &[StmtNode], env: &Env) -> Result<(), QuillError> {
        statements.iter().try_for_each(|s| self.stmt(s, env))
    }

    fn block(&mut self, block: &Block, parent: &Env) -> Result<(), QuillError> {
        let env = self.table.block(block, parent, self.reporter)?;
        self.statements(&block.statements, &env)
    }

    fn routine(&mut self, name: Option<&Token>, params: &ParameterList, body: &Block, env: &Env) -> Result<(), QuillError> {
        let params_env = self.table.params(params, name, env, self.reporter)?;
        self.block(body, &params_env)
    }

    fn stmt(&mut self, stmt: &Stmt, env: &Env) -> Result<(), QuillError> {
        match stmt {
            Stmt::Expr { expr, .. } => self.expr(expr, env),
            Stmt::Block { block, .. } => self.block(block, env),
            Stmt::VarDecl { init, .. } => match init {
                Some(init) => self.expr(init, env),
                None => Ok(()),
            },
            Stmt::FuncDecl {
                params, body, ..
            }
            | Stmt::MacroDecl {
                params, body, ..
            } => self.routine(None, params, body, env),
            Stmt::If {
                clauses,
                else_block,
                ..
            } => {
                for clause in clauses {
                    self.expr(&clause.condition, env)?;
                    self.block(&clause.body, env)?;
                }
                match else_block {
                    Some(block) => self.block(block, env),
                    None => Ok(()),
                }
            }
            Stmt::While {
                condition, body, ..
            } => {
                self.expr(condition, env)?;
                self.block(body, env)
            }
            Stmt::For {
                id,
                var,
                iterable,
                body,
                ..
            } => {
                self.expr(iterable, env)?;
                let loop_env = self.table.loop_var(*id, var, env, self.reporter)?;
                self.block(body, &loop_env)
            }
            Stmt::Return { value, .. } => match value {
                Some(value) => self.expr(value, env),
                None => Ok(()),
            },
            Stmt::Last { .. } | Stmt::Next { .. } => Ok(()),
        }
    }

    fn expr(&mut self, expr: &Expr, env: &Env) -> Result<(), QuillError> {
        match expr {
            Expr::IntLit(_)
            | Expr::StrLit(_)
            | Expr::BoolLit(_)
            | Expr::NoneLit(_)
            | Expr::Ident(_)
            // Quoted code is data; its scopes are built if it is ever spliced.
            | Expr::Quote { .. }
            | Expr::Unquote { .. } => Ok(()),
            Expr::ArrayLit { elements, .. } => elements.iter().try_for_each(|e| self.expr(e, env)),
            Expr::Infix { lhs, rhs, .. } => {
                self.expr(lhs, env)?;
                self.expr(rhs, env)
            }
            Expr::Prefix { operand, .. } => self.expr(operand, env),
            Expr::Assign { target, value, .. } => {
                self.expr(target, env)?;
                self.expr(value, env)
            }
            Expr::Call { callee, args, .. } => {
                self.expr(callee, env)?;
                args.iter().try_for_each(|a| self.expr(a, env))
            }
            Expr::Index { target, index, .. } => {
                self.expr(target, env)?;
                self.expr(index, env)
            }
            Expr::Func {
                name, params, body, ..
            } => self.routine(name.as_ref(), params, body, env),
            Expr::Do { stmt, .. } => self.stmt(stmt, env),
        }
    }
}
