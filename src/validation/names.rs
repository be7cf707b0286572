//! Name-use validation.
//!
//! Walks the expanded program with frames declared incrementally, the way
//! the program reads: functions and macros are declared when their scope is
//! entered, variables only when their declaration is reached. Lookups mark
//! every frame they pass through, so a name used and then declared in the
//! same scope is rejected. Names never declared anywhere are reported once
//! the walk is over, after the ordering errors they usually stem from.
//!
//! Quoted code is data and is not checked, except for its unquote holes,
//! which run in the scope around the quote.

use tracing::debug;

use crate::{
    ast::{Block, CompUnit, Expr, ParameterList, Span, Stmt, StmtNode, Token},
    atoms::standard_registry,
    errors::{ErrorKind, ErrorReporting, PhaseContext, SourceContext},
    runtime::{Env, Frame, Value},
    validation::ValidationResult,
};

/// Checks name use in an expanded program.
pub fn validate_names(unit: &CompUnit, source: &SourceContext) -> ValidationResult {
    let globals = Frame::root();
    standard_registry().install(&globals);
    let mut validator = NameValidator {
        ctx: PhaseContext::new(source.clone(), "validate"),
        result: ValidationResult::new(),
        unresolved: Vec::new(),
    };
    validator.scope(&unit.statements, &globals);
    validator.finish()
}

struct NameValidator {
    ctx: PhaseContext,
    result: ValidationResult,
    unresolved: Vec<(String, Span)>,
}

impl NameValidator {
    fn finish(mut self) -> ValidationResult {
        for (name, span) in std::mem::take(&mut self.unresolved) {
            let error = self.ctx.report(ErrorKind::UndeclaredName { name }, span);
            self.result.report(error);
        }
        debug!(errors = self.result.errors.len(), "name validation finished");
        self.result
    }

    fn declare(&mut self, env: &Env, name: &Token, readonly: bool) {
        if let Err(kind) = env.declare(name.text_value(), Value::None, readonly) {
            let error = self.ctx.report(kind, name.span);
            self.result.report(error);
        }
    }

    fn resolve(&mut self, env: &Env, name: &Token) -> Option<bool> {
        let binding = env.binding_marking(name.text_value());
        if binding.is_none() {
            self.unresolved.push((name.text_value().to_string(), name.span));
        }
        binding.map(|b| b.readonly)
    }

    fn scope(&mut self, statements: &[StmtNode], parent: &Env) {
        let env = Frame::child(parent);
        for stmt in statements {
            if let Stmt::FuncDecl { name, .. } | Stmt::MacroDecl { name, .. } = &**stmt {
                self.declare(&env, name, true);
            }
        }
        for stmt in statements {
            self.stmt(stmt, &env);
        }
    }

    fn block(&mut self, block: &Block, parent: &Env) {
        self.scope(&block.statements, parent);
    }

    fn routine(&mut self, name: Option<&Token>, params: &ParameterList, body: &Block, parent: &Env) {
        let env = Frame::child(parent);
        if let Some(name) = name {
            self.declare(&env, name, true);
        }
        for param in &params.params {
            self.declare(&env, param, false);
        }
        self.block(body, &env);
    }

    fn stmt(&mut self, stmt: &Stmt, env: &Env) {
        match stmt {
            Stmt::Expr { expr, .. } => self.expr(expr, env),
            Stmt::Block { block, .. } => self.block(block, env),
            Stmt::VarDecl { name, init, .. } => {
                if let Some(init) = init {
                    self.expr(init, env);
                }
                self.declare(env, name, false);
            }
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
                    self.expr(&clause.condition, env);
                    self.block(&clause.body, env);
                }
                if let Some(block) = else_block {
                    self.block(block, env);
                }
            }
            Stmt::While {
                condition, body, ..
            } => {
                self.expr(condition, env);
                self.block(body, env);
            }
            Stmt::For {
                var,
                iterable,
                body,
                ..
            } => {
                self.expr(iterable, env);
                let loop_env = Frame::child(env);
                self.declare(&loop_env, var, false);
                self.block(body, &loop_env);
            }
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.expr(value, env);
                }
            }
            Stmt::Last { .. } | Stmt::Next { .. } => {}
        }
    }

    fn expr(&mut self, expr: &Expr, env: &Env) {
        match expr {
            Expr::IntLit(_) | Expr::StrLit(_) | Expr::BoolLit(_) | Expr::NoneLit(_) => {}
            Expr::Ident(name) => {
                self.resolve(env, name);
            }
            Expr::ArrayLit { elements, .. } => {
                for element in elements {
                    self.expr(element, env);
                }
            }
            Expr::Infix { lhs, rhs, .. } => {
                self.expr(lhs, env);
                self.expr(rhs, env);
            }
            Expr::Prefix { operand, .. } => self.expr(operand, env),
            Expr::Assign { target, value, .. } => {
                self.expr(value, env);
                match &**target {
                    Expr::Ident(name) => {
                        if self.resolve(env, name) == Some(true) {
                            let error = self.ctx.report(
                                ErrorKind::ReadonlyViolation {
                                    name: name.text_value().into(),
                                },
                                name.span,
                            );
                            self.result.report(error);
                        }
                    }
                    other => self.expr(other, env),
                }
            }
            Expr::Call { callee, args, .. } => {
                self.expr(callee, env);
                for arg in args {
                    self.expr(arg, env);
                }
            }
            Expr::Index { target, index, .. } => {
                self.expr(target, env);
                self.expr(index, env);
            }
            Expr::Func {
                name, params, body, ..
            } => self.routine(name.as_ref(), params, body, env),
            Expr::Quote { block, .. } => HoleScanner { validator: self, env }.block(block, 1),
            Expr::Unquote { expr, .. } => self.expr(expr, env),
            Expr::Do { stmt, .. } => {
                if let Stmt::FuncDecl { name, .. } | Stmt::MacroDecl { name, .. } = &**stmt {
                    self.declare(env, name, true);
                }
                self.stmt(stmt, env);
            }
        }
    }
}

/// Finds the unquote holes of a quote that belong to it (depth 1) and
/// validates their bodies in the scope around the quote.
struct HoleScanner<'v, 'e> {
    validator: &'v mut NameValidator,
    env: &'e Env,
}

impl HoleScanner<'_, '_> {
    fn block(&mut self, block: &Block, depth: usize) {
        for stmt in &block.statements {
            self.stmt(stmt, depth);
        }
    }

    fn stmt(&mut self, stmt: &Stmt, depth: usize) {
        match stmt {
            Stmt::Expr { expr, .. } => self.expr(expr, depth),
            Stmt::Block { block, .. } => self.block(block, depth),
            Stmt::VarDecl { init, .. } => {
                if let Some(init) = init {
                    self.expr(init, depth);
                }
            }
            Stmt::FuncDecl { body, .. } | Stmt::MacroDecl { body, .. } => self.block(body, depth),
            Stmt::If {
                clauses,
                else_block,
                ..
            } => {
                for clause in clauses {
                    self.expr(&clause.condition, depth);
                    self.block(&clause.body, depth);
                }
                if let Some(block) = else_block {
                    self.block(block, depth);
                }
            }
            Stmt::While {
                condition, body, ..
            } => {
                self.expr(condition, depth);
                self.block(body, depth);
            }
            Stmt::For { iterable, body, .. } => {
                self.expr(iterable, depth);
                self.block(body, depth);
            }
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.expr(value, depth);
                }
            }
            Stmt::Last { .. } | Stmt::Next { .. } => {}
        }
    }

    fn expr(&mut self, expr: &Expr, depth: usize) {
        match expr {
            Expr::Unquote { expr, .. } if depth == 1 => self.validator.expr(expr, self.env),
            Expr::Unquote { expr, .. } => self.expr(expr, depth - 1),
            Expr::Quote { block, .. } => self.block(block, depth + 1),
            Expr::IntLit(_) | Expr::StrLit(_) | Expr::BoolLit(_) | Expr::NoneLit(_) | Expr::Ident(_) => {}
            Expr::ArrayLit { elements, .. } => {
                for element in elements {
                    self.expr(element, depth);
                }
            }
            Expr::Infix { lhs, rhs, .. } => {
                self.expr(lhs, depth);
                self.expr(rhs, depth);
            }
            Expr::Prefix { operand, .. } => self.expr(operand, depth),
            Expr::Assign { target, value, .. } => {
                self.expr(target, depth);
                self.expr(value, depth);
            }
            Expr::Call { callee, args, .. } => {
                self.expr(callee, depth);
                for arg in args {
                    self.expr(arg, depth);
                }
            }
            Expr::Index { target, index, .. } => {
                self.expr(target, depth);
                self.expr(index, depth);
            }
            Expr::Func { body, .. } => self.block(body, depth),
            Expr::Do { stmt, .. } => self.stmt(stmt, depth),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_program;

    fn check(src: &str) -> Result<(), ErrorKind> {
        let unit = parse_program(src, "test").unwrap();
        validate_names(&unit, &SourceContext::from_file("test", src))
            .into_result()
            .map_err(|e| e.kind)
    }

    #[test]
    fn functions_are_visible_before_their_declaration() {
        assert_eq!(check("f(); func f() {}"), Ok(()));
    }

    #[test]
    fn variables_are_not() {
        assert_eq!(
            check("x; my x = 1;"),
            Err(ErrorKind::UseBeforeDeclaration { name: "x".into() })
        );
    }

    #[test]
    fn shadowing_after_use_is_rejected() {
        assert_eq!(
            check("my x = 1; { say(x); my x = 2; }"),
            Err(ErrorKind::UseBeforeDeclaration { name: "x".into() })
        );
        assert_eq!(check("my x = 1; { my x = 2; say(x); }"), Ok(()));
    }

    #[test]
    fn outer_variable_declared_after_a_function_that_uses_it() {
        assert_eq!(
            check("func f() { return x; } my x = 1;"),
            Err(ErrorKind::UseBeforeDeclaration { name: "x".into() })
        );
    }

    #[test]
    fn undeclared_and_readonly() {
        assert_eq!(check("y;"), Err(ErrorKind::UndeclaredName { name: "y".into() }));
        assert_eq!(
            check("macro m() {} m = 19;"),
            Err(ErrorKind::ReadonlyViolation { name: "m".into() })
        );
        assert_eq!(
            check("say = 1;"),
            Err(ErrorKind::ReadonlyViolation { name: "say".into() })
        );
    }

    #[test]
    fn redeclaration() {
        assert_eq!(
            check("my a; my a;"),
            Err(ErrorKind::Redeclaration { name: "a".into() })
        );
        assert_eq!(check("my a; { my a; }"), Ok(()));
    }

    #[test]
    fn quotes_are_data_but_holes_are_checked() {
        assert_eq!(check("code`nowhere + 1`;"), Ok(()));
        assert_eq!(
            check("code`${nowhere}`;"),
            Err(ErrorKind::UndeclaredName { name: "nowhere".into() })
        );
        // The inner hole belongs to the inner quote.
        assert_eq!(check("code`code`${nowhere}``;"), Ok(()));
    }

    #[test]
    fn declarations_inside_do_are_declared() {
        let src = "func g() {} g(); g = 1;";
        let mut unit = parse_program(src, "test").unwrap();
        let decl = unit.statements[0].clone();
        let span = decl.span();
        let wrapped = Expr::Do { stmt: decl, span };
        unit.statements[0] = std::rc::Rc::new(Stmt::Expr {
            expr: std::rc::Rc::new(wrapped),
            span,
        });
        let result = validate_names(&unit, &SourceContext::from_file("test", src)).into_result();
        assert_eq!(
            result.map_err(|e| e.kind),
            Err(ErrorKind::ReadonlyViolation { name: "g".into() })
        );
    }

    #[test]
    fn loop_variables_and_parameters_are_scoped() {
        assert_eq!(check("for i in [1] { say(i); }"), Ok(()));
        assert_eq!(
            check("for i in [1] { } i;"),
            Err(ErrorKind::UndeclaredName { name: "i".into() })
        );
        assert_eq!(check("my f = func fact(n) { return fact(n); };"), Ok(()));
    }
}
