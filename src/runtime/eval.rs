//! # Quill Evaluator
//!
//! Tree-walking evaluator for expanded programs. The same evaluator runs macro
//! bodies during expansion; in that mode a macro call it reaches is expanded
//! and evaluated on the spot, because the static pass has not rewritten the
//! macro's code yet.

use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use tracing::{debug, trace};

use crate::{
    ast::{pretty, Block, CompUnit, Expr, ExprNode, Span, Stmt, StmtNode},
    atoms::{standard_registry, SharedOutput},
    engine::EngineConfig,
    errors::{build_error, ErrorKind, ErrorReporting, QuillError, SourceContext},
    macros::{absorb, reify, ExpansionStep},
    runtime::{Callable, Env, Frame, Value},
};

pub type EvalResult<T = Value> = Result<T, QuillError>;

/// How a statement finished.
#[derive(Debug, Clone)]
pub enum Flow {
    Normal(Value),
    Return(Value, Span),
    Last(Span),
    Next(Span),
}

pub struct Interpreter {
    pub output: SharedOutput,
    pub source: SourceContext,
    globals: Env,
    fuel: Option<u64>,
    fuel_used: u64,
    max_call_depth: usize,
    call_depth: usize,
    pub(crate) max_expansion_depth: usize,
    pub(crate) expansion_depth: usize,
    expansion_mode: bool,
    pub(crate) trace: Vec<ExpansionStep>,
}

impl ErrorReporting for Interpreter {
    fn report(&self, kind: ErrorKind, span: Span) -> QuillError {
        let phase = if self.expansion_mode { "expand" } else { "eval" };
        build_error(&self.source, phase, kind, span)
    }
}

impl Interpreter {
    pub fn new(output: SharedOutput, source: SourceContext, config: &EngineConfig) -> Self {
        let globals = Frame::root();
        standard_registry().install(&globals);
        Self {
            output,
            source,
            globals,
            fuel: config.fuel,
            fuel_used: 0,
            max_call_depth: config.max_call_depth,
            call_depth: 0,
            max_expansion_depth: config.max_expansion_depth,
            expansion_depth: 0,
            expansion_mode: false,
            trace: Vec::new(),
        }
    }

    /// The frame holding the built-in atoms; parent of every program scope.
    pub fn globals(&self) -> &Env {
        &self.globals
    }

    /// Rewrites recorded so far, oldest first.
    pub fn take_trace(&mut self) -> Vec<ExpansionStep> {
        std::mem::take(&mut self.trace)
    }

    // ========================================================================
    // PROGRAMS AND STATEMENTS
    // ========================================================================

    /// Runs a whole (expanded) program. Its value is the value of its last
    /// statement when that is an expression statement, `none` otherwise.
    pub fn run(&mut self, unit: &CompUnit) -> EvalResult {
        let env = Frame::child(&self.globals);
        match self.exec_scope(&unit.statements, &env)? {
            Flow::Normal(value) => Ok(value),
            Flow::Return(_, span) => Err(self.report(ErrorKind::ReturnOutsideRoutine, span)),
            Flow::Last(span) => Err(self.report(ErrorKind::LastOutsideLoop, span)),
            Flow::Next(span) => Err(self.report(ErrorKind::NextOutsideLoop, span)),
        }
    }

    /// Binds this scope's functions and macros, and reserves its variables.
    fn hoist(&self, statements: &[StmtNode], env: &Env) {
        for stmt in statements {
            match &**stmt {
                Stmt::FuncDecl { .. } | Stmt::MacroDecl { .. } => self.bind_routine(stmt, env),
                Stmt::VarDecl { name, .. } => env.define(name.text_value(), Value::Uninit, false),
                _ => {}
            }
        }
    }

    /// Defines a `func` or `macro` declaration's callable in `env`.
    fn bind_routine(&self, stmt: &Stmt, env: &Env) {
        match stmt {
            Stmt::FuncDecl {
                name, params, body, ..
            } => {
                let callable = Callable::new(Some(name.text_value()), params, body, env);
                env.define(name.text_value(), Value::Func(callable), true);
            }
            Stmt::MacroDecl {
                name, params, body, ..
            } => {
                let callable = Callable::new(Some(name.text_value()), params, body, env);
                env.define(name.text_value(), Value::Macro(callable), true);
            }
            _ => {}
        }
    }

    fn exec_scope(&mut self, statements: &[StmtNode], env: &Env) -> EvalResult<Flow> {
        self.hoist(statements, env);
        let mut last = Value::None;
        for stmt in statements {
            match self.exec_stmt(stmt, env)? {
                Flow::Normal(value) => last = value,
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal(last))
    }

    pub fn exec_block(&mut self, block: &Block, env: &Env) -> EvalResult<Flow> {
        let scope = Frame::child(env);
        self.exec_scope(&block.statements, &scope)
    }

    pub fn exec_stmt(&mut self, stmt: &Stmt, env: &Env) -> EvalResult<Flow> {
        match stmt {
            Stmt::Expr { expr, .. } => match &**expr {
                // A statement spliced in by a macro keeps its control flow.
                Expr::Do { stmt, .. } => self.exec_do(stmt, env),
                _ => Ok(Flow::Normal(self.eval(expr, env)?)),
            },
            Stmt::Block { block, .. } => Ok(normal_none(self.exec_block(block, env)?)),
            Stmt::VarDecl { name, init, .. } => {
                let value = match init {
                    Some(init) => self.eval(init, env)?,
                    None => Value::None,
                };
                env.define(name.text_value(), value, false);
                Ok(Flow::Normal(Value::None))
            }
            Stmt::FuncDecl { .. } | Stmt::MacroDecl { .. } => Ok(Flow::Normal(Value::None)),
            Stmt::If {
                clauses,
                else_block,
                ..
            } => {
                for clause in clauses {
                    if self.eval(&clause.condition, env)?.is_truthy() {
                        return Ok(normal_none(self.exec_block(&clause.body, env)?));
                    }
                }
                match else_block {
                    Some(block) => Ok(normal_none(self.exec_block(block, env)?)),
                    None => Ok(Flow::Normal(Value::None)),
                }
            }
            Stmt::While {
                condition,
                body,
                span,
            } => {
                loop {
                    if !self.eval(condition, env)?.is_truthy() {
                        break;
                    }
                    self.tick(*span)?;
                    match self.exec_block(body, env)? {
                        Flow::Normal(_) | Flow::Next(_) => {}
                        Flow::Last(_) => break,
                        flow @ Flow::Return(..) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal(Value::None))
            }
            Stmt::For {
                var,
                iterable,
                body,
                span,
                ..
            } => {
                let items = self.eval(iterable, env)?;
                let mut index = 0;
                while let Some(item) = self.nth_item(&items, index, iterable.span())? {
                    self.tick(*span)?;
                    let scope = Frame::child(env);
                    scope.define(var.text_value(), item, false);
                    match self.exec_block(body, &scope)? {
                        Flow::Normal(_) | Flow::Next(_) => {}
                        Flow::Last(_) => break,
                        flow @ Flow::Return(..) => return Ok(flow),
                    }
                    index += 1;
                }
                Ok(Flow::Normal(Value::None))
            }
            Stmt::Return { value, span } => {
                let value = match value {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::None,
                };
                Ok(Flow::Return(value, *span))
            }
            Stmt::Last { span } => Ok(Flow::Last(*span)),
            Stmt::Next { span } => Ok(Flow::Next(*span)),
        }
    }

    /// Runs the statement wrapped by a `do` expression. A block yields the
    /// value of its last statement, an expression statement its value. A
    /// wrapped declaration is not hoisted, so it is bound here.
    fn exec_do(&mut self, stmt: &Stmt, env: &Env) -> EvalResult<Flow> {
        match stmt {
            Stmt::Block { block, .. } => self.exec_block(block, env),
            Stmt::FuncDecl { .. } | Stmt::MacroDecl { .. } => {
                self.bind_routine(stmt, env);
                Ok(Flow::Normal(Value::None))
            }
            other => self.exec_stmt(other, env),
        }
    }

    /// Reads element `index` of an array (live, so appends during the loop
    /// are seen) or character `index` of a string.
    fn nth_item(&self, items: &Value, index: usize, span: Span) -> EvalResult<Option<Value>> {
        match items {
            Value::Array(cell) => Ok(cell.borrow().get(index).cloned()),
            Value::Str(s) => Ok(s.chars().nth(index).map(|c| Value::Str(c.to_string()))),
            other => Err(self.type_mismatch("for", "array or str", other.type_name(), span)),
        }
    }

    fn tick(&mut self, span: Span) -> EvalResult<()> {
        if self.expansion_mode {
            return Ok(());
        }
        self.fuel_used += 1;
        match self.fuel {
            Some(fuel) if self.fuel_used > fuel => {
                Err(self.report(ErrorKind::OutOfFuel { fuel }, span))
            }
            _ => Ok(()),
        }
    }

    // ========================================================================
    // EXPRESSIONS
    // ========================================================================

    pub fn eval(&mut self, expr: &Expr, env: &Env) -> EvalResult {
        match expr {
            Expr::IntLit(token) | Expr::StrLit(token) | Expr::BoolLit(token) => {
                Ok(Value::from_payload(&token.payload))
            }
            Expr::NoneLit(_) => Ok(Value::None),
            Expr::Ident(token) => self.read_var(token.text_value(), env, token.span),
            Expr::ArrayLit { elements, .. } => {
                let items = self.eval_all(elements, env)?;
                Ok(Value::array(items))
            }
            Expr::Infix { lhs, op, rhs, span } => {
                let op = op.text_value();
                match op {
                    "&&" => {
                        let left = self.eval(lhs, env)?.is_truthy();
                        Ok(Value::Bool(left && self.eval(rhs, env)?.is_truthy()))
                    }
                    "||" => {
                        let left = self.eval(lhs, env)?.is_truthy();
                        Ok(Value::Bool(left || self.eval(rhs, env)?.is_truthy()))
                    }
                    _ => {
                        let left = self.eval(lhs, env)?;
                        let right = self.eval(rhs, env)?;
                        self.binary(op, left, right, *span)
                    }
                }
            }
            Expr::Prefix { op, operand, span } => {
                let value = self.eval(operand, env)?;
                match (op.text_value(), value) {
                    ("!", value) => Ok(Value::Bool(!value.is_truthy())),
                    ("-", Value::Int(n)) => Ok(Value::Int(-n)),
                    (op, other) => Err(self.type_mismatch(op, "int", other.type_name(), *span)),
                }
            }
            Expr::Assign { target, value, .. } => {
                let value = self.eval(value, env)?;
                self.assign(target, value.clone(), env)?;
                Ok(value)
            }
            Expr::Call { callee, args, span } => {
                if self.expansion_mode {
                    if let Some(Value::Macro(mac)) = expr
                        .bare_callee()
                        .and_then(|name| env.lookup(name.text_value()))
                    {
                        return self.expand_inline(&mac, args, env, *span);
                    }
                }
                let callee = self.eval(callee, env)?;
                let args = self.eval_all(args, env)?;
                self.call_value(&callee, args, *span)
            }
            Expr::Index {
                target,
                index,
                span,
            } => {
                let container = self.eval(target, env)?;
                let index = self.eval(index, env)?;
                self.index(&container, &index, *span)
            }
            Expr::Func {
                name, params, body, ..
            } => {
                let Some(name) = name else {
                    return Ok(Value::Func(Callable::new(None, params, body, env)));
                };
                // Named function literals can refer to themselves.
                let scope = Frame::child(env);
                let func = Value::Func(Callable::new(Some(name.text_value()), params, body, &scope));
                scope.define(name.text_value(), func.clone(), true);
                Ok(func)
            }
            Expr::Quote { block, .. } => reify::quote(self, block, env),
            Expr::Unquote { span, .. } => Err(self.report(ErrorKind::UnquoteOutsideQuote, *span)),
            Expr::Do { stmt, .. } => match self.exec_do(stmt, env)? {
                Flow::Normal(value) => Ok(value),
                Flow::Return(_, span) => Err(self.report(ErrorKind::ReturnOutsideRoutine, span)),
                Flow::Last(span) => Err(self.report(ErrorKind::LastOutsideLoop, span)),
                Flow::Next(span) => Err(self.report(ErrorKind::NextOutsideLoop, span)),
            },
        }
    }

    fn eval_all(&mut self, exprs: &[ExprNode], env: &Env) -> EvalResult<Vec<Value>> {
        exprs.iter().map(|e| self.eval(e, env)).collect()
    }

    fn read_var(&self, name: &str, env: &Env, span: Span) -> EvalResult {
        match env.lookup(name) {
            Some(Value::Uninit) => Err(self.report(
                ErrorKind::UseBeforeDeclaration { name: name.into() },
                span,
            )),
            Some(Value::Macro(_)) => Err(self.report(
                ErrorKind::MacroAtRuntime { name: name.into() },
                span,
            )),
            Some(value) => Ok(value),
            None => Err(self.report(ErrorKind::UndeclaredName { name: name.into() }, span)),
        }
    }

    fn assign(&mut self, target: &Expr, value: Value, env: &Env) -> EvalResult<()> {
        match target {
            Expr::Ident(name) => env
                .assign(name.text_value(), value)
                .map_err(|kind| self.report(kind, name.span)),
            Expr::Index {
                target,
                index,
                span,
            } => {
                let container = self.eval(target, env)?;
                let index = self.eval(index, env)?;
                let Value::Array(cell) = &container else {
                    return Err(self.type_mismatch("index assignment", "array", container.type_name(), *span));
                };
                let len = cell.borrow().len();
                let i = self.checked_index(&index, len, *span)?;
                cell.borrow_mut()[i] = value;
                Ok(())
            }
            other => Err(self.type_mismatch(
                "assignment",
                "identifier or index target",
                other.kind().name(),
                other.span(),
            )),
        }
    }

    fn checked_index(&self, index: &Value, len: usize, span: Span) -> EvalResult<usize> {
        let Value::Int(n) = index else {
            return Err(self.type_mismatch("index", "int", index.type_name(), span));
        };
        n.to_usize().filter(|i| *i < len).ok_or_else(|| {
            self.report(
                ErrorKind::IndexOutOfBounds {
                    index: n.to_string(),
                    len,
                },
                span,
            )
        })
    }

    fn index(&self, container: &Value, index: &Value, span: Span) -> EvalResult {
        match container {
            Value::Array(cell) => {
                let items = cell.borrow();
                let i = self.checked_index(index, items.len(), span)?;
                Ok(items[i].clone())
            }
            Value::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                let i = self.checked_index(index, chars.len(), span)?;
                Ok(Value::Str(chars[i].to_string()))
            }
            other => Err(self.type_mismatch("index", "array or str", other.type_name(), span)),
        }
    }

    fn binary(&self, op: &str, left: Value, right: Value, span: Span) -> EvalResult {
        match op {
            "==" => return Ok(Value::Bool(left == right)),
            "!=" => return Ok(Value::Bool(left != right)),
            "~" => return Ok(Value::Str(format!("{left}{right}"))),
            _ => {}
        }
        match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => self.int_op(op, a, b, span),
            (Value::Str(a), Value::Str(b)) if matches!(op, "<" | "<=" | ">" | ">=") => {
                Ok(Value::Bool(compare(op, a.cmp(b))))
            }
            _ => Err(self.type_mismatch(
                op,
                "int operands",
                &format!("{} and {}", left.type_name(), right.type_name()),
                span,
            )),
        }
    }

    fn int_op(&self, op: &str, a: &BigInt, b: &BigInt, span: Span) -> EvalResult {
        let value = match op {
            "+" => Value::Int(a + b),
            "-" => Value::Int(a - b),
            "*" => Value::Int(a * b),
            "/" | "%" if b.is_zero() => {
                return Err(self.report(ErrorKind::DivisionByZero, span));
            }
            // BigInt division truncates toward zero; the remainder takes the
            // sign of the dividend.
            "/" => Value::Int(a / b),
            "%" => Value::Int(a % b),
            "<" | "<=" | ">" | ">=" => Value::Bool(compare(op, a.cmp(b))),
            _ => {
                return Err(self.internal_error(&format!("unknown operator '{op}'"), span));
            }
        };
        Ok(value)
    }

    // ========================================================================
    // CALLS
    // ========================================================================

    pub fn call_value(&mut self, callee: &Value, args: Vec<Value>, span: Span) -> EvalResult {
        match callee {
            Value::Func(func) => self.call_callable(func, args, span),
            Value::Builtin(atom) => (atom.func)(&args, self, span),
            Value::Macro(mac) => Err(self.report(
                ErrorKind::MacroAtRuntime {
                    name: mac.display_name().into(),
                },
                span,
            )),
            other => Err(self.report(
                ErrorKind::NotCallable {
                    type_name: other.type_name().into(),
                },
                span,
            )),
        }
    }

    fn call_callable(&mut self, callable: &Callable, args: Vec<Value>, span: Span) -> EvalResult {
        let expected = callable.params.params.len();
        let actual = args.len();
        let name = callable.display_name().to_string();
        if actual > expected {
            return Err(self.report(ErrorKind::TooManyArguments { name, expected, actual }, span));
        }
        if actual < expected {
            return Err(self.report(ErrorKind::NotEnoughArguments { name, expected, actual }, span));
        }
        if self.call_depth >= self.max_call_depth {
            return Err(self.report(
                ErrorKind::RecursionLimit {
                    limit: self.max_call_depth,
                },
                span,
            ));
        }

        let scope = Frame::child(&callable.env);
        for (param, arg) in callable.params.params.iter().zip(args) {
            scope.define(param.text_value(), arg, false);
        }

        self.call_depth += 1;
        let flow = self.exec_block(&callable.body, &scope);
        self.call_depth -= 1;

        match flow? {
            Flow::Normal(_) => Ok(Value::None),
            Flow::Return(value, _) => Ok(value),
            Flow::Last(span) => Err(self.report(ErrorKind::LastOutsideLoop, span)),
            Flow::Next(span) => Err(self.report(ErrorKind::NextOutsideLoop, span)),
        }
    }

    /// Runs a macro body on reified arguments, exactly like a function call
    /// but in expansion mode.
    pub fn call_macro(&mut self, mac: &Callable, args: Vec<Value>, span: Span) -> EvalResult {
        let was_expanding = std::mem::replace(&mut self.expansion_mode, true);
        trace!(name = mac.display_name(), args = args.len(), "calling macro");
        let result = self.call_callable(mac, args, span);
        self.expansion_mode = was_expanding;
        result
    }

    /// Counts one more active expansion, failing past the configured limit.
    pub(crate) fn enter_expansion(&mut self, span: Span) -> EvalResult<()> {
        self.expansion_depth += 1;
        if self.expansion_depth > self.max_expansion_depth {
            let limit = self.max_expansion_depth;
            self.expansion_depth -= 1;
            return Err(self.report(ErrorKind::ExpansionLimit { limit }, span));
        }
        Ok(())
    }

    /// Reifies the arguments, runs the macro and absorbs its result in
    /// expression position.
    pub(crate) fn expand_call(
        &mut self,
        name: &str,
        mac: &Callable,
        args: &[ExprNode],
        env: &Env,
        span: Span,
    ) -> EvalResult<ExprNode> {
        let values = args
            .iter()
            .map(|arg| reify::reify_expr(self, arg, env, 0))
            .collect::<EvalResult<Vec<_>>>()?;
        let result = self.call_macro(mac, values, span)?;
        let node = absorb::expression(&result, span, &*self)?;
        debug!(name, depth = self.expansion_depth, "expanded macro call");
        self.trace.push(ExpansionStep {
            name: name.to_string(),
            span,
            depth: self.expansion_depth,
            call_site: format!("{}({})", name, args.iter().map(|a| pretty::expr(a)).collect::<Vec<_>>().join(", ")),
            result: pretty::expr(&node),
        });
        Ok(node)
    }

    fn expand_inline(&mut self, mac: &Rc<Callable>, args: &[ExprNode], env: &Env, span: Span) -> EvalResult {
        self.enter_expansion(span)?;
        let result = self
            .expand_call(mac.display_name(), mac, args, env, span)
            .and_then(|node| self.eval(&node, env));
        self.expansion_depth -= 1;
        result
    }
}

fn normal_none(flow: Flow) -> Flow {
    match flow {
        Flow::Normal(_) => Flow::Normal(Value::None),
        other => other,
    }
}

fn compare(op: &str, ordering: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering::*;
    match op {
        "<" => ordering == Less,
        "<=" => ordering != Greater,
        ">" => ordering == Greater,
        _ => ordering != Less,
    }
}
