//! Source printer for syntax trees.
//!
//! Output re-parses to an equivalent tree for everything the parser can
//! produce. Infix operands are parenthesised only where precedence requires.
//! A `DoExpr` around anything but a block statement prints as `do { stmt }`.

use super::{Block, CompUnit, Expr, IfClause, ParameterList, Payload, Stmt, Token};

const INDENT: &str = "    ";

pub fn comp_unit(unit: &CompUnit) -> String {
    let mut printer = Printer::default();
    for stmt in &unit.statements {
        printer.line_stmt(stmt);
    }
    printer.out
}

pub fn stmt(stmt: &Stmt) -> String {
    let mut printer = Printer::default();
    printer.stmt(stmt);
    printer.out
}

pub fn expr(expr: &Expr) -> String {
    let mut printer = Printer::default();
    printer.expr(expr);
    printer.out
}

pub fn token(token: &Token) -> String {
    match &token.payload {
        Payload::Int(n) => n.to_string(),
        Payload::Bool(b) => b.to_string(),
        Payload::Str(s) if token.kind == super::TokenKind::StrLiteral => quote_string(s),
        Payload::Str(s) => s.clone(),
    }
}

/// Renders a string literal with the escapes the lexer understands.
pub fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// Binding power of an infix operator; higher binds tighter.
pub fn precedence(op: &str) -> u8 {
    match op {
        "||" => 1,
        "&&" => 2,
        "==" | "!=" => 3,
        "<" | "<=" | ">" | ">=" => 4,
        "+" | "-" | "~" => 5,
        "*" | "/" | "%" => 6,
        _ => 0,
    }
}

const PREFIX_PRECEDENCE: u8 = 7;

#[derive(Default)]
struct Printer {
    out: String,
    depth: usize,
}

impl Printer {
    fn indent(&mut self) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
    }

    fn line_stmt(&mut self, stmt: &Stmt) {
        self.indent();
        self.stmt(stmt);
        if needs_terminator(stmt) {
            self.out.push(';');
        }
        self.out.push('\n');
    }

    fn block(&mut self, block: &Block) {
        if block.statements.is_empty() {
            self.out.push_str("{}");
            return;
        }
        self.out.push_str("{\n");
        self.depth += 1;
        for stmt in &block.statements {
            self.line_stmt(stmt);
        }
        self.depth -= 1;
        self.indent();
        self.out.push('}');
    }

    fn params(&mut self, params: &ParameterList) {
        self.out.push('(');
        let names: Vec<_> = params.params.iter().map(Token::text_value).collect();
        self.out.push_str(&names.join(", "));
        self.out.push(')');
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr { expr, .. } => {
                if matches!(**expr, Expr::Func { .. }) {
                    self.out.push('(');
                    self.expr(expr);
                    self.out.push(')');
                } else {
                    self.expr(expr);
                }
            }
            Stmt::Block { block, .. } => self.block(block),
            Stmt::VarDecl { name, init, .. } => {
                self.out.push_str("my ");
                self.out.push_str(name.text_value());
                if let Some(init) = init {
                    self.out.push_str(" = ");
                    self.expr(init);
                }
            }
            Stmt::FuncDecl {
                name, params, body, ..
            } => self.routine("func ", name, params, body),
            Stmt::MacroDecl {
                name, params, body, ..
            } => self.routine("macro ", name, params, body),
            Stmt::If {
                clauses,
                else_block,
                ..
            } => {
                for (i, IfClause { condition, body, .. }) in clauses.iter().enumerate() {
                    self.out.push_str(if i == 0 { "if " } else { " else if " });
                    self.expr(condition);
                    self.out.push(' ');
                    self.block(body);
                }
                if let Some(block) = else_block {
                    self.out.push_str(" else ");
                    self.block(block);
                }
            }
            Stmt::While {
                condition, body, ..
            } => {
                self.out.push_str("while ");
                self.expr(condition);
                self.out.push(' ');
                self.block(body);
            }
            Stmt::For {
                var,
                iterable,
                body,
                ..
            } => {
                self.out.push_str("for ");
                self.out.push_str(var.text_value());
                self.out.push_str(" in ");
                self.expr(iterable);
                self.out.push(' ');
                self.block(body);
            }
            Stmt::Return { value, .. } => {
                self.out.push_str("return");
                if let Some(value) = value {
                    self.out.push(' ');
                    self.expr(value);
                }
            }
            Stmt::Last { .. } => self.out.push_str("last"),
            Stmt::Next { .. } => self.out.push_str("next"),
        }
    }

    fn routine(&mut self, keyword: &str, name: &Token, params: &ParameterList, body: &Block) {
        self.out.push_str(keyword);
        self.out.push_str(name.text_value());
        self.params(params);
        self.out.push(' ');
        self.block(body);
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::IntLit(tok) | Expr::StrLit(tok) | Expr::BoolLit(tok) | Expr::Ident(tok) => {
                self.out.push_str(&token(tok))
            }
            Expr::NoneLit(_) => self.out.push_str("none"),
            Expr::ArrayLit { elements, .. } => {
                self.out.push('[');
                self.comma_list(elements);
                self.out.push(']');
            }
            Expr::Infix { lhs, op, rhs, .. } => {
                let prec = precedence(op.text_value());
                self.operand(lhs, prec, false);
                self.out.push(' ');
                self.out.push_str(op.text_value());
                self.out.push(' ');
                self.operand(rhs, prec, true);
            }
            Expr::Prefix { op, operand, .. } => {
                self.out.push_str(op.text_value());
                self.operand(operand, PREFIX_PRECEDENCE, true);
            }
            Expr::Assign { target, value, .. } => {
                self.postfix_base(target);
                self.out.push_str(" = ");
                self.expr(value);
            }
            Expr::Call { callee, args, .. } => {
                self.postfix_base(callee);
                self.out.push('(');
                self.comma_list(args);
                self.out.push(')');
            }
            Expr::Index { target, index, .. } => {
                self.postfix_base(target);
                self.out.push('[');
                self.expr(index);
                self.out.push(']');
            }
            Expr::Func {
                name, params, body, ..
            } => {
                self.out.push_str("func ");
                if let Some(name) = name {
                    self.out.push_str(name.text_value());
                }
                self.params(params);
                self.out.push(' ');
                self.block(body);
            }
            Expr::Quote { block, .. } => self.quote(block),
            Expr::Unquote { expr, .. } => {
                self.out.push_str("${");
                self.expr(expr);
                self.out.push('}');
            }
            Expr::Do { stmt, .. } => {
                self.out.push_str("do ");
                match &**stmt {
                    Stmt::Block { block, .. } => self.block(block),
                    other => {
                        self.out.push_str("{ ");
                        self.stmt(other);
                        if needs_terminator(other) {
                            self.out.push(';');
                        }
                        self.out.push_str(" }");
                    }
                }
            }
        }
    }

    fn quote(&mut self, block: &Block) {
        self.out.push_str("code`");
        let inline = block.statements.iter().all(|s| needs_terminator(s));
        if inline {
            let parts: Vec<_> = block.statements.iter().map(|s| stmt(s)).collect();
            self.out.push_str(&parts.join("; "));
        } else {
            self.out.push('\n');
            self.depth += 1;
            for stmt in &block.statements {
                self.line_stmt(stmt);
            }
            self.depth -= 1;
            self.indent();
        }
        self.out.push('`');
    }

    fn comma_list(&mut self, exprs: &[super::ExprNode]) {
        for (i, e) in exprs.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.expr(e);
        }
    }

    fn operand(&mut self, expr: &Expr, parent: u8, right: bool) {
        let own = match expr {
            Expr::Infix { op, .. } => precedence(op.text_value()),
            Expr::Prefix { .. } => PREFIX_PRECEDENCE,
            Expr::Assign { .. } => 0,
            _ => u8::MAX,
        };
        if own < parent || (right && own == parent) {
            self.out.push('(');
            self.expr(expr);
            self.out.push(')');
        } else {
            self.expr(expr);
        }
    }

    fn postfix_base(&mut self, expr: &Expr) {
        self.operand(expr, PREFIX_PRECEDENCE + 1, false);
    }
}

fn needs_terminator(stmt: &Stmt) -> bool {
    !matches!(
        stmt,
        Stmt::Block { .. }
            | Stmt::FuncDecl { .. }
            | Stmt::MacroDecl { .. }
            | Stmt::If { .. }
            | Stmt::While { .. }
            | Stmt::For { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_program;

    fn reprint(src: &str) -> String {
        comp_unit(&parse_program(src, "test").unwrap())
    }

    #[test]
    fn minimal_parentheses() {
        assert_eq!(reprint("1 + 2 * 3"), "1 + 2 * 3;\n");
        assert_eq!(reprint("(1 + 2) * 3"), "(1 + 2) * 3;\n");
        assert_eq!(reprint("1 - (2 - 3)"), "1 - (2 - 3);\n");
        assert_eq!(reprint("-(1 + 2)"), "-(1 + 2);\n");
    }

    #[test]
    fn quotes_print_inline_when_simple() {
        assert_eq!(reprint("code`${x} + 1`"), "code`${x} + 1`;\n");
        assert_eq!(reprint("code``"), "code``;\n");
    }

    #[test]
    fn blocks_are_indented() {
        let printed = reprint("func f(a, b) { if a { return b; } }");
        assert_eq!(
            printed,
            "func f(a, b) {\n    if a {\n        return b;\n    }\n}\n"
        );
    }

    #[test]
    fn strings_are_escaped() {
        assert_eq!(reprint(r#"say("a\n\"b\"")"#), "say(\"a\\n\\\"b\\\"\");\n");
    }

    #[test]
    fn printed_source_reparses_to_the_same_text() {
        let src = "my a = [1, \"two\", none];\nwhile a[0] < 3 {\n    a[0] = a[0] + 1;\n}\nfor x in a {\n    next;\n}\n";
        let once = reprint(src);
        assert_eq!(once, src);
        assert_eq!(reprint(&once), once);
    }
}
