use quill::{
    ast::{pretty, Expr, Stmt, SyntaxKind},
    syntax::parse_program,
    ErrorKind,
};

fn reprint(src: &str) -> String {
    pretty::comp_unit(&parse_program(src, "parser_tests").unwrap())
}

fn kinds(src: &str) -> Vec<SyntaxKind> {
    parse_program(src, "parser_tests")
        .unwrap()
        .statements
        .iter()
        .map(|stmt| stmt.kind())
        .collect()
}

#[test]
fn every_statement_form_parses() {
    let src = "my a; my b = 1;\nfunc f() {}\nmacro m() {}\nif a {}\nwhile a {}\nfor x in a {}\n{ }\nreturn;\nlast;\nnext;\na;";
    assert_eq!(
        kinds(src),
        vec![
            SyntaxKind::VarDecl,
            SyntaxKind::VarDecl,
            SyntaxKind::FuncDecl,
            SyntaxKind::MacroDecl,
            SyntaxKind::IfStatement,
            SyntaxKind::WhileStatement,
            SyntaxKind::ForStatement,
            SyntaxKind::BlockStatement,
            SyntaxKind::ReturnStatement,
            SyntaxKind::LastStatement,
            SyntaxKind::NextStatement,
            SyntaxKind::ExprStatement,
        ]
    );
}

#[test]
fn anonymous_functions_are_expressions() {
    let unit = parse_program("func (x) { return x; };", "parser_tests").unwrap();
    let Stmt::Expr { expr, .. } = &*unit.statements[0] else {
        panic!("expected an expression statement");
    };
    assert!(matches!(&**expr, Expr::Func { name: None, .. }));
}

#[test]
fn spans_point_into_the_source() {
    let src = "my x = foo(1);";
    let unit = parse_program(src, "parser_tests").unwrap();
    let Stmt::VarDecl { init: Some(init), .. } = &*unit.statements[0] else {
        panic!("expected a declaration with an initializer");
    };
    let span = init.span();
    assert_eq!(&src[span.start..span.end], "foo(1)");
}

#[test]
fn comments_and_blank_statements_are_ignored() {
    assert_eq!(reprint("# leading\n;;1; # trailing\n;2"), "1;\n2;\n");
}

#[test]
fn printer_output_is_stable() {
    let sources = [
        "my a = [1, 2, 3];\nfor x in a {\n    if x == 2 {\n        next;\n    } else if x > 2 {\n        last;\n    } else {\n        say(x);\n    }\n}\n",
        "macro unless(c, body) {\n    return code`\n        if !${c} {\n            ${body};\n        }\n    `;\n}\n",
        "my f = func named(n) {\n    return n;\n};\n",
        "my d = do {\n    1;\n    2;\n};\nd = a[0] = -(1 + 2) * 3;\n",
        "func () {}();\n",
    ];
    for src in sources {
        let once = reprint(src);
        assert_eq!(once, src);
        assert_eq!(reprint(&once), once);
    }
}

#[test]
fn malformed_programs_are_syntax_errors() {
    for src in ["my = 1;", "if {}", "1 2", "code`1", "${", "[1,,2]", "\"open"] {
        let err = parse_program(src, "parser_tests").unwrap_err();
        assert!(
            matches!(err.kind, ErrorKind::Syntax { .. }),
            "{src:?} gave {:?}",
            err.kind
        );
    }
}
