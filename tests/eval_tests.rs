mod common;

use common::{eval_err, eval_err_with, eval_ok, value_of};
use quill::{engine::EngineConfig, ErrorKind};

#[test]
fn arithmetic_uses_big_integers() {
    assert_eq!(value_of("1 + 2 * 3"), "7");
    assert_eq!(value_of("(1 + 2) * 3"), "9");
    assert_eq!(value_of("-7 / 2"), "-3");
    assert_eq!(value_of("-7 % 2"), "-1");
    assert_eq!(
        value_of("my n = 1; for i in [1, 2, 3, 4] { n = n * 100000000000; } n"),
        "100000000000000000000000000000000000000000000"
    );
}

#[test]
fn division_by_zero_is_an_error() {
    assert_eq!(eval_err("1 / 0"), ErrorKind::DivisionByZero);
    assert_eq!(eval_err("1 % 0"), ErrorKind::DivisionByZero);
}

#[test]
fn truthiness_follows_none_and_false_only() {
    assert_eq!(value_of("if 0 { 1; } my r = 0; if 0 { r = 1; } r"), "1");
    assert_eq!(value_of("my r = 0; if \"\" { r = 1; } r"), "1");
    assert_eq!(value_of("my r = 0; if none { r = 1; } else { r = 2; } r"), "2");
    assert_eq!(value_of("!false && !none"), "true");
    assert_eq!(value_of("false || 3"), "true");
}

#[test]
fn strings_concatenate_and_compare() {
    assert_eq!(value_of("\"a\" ~ 1 ~ none"), "a1none");
    assert_eq!(value_of("\"abc\" < \"abd\""), "true");
    assert_eq!(value_of("len(\"héllo\")"), "5");
    assert_eq!(value_of("\"héllo\"[1]"), "é");
}

#[test]
fn mixed_operands_are_type_errors() {
    assert!(matches!(eval_err("1 + \"a\""), ErrorKind::TypeMismatch { .. }));
    assert!(matches!(eval_err("-\"a\""), ErrorKind::TypeMismatch { .. }));
}

#[test]
fn arrays_are_shared_references() {
    assert_eq!(value_of("my a = [1]; my b = a; push(b, 2); a"), "[1, 2]");
    assert_eq!(value_of("my a = [1, 2]; a[1] = \"x\"; a"), "[1, \"x\"]");
    assert_eq!(value_of("[1, 2] == [1, 2]"), "true");
}

#[test]
fn cyclic_arrays_print_with_an_ellipsis() {
    assert_eq!(value_of("my a = [1]; push(a, a); a"), "[1, [...]]");
}

#[test]
fn index_errors() {
    assert!(matches!(eval_err("[1][1]"), ErrorKind::IndexOutOfBounds { len: 1, .. }));
    assert!(matches!(eval_err("[1][-1]"), ErrorKind::IndexOutOfBounds { .. }));
    assert!(matches!(eval_err("1[0]"), ErrorKind::TypeMismatch { .. }));
}

#[test]
fn loops_support_last_and_next() {
    let src = "my out = []; for i in [1, 2, 3, 4, 5] { if i == 2 { next; } if i == 4 { last; } push(out, i); } out";
    assert_eq!(value_of(src), "[1, 3]");
    let src = "my i = 0; while true { i = i + 1; if i >= 10 { last; } } i";
    assert_eq!(value_of(src), "10");
}

#[test]
fn for_sees_elements_appended_during_the_loop() {
    let src = "my a = [1]; my n = 0; for x in a { n = n + 1; if x < 3 { push(a, x + 1); } } n";
    assert_eq!(value_of(src), "3");
}

#[test]
fn control_flow_outside_its_construct_is_an_error() {
    assert_eq!(eval_err("last;"), ErrorKind::LastOutsideLoop);
    assert_eq!(eval_err("next;"), ErrorKind::NextOutsideLoop);
    assert_eq!(eval_err("return 1;"), ErrorKind::ReturnOutsideRoutine);
    assert_eq!(eval_err("func f() { last; } f()"), ErrorKind::LastOutsideLoop);
}

#[test]
fn functions_are_hoisted_and_close_over_their_scope() {
    assert_eq!(value_of("f(2); func f(x) { return x * 10; }"), "none");
    assert_eq!(value_of("my r = f(2); func f(x) { return x * 10; } r"), "20");
    let src = "func counter() { my n = 0; return func() { n = n + 1; return n; }; }\nmy c = counter(); c(); c(); c()";
    assert_eq!(value_of(src), "3");
}

#[test]
fn named_function_literals_recurse() {
    let src = "my fact = func fact(n) { if n <= 1 { return 1; } return n * fact(n - 1); };\nfact(20)";
    assert_eq!(value_of(src), "2432902008176640000");
}

#[test]
fn do_expressions_yield_their_last_value() {
    assert_eq!(value_of("my x = do { my y = 2; y * 3 }; x"), "6");
    assert_eq!(value_of("do {}"), "none");
}

#[test]
fn calls_check_arity_and_callability() {
    assert!(matches!(
        eval_err("func f(a, b) {} f(1)"),
        ErrorKind::NotEnoughArguments { expected: 2, actual: 1, .. }
    ));
    assert_eq!(
        eval_err("my x = 1; x()"),
        ErrorKind::NotCallable { type_name: "int".into() }
    );
}

#[test]
fn fuel_bounds_runtime_loops() {
    let config = EngineConfig::default().with_fuel(Some(100));
    assert_eq!(
        eval_err_with(config.clone(), "while true {}"),
        ErrorKind::OutOfFuel { fuel: 100 }
    );
    assert_eq!(common::eval_ok_with(config, "my n = 0; for i in [1, 2, 3] { n = n + i; } n").0, "6");
}

#[test]
fn runaway_recursion_hits_the_call_depth_limit() {
    let config = EngineConfig::default().with_max_call_depth(10);
    assert_eq!(
        eval_err_with(config, "func f(n) { return f(n + 1); } f(0)"),
        ErrorKind::RecursionLimit { limit: 10 }
    );
}

#[test]
fn say_writes_space_separated_lines() {
    let (value, output) = eval_ok("say(1, \"two\", [3]); say()");
    assert_eq!(value, "none");
    assert_eq!(output, "1 two [3]\n\n");
}

#[test]
fn names_are_checked_before_running() {
    let (result, output) = quill::engine::ExecutionPipeline::default().evaluate_str("say(1); nope;");
    assert_eq!(
        result.unwrap_err().kind,
        ErrorKind::UndeclaredName { name: "nope".into() }
    );
    assert_eq!(output, "");
}

#[test]
fn unvalidated_programs_fail_when_they_reach_the_name() {
    let config = EngineConfig::default().with_validation(false);
    let (result, output) = quill::engine::ExecutionPipeline::new(config).evaluate_str("say(1); nope;");
    assert_eq!(
        result.unwrap_err().kind,
        ErrorKind::UndeclaredName { name: "nope".into() }
    );
    assert_eq!(output, "1\n");
}

#[test]
fn use_before_declaration_is_reported() {
    assert_eq!(
        eval_err("say(x); my x = 1;"),
        ErrorKind::UseBeforeDeclaration { name: "x".into() }
    );
}
