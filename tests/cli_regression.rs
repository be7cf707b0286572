// Regression tests for the `quill` binary. Errors must be rendered with
// miette diagnostics and a non-zero exit status.

use std::{fs, path::PathBuf};

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};

/// Writes `content` to a per-test file under the system temp directory.
fn script(name: &str, content: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("quill_cli_{}_{name}.ql", std::process::id()));
    fs::write(&path, content).unwrap();
    path
}

fn quill() -> Command {
    Command::cargo_bin("quill").unwrap()
}

const MACRO_SCRIPT: &str = "macro one() { return code`1`; }\nsay(one() + 1);\n";

#[test]
fn cli_reports_miette_diagnostics_on_error() {
    let bad_file = script("bad", "my x = (1 + ;");
    quill()
        .arg("run")
        .arg(&bad_file)
        .assert()
        .failure()
        .stderr(contains("quill::parse").or(contains("help:")));
    let _ = fs::remove_file(bad_file);
}

#[test]
fn run_prints_output_and_final_value() {
    let file = script("run", "say(\"hello\");\n6 * 7\n");
    quill()
        .arg("run")
        .arg(&file)
        .assert()
        .success()
        .stdout("hello\n42\n");
    let _ = fs::remove_file(file);
}

#[test]
fn eval_prints_the_value() {
    quill()
        .args(["eval", "macro m(x) { return code`${x} + ${x}`; }; m(2 * 3)"])
        .assert()
        .success()
        .stdout("12\n");
}

#[test]
fn runtime_errors_name_their_phase() {
    quill()
        .args(["eval", "1 / 0"])
        .assert()
        .failure()
        .stderr(contains("quill::eval::division_by_zero"));
    quill()
        .args(["eval", "${1}"])
        .assert()
        .failure()
        .stderr(contains("unquote"));
}

#[test]
fn fuel_flag_bounds_loops() {
    quill()
        .args(["--fuel", "5", "eval", "while true {}"])
        .assert()
        .failure()
        .stderr(contains("out of fuel"));
}

#[test]
fn macroexpand_prints_the_expanded_program() {
    let file = script("expand", MACRO_SCRIPT);
    quill()
        .arg("macroexpand")
        .arg(&file)
        .assert()
        .success()
        .stdout(contains("say(1 + 1);"));
    let _ = fs::remove_file(file);
}

#[test]
fn macrotrace_json_lists_each_step() {
    let file = script("trace", MACRO_SCRIPT);
    quill()
        .args(["macrotrace", "--json"])
        .arg(&file)
        .assert()
        .success()
        .stdout(contains("\"name\": \"one\"").and(contains("\"call_site\": \"one()\"")));
    let _ = fs::remove_file(file);
}

#[test]
fn validate_reports_ok_or_the_first_error() {
    let good = script("valid", MACRO_SCRIPT);
    quill()
        .arg("validate")
        .arg(&good)
        .assert()
        .success()
        .stdout(contains(": ok"));
    let bad = script("invalid", "say(missing);\n");
    quill()
        .arg("validate")
        .arg(&bad)
        .assert()
        .failure()
        .stderr(contains("missing"));
    let _ = fs::remove_file(good);
    let _ = fs::remove_file(bad);
}

#[test]
fn list_atoms_includes_the_syntax_toolkit() {
    quill()
        .arg("list-atoms")
        .assert()
        .success()
        .stdout(contains("say\n").and(contains("kind_is\n")));
}

#[test]
fn missing_files_are_io_errors() {
    quill()
        .args(["run", "definitely/not/here.ql"])
        .assert()
        .failure()
        .stderr(contains("cannot read"));
}
