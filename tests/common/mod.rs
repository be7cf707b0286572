// Shared helpers for the integration tests. Every helper runs through
// `ExecutionPipeline`, the same path the CLI takes.

#![allow(dead_code)]

use quill::{
    ast::pretty,
    atoms::SharedOutput,
    engine::{EngineConfig, ExecutionPipeline, OutputBuffer},
    ErrorKind, SourceContext,
};

/// Evaluates with the default configuration, returning the displayed value
/// and everything written by `say`.
pub fn eval_ok(src: &str) -> (String, String) {
    eval_ok_with(EngineConfig::default(), src)
}

pub fn eval_ok_with(config: EngineConfig, src: &str) -> (String, String) {
    let (result, output) = ExecutionPipeline::new(config).evaluate_str(src);
    match result {
        Ok(value) => (value.to_string(), output),
        Err(error) => panic!("expected success for {src:?}, got: {error}"),
    }
}

/// Value only.
pub fn value_of(src: &str) -> String {
    eval_ok(src).0
}

pub fn eval_err(src: &str) -> ErrorKind {
    eval_err_with(EngineConfig::default(), src)
}

pub fn eval_err_with(config: EngineConfig, src: &str) -> ErrorKind {
    let (result, _) = ExecutionPipeline::new(config).evaluate_str(src);
    match result {
        Ok(value) => panic!("expected an error for {src:?}, got value {value}"),
        Err(error) => error.kind,
    }
}

/// Expands `src` and pretty-prints the result.
pub fn expand(src: &str) -> String {
    let source = SourceContext::from_file("input", src);
    let expansion = ExecutionPipeline::default()
        .expand_source(&source, SharedOutput::new(OutputBuffer::new()))
        .unwrap_or_else(|error| panic!("expansion of {src:?} failed: {error}"));
    pretty::comp_unit(&expansion.unit)
}
