use std::{cell::RefCell, path::Path, rc::Rc};

use serde::Deserialize;
use tracing::info;

use crate::{
    ast::{CompUnit, Span},
    atoms::{standard_registry, OutputSink, SharedOutput},
    errors::{ErrorKind, ErrorReporting, PhaseContext, QuillError, SourceContext},
    macros::{expand_macros, ExpansionStep},
    runtime::{Interpreter, Value},
    syntax,
    validation::validate_names,
};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Limits and switches for one pipeline run.
///
/// Loadable from JSON; missing fields take their defaults:
///
/// ```rust
/// use quill::engine::EngineConfig;
/// let config: EngineConfig = serde_json::from_str(r#"{ "fuel": 1000 }"#).unwrap();
/// assert_eq!(config.fuel, Some(1000));
/// assert!(config.validate);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Loop iterations allowed at runtime; `None` is unbounded. Macro
    /// expansion never consumes fuel.
    pub fuel: Option<u64>,
    /// Nested function and macro calls allowed.
    pub max_call_depth: usize,
    /// Macro rewrites allowed at one call site, counting nested ones.
    pub max_expansion_depth: usize,
    /// Whether to run the name validator on the expanded program.
    pub validate: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fuel: None,
            max_call_depth: 256,
            max_expansion_depth: 512,
            validate: true,
        }
    }
}

impl EngineConfig {
    pub fn with_fuel(mut self, fuel: Option<u64>) -> Self {
        self.fuel = fuel;
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_max_expansion_depth(mut self, depth: usize) -> Self {
        self.max_expansion_depth = depth;
        self
    }

    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn from_json_file(path: &Path) -> Result<Self, QuillError> {
        let text = ExecutionPipeline::read_file(path)?;
        serde_json::from_str(&text).map_err(|e| {
            io_context().report(
                ErrorKind::Io {
                    path: path.display().to_string(),
                    message: e.to_string(),
                },
                Span::default(),
            )
        })
    }
}

fn io_context() -> PhaseContext {
    PhaseContext::new(SourceContext::fallback("file system"), "io")
}

// ============================================================================
// OUTPUT TYPES - Generic output handling for CLI and testing
// ============================================================================

/// Collects output lines in memory. Clones share the same buffer, so a test
/// can keep one handle and give the other to the interpreter.
#[derive(Clone, Default)]
pub struct OutputBuffer {
    buffer: Rc<RefCell<String>>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        self.buffer.borrow().clone()
    }
}

impl OutputSink for OutputBuffer {
    fn emit(&mut self, text: &str) {
        let mut buffer = self.buffer.borrow_mut();
        buffer.push_str(text);
        buffer.push('\n');
    }
}

/// StdoutSink: writes output to stdout for CLI and default runner use.
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn emit(&mut self, text: &str) {
        println!("{text}");
    }
}

// ============================================================================
// EXECUTION PIPELINE
// ============================================================================

/// Result of expanding a program without running it.
#[derive(Debug)]
pub struct Expansion {
    pub unit: CompUnit,
    pub trace: Vec<ExpansionStep>,
}

/// Parse → Expand → Validate → Evaluate. Every execution path, the CLI and
/// the test runners included, goes through here.
#[derive(Debug, Clone, Default)]
pub struct ExecutionPipeline {
    pub config: EngineConfig,
}

impl ExecutionPipeline {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn read_file(path: &Path) -> Result<String, QuillError> {
        std::fs::read_to_string(path).map_err(|error| {
            io_context().report(
                ErrorKind::Io {
                    path: path.display().to_string(),
                    message: error.to_string(),
                },
                Span::default(),
            )
        })
    }

    /// Sorted names of the built-in atoms.
    pub fn list_atoms() -> Vec<&'static str> {
        standard_registry().list()
    }

    pub fn parse(source: &SourceContext) -> Result<CompUnit, QuillError> {
        info!(source = %source.name, "parsing");
        syntax::parse(source)
    }

    fn interpreter(&self, source: &SourceContext, output: SharedOutput) -> Interpreter {
        Interpreter::new(output, source.clone(), &self.config)
    }

    /// Expands a parsed program with a fresh interpreter. Output written by
    /// macro bodies goes to `output`.
    pub fn expand(
        &self,
        unit: &CompUnit,
        source: &SourceContext,
        output: SharedOutput,
    ) -> Result<Expansion, QuillError> {
        let mut interp = self.interpreter(source, output);
        let unit = expand_macros(unit, &mut interp)?;
        Ok(Expansion {
            unit,
            trace: interp.take_trace(),
        })
    }

    pub fn expand_source(&self, source: &SourceContext, output: SharedOutput) -> Result<Expansion, QuillError> {
        let unit = Self::parse(source)?;
        self.expand(&unit, source, output)
    }

    /// Runs a program and returns the value of its last expression statement.
    pub fn evaluate(&self, source: &SourceContext, output: SharedOutput) -> Result<Value, QuillError> {
        let unit = Self::parse(source)?;
        let mut interp = self.interpreter(source, output);

        info!("expanding macros");
        let expanded = expand_macros(&unit, &mut interp)?;

        if self.config.validate {
            info!("validating");
            validate_names(&expanded, source).into_result()?;
        }

        info!("evaluating");
        interp.run(&expanded)
    }

    /// Runs a program and writes its final value to `output` unless it is
    /// `none`.
    pub fn execute(&self, source: &SourceContext, output: SharedOutput) -> Result<(), QuillError> {
        let value = self.evaluate(source, output.clone())?;
        if !value.is_none() {
            output.emit(&value.to_string());
        }
        Ok(())
    }

    /// Shorthand for tests and embedding: evaluates `text` with output
    /// captured, returning the value and the captured output.
    pub fn evaluate_str(&self, text: &str) -> (Result<Value, QuillError>, String) {
        let buffer = OutputBuffer::new();
        let source = SourceContext::from_file("input", text);
        let result = self.evaluate(&source, SharedOutput::new(buffer.clone()));
        (result, buffer.contents())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_json_keeps_defaults_for_missing_fields() {
        let config: EngineConfig = serde_json::from_str(r#"{ "validate": false }"#).unwrap();
        assert_eq!(config, EngineConfig::default().with_validation(false));
        assert!(serde_json::from_str::<EngineConfig>(r#"{ "fule": 1 }"#).is_err());
    }

    #[test]
    fn output_buffer_handles_share_contents() {
        let buffer = OutputBuffer::new();
        let output = SharedOutput::new(buffer.clone());
        output.emit("a");
        output.emit("b");
        assert_eq!(buffer.contents(), "a\nb\n");
    }

    #[test]
    fn execute_emits_the_final_value() {
        let buffer = OutputBuffer::new();
        let source = SourceContext::from_file("t.ql", "say(1); 2 + 3");
        ExecutionPipeline::default()
            .execute(&source, SharedOutput::new(buffer.clone()))
            .unwrap();
        assert_eq!(buffer.contents(), "1\n5\n");
    }

    #[test]
    fn missing_files_are_io_errors() {
        let err = ExecutionPipeline::read_file(Path::new("/definitely/not/here.ql")).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Io { .. }));
    }
}
