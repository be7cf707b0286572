//! The Quill Command-Line Interface.
//!
//! This module is the main entry point for all CLI commands and orchestrates
//! the core library functions. Every command goes through
//! [`ExecutionPipeline`]; errors are printed with miette and exit with
//! status 1.

use std::{path::Path, process};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::{
    ast::pretty,
    atoms::SharedOutput,
    cli::args::{Command, QuillArgs},
    engine::{EngineConfig, ExecutionPipeline, StdoutSink},
    errors::{print_error, ErrorKind, ErrorReporting, PhaseContext, QuillError, SourceContext},
    validation::validate_names,
};

pub mod args;
pub mod output;

/// The main entry point for the CLI.
pub fn run() {
    let args = QuillArgs::parse();
    init_tracing(args.verbose);

    let result = build_config(&args).and_then(|config| {
        let pipeline = ExecutionPipeline::new(config);
        dispatch(&pipeline, args.command)
    });

    if let Err(error) = result {
        print_error(error);
        process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("QUILL_LOG").unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

/// Config file first, then command-line overrides.
fn build_config(args: &QuillArgs) -> Result<EngineConfig, QuillError> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    if args.fuel.is_some() {
        config = config.with_fuel(args.fuel);
    }
    if let Some(depth) = args.max_depth {
        config = config.with_max_call_depth(depth);
    }
    if let Some(depth) = args.max_expansion_depth {
        config = config.with_max_expansion_depth(depth);
    }
    if args.no_validate {
        config = config.with_validation(false);
    }
    Ok(config)
}

fn load(path: &Path) -> Result<SourceContext, QuillError> {
    let text = ExecutionPipeline::read_file(path)?;
    Ok(SourceContext::from_file(path.display().to_string(), text))
}

fn stdout() -> SharedOutput {
    SharedOutput::new(StdoutSink)
}

fn json_error(error: serde_json::Error) -> QuillError {
    PhaseContext::new(SourceContext::fallback("json output"), "cli").report(
        ErrorKind::Io {
            path: "<stdout>".into(),
            message: error.to_string(),
        },
        Default::default(),
    )
}

fn dispatch(pipeline: &ExecutionPipeline, command: Command) -> Result<(), QuillError> {
    match command {
        Command::Run { file } => pipeline.execute(&load(&file)?, stdout()),
        Command::Eval { code } => {
            let source = SourceContext::from_file("<eval>", code);
            let value = pipeline.evaluate(&source, stdout())?;
            println!("{value}");
            Ok(())
        }
        Command::Macroexpand { file } => {
            let expansion = pipeline.expand_source(&load(&file)?, stdout())?;
            print!("{}", pretty::comp_unit(&expansion.unit));
            Ok(())
        }
        Command::Macrotrace { file, json } => {
            let expansion = pipeline.expand_source(&load(&file)?, stdout())?;
            if json {
                output::print_json(&expansion.trace).map_err(json_error)
            } else {
                output::print_trace(&expansion.trace);
                Ok(())
            }
        }
        Command::Validate { file } => {
            let source = load(&file)?;
            let expansion = pipeline.expand_source(&source, stdout())?;
            validate_names(&expansion.unit, &source).into_result()?;
            output::print_success(&format!("{}: ok", file.display()));
            Ok(())
        }
        Command::Ast { file } => {
            let unit = ExecutionPipeline::parse(&load(&file)?)?;
            output::print_json(&unit).map_err(json_error)
        }
        Command::ListAtoms => {
            for name in ExecutionPipeline::list_atoms() {
                println!("{name}");
            }
            Ok(())
        }
    }
}
