//! Defines the command-line arguments and subcommands for the Quill CLI.
//!
//! This module uses the `clap` crate with its "derive" feature to create a
//! declarative and type-safe argument parsing structure.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "quill",
    version,
    about = "A small language with compile-time macros and code quotation."
)]
pub struct QuillArgs {
    /// More log output on stderr (-v info, -vv debug, -vvv trace).
    /// `QUILL_LOG` takes precedence when set.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Engine settings as JSON; flags below override it.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Maximum number of runtime loop iterations.
    #[arg(long, global = true)]
    pub fuel: Option<u64>,

    /// Maximum depth of nested function and macro calls.
    #[arg(long, global = true)]
    pub max_depth: Option<usize>,

    /// Maximum number of nested macro rewrites at one call site.
    #[arg(long, global = true)]
    pub max_expansion_depth: Option<usize>,

    /// Skip name validation of the expanded program.
    #[arg(long, global = true)]
    pub no_validate: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Full pipeline: parse, expand, validate, eval, and output.
    Run {
        /// The path to the Quill script file to run.
        #[arg(required = true)]
        file: PathBuf,
    },
    /// Evaluate a program given on the command line and print its value.
    Eval {
        /// Program text.
        #[arg(required = true)]
        code: String,
    },
    /// Print the fully macro-expanded code.
    Macroexpand {
        /// The path to the Quill script file to expand.
        #[arg(required = true)]
        file: PathBuf,
    },
    /// Show each macro rewrite with a diff from call site to result.
    Macrotrace {
        /// The path to the Quill script file to trace.
        #[arg(required = true)]
        file: PathBuf,
        /// Print the trace as JSON instead.
        #[arg(long)]
        json: bool,
    },
    /// Expand and validate a script without running it.
    Validate {
        /// The path to the Quill script file to validate.
        #[arg(required = true)]
        file: PathBuf,
    },
    /// Show the syntax tree of a script as JSON.
    Ast {
        /// The path to the Quill script file to parse.
        #[arg(required = true)]
        file: PathBuf,
    },
    /// List all built-in atoms.
    ListAtoms,
}
