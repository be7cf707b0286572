//! Handles all user-facing output for the CLI.
//!
//! This module is responsible for pretty-printing, colorizing output and
//! generating JSON. By centralizing output logic here, we ensure a
//! consistent user experience across all commands.

use difference::{Changeset, Difference};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::macros::ExpansionStep;

// ============================================================================
// CORE OUTPUT FUNCTIONS: User-facing CLI output utilities
// ============================================================================

/// Prints a macro expansion trace to the console with colored diffs.
pub fn print_trace(trace: &[ExpansionStep]) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    if trace.is_empty() {
        println!("(no macro calls)");
        return;
    }

    for (i, step) in trace.iter().enumerate() {
        let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true));
        println!(
            "--- Step {}: {} (depth {}, bytes {}..{}) ---",
            i, step.name, step.depth, step.span.start, step.span.end
        );
        let _ = stdout.reset();

        let changeset = Changeset::new(&step.call_site, &step.result, "\n");
        print_diff(&mut stdout, &changeset.diffs);
        let _ = stdout.reset();
        println!();
    }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_success(message: &str) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true));
    println!("{message}");
    let _ = stdout.reset();
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn print_diff(stdout: &mut StandardStream, diffs: &[Difference]) {
    for diff in diffs {
        match diff {
            Difference::Same(x) => {
                let _ = stdout.reset();
                println!(" {x}");
            }
            Difference::Add(x) => {
                let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)));
                println!("+{x}");
            }
            Difference::Rem(x) => {
                let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Red)));
                println!("-{x}");
            }
        }
    }
}
