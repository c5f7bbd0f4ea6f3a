//! Command handlers for the qakb CLI.
//!
//! One submodule per subcommand.

pub mod build;
pub mod clean;
pub mod retrieve;
pub mod stats;

pub use build::BuildCommand;
pub use clean::CleanCommand;
pub use retrieve::RetrieveCommand;
pub use stats::StatsCommand;

use qakb_core::AppResult;
use serde::Serialize;

/// Print `value` as pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
