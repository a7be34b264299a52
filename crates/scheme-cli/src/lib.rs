//! Scheme CLI library.
//!
//! Argument parsing, command execution and output formatting for the
//! `scheme` binary.

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

pub use cli::{Cli, Command};
pub use error::{CliError, Result};
pub use output::{Formatter, OutputFormat};
