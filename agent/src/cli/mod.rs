//! CLI module
//!
//! - Argument definitions (args)
//! - Interactive loop and verbose progress output (repl)

pub mod args;
pub mod repl;

pub use args::{Cli, Commands};
pub use repl::{is_exit_keyword, spawn_progress_printer, Repl, ReplExit};
