//! External command execution.
//!
//! - [`runner`]: command description, captured output and the [`runner::CommandRunner`] seam

pub mod runner;
