//! Package staging.
//!
//! - [`assembler`]: copies the shared library and headers into the package tree
//! - [`metadata`]: package description written next to the staged files
//! - [`clean`]: removal of generated build artifacts

pub mod assembler;
pub mod clean;
pub mod metadata;
