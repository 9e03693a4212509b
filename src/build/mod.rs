//! Native build of the wrapped library.
//!
//! - [`env`]: environment overrides scoped to the build's child processes
//! - [`plan`]: target architecture resolution and `make.inc` generation
//! - [`driver`]: per-backend build procedure

pub mod driver;
pub mod env;
pub mod plan;
