//! Toolchain discovery.
//!
//! - [`env`]: environment lookups with unset/empty normalization
//! - [`detect`]: CUDA / ROCm backend detection

pub mod detect;
pub mod env;
