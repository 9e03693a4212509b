//! magma-packager: build orchestration for the MAGMA native library.
//!
//! Detects the GPU toolkit on the host (ROCm before CUDA, CPU otherwise),
//! derives the package version, drives MAGMA's make-based build for ROCm and
//! stages `libmagma.so` with its headers into a distributable package tree.

pub mod build;
pub mod config;
pub mod exec;
pub mod package;
pub mod pipeline;
pub mod toolchain;
pub mod version;
