//! Depforge - Prebuilt dependency bundle builder
//!
//! This library builds, caches, and packages prebuilt third-party library
//! bundles (toolchain and SDK) for a target platform, from a declarative
//! package graph, by driving Meson builds of git-pinned sources.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Business logic: graph resolution, build orchestration, staging
//! - [`infra`] - Infrastructure layer (network, filesystem, external tools)
//! - [`config`] - Configuration and constants
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;
