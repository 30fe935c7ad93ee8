//! # kerneldock-common
//!
//! Shared types, error definitions, configuration models, and constants
//! used across the kerneldock workspace.
//!
//! This crate is the leaf of the dependency graph: it depends on no other
//! internal crate and holds the fixed protocol values (channel ports, mount
//! points, connection file name) that the in-container kernel relies on.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
