//! Kernel lifecycle management for kerneldock.
//!
//! Launches a kernel inside a container, hands the caller a connection file
//! describing how to reach it, and supervises the container through the
//! [`KernelManager`](manager::KernelManager) capability set.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod connection;
pub mod launcher;
pub mod manager;
pub mod runtime;
pub mod storage;
