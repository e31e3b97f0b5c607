//! Deterministic, pure logic shared by the build runner.
//!
//! Core modules must be free of I/O side effects. They describe which
//! commands to run and how failures are represented; `io` executes them.

pub mod commands;
pub mod types;
