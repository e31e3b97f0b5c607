//! I/O helpers for build-runner commands.

pub mod build_log;
pub mod config;
pub mod mailer;
pub mod process;
pub mod reload;
