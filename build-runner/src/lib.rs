//! Deployment build runner for a pipenv-managed Django project.
//!
//! Runs the steps needed when new source code arrives: dependency sync,
//! static file collection, tests (retried once on a fresh database),
//! migrations, and a uWSGI reload. The first failing command aborts the run,
//! is logged, and is mailed to the configured recipients outside debug mode.
//!
//! - **[`core`]**: Pure command descriptions and failure types.
//! - **[`io`]**: Side-effecting operations (config, processes, log, mail).
//!   Behind traits where tests need fakes.
//!
//! Orchestration modules ([`build`], [`checks`]) share a [`session::Session`]
//! that holds the failure-reporting boundary.

pub mod build;
pub mod checks;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
