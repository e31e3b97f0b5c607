//! Command execution shared by the build and safety-check workflows.
//!
//! A [`Session`] runs commands in the project directory, records their output
//! in the build log, and owns the single failure boundary: remediation hints
//! and email notifications for a [`CommandFailed`].

use anyhow::{Error, Result};
use tracing::{info, warn};

use crate::core::commands::MIGRATION_HINT;
use crate::core::types::{CommandFailed, CommandSpec};
use crate::io::build_log::BuildLog;
use crate::io::config::BuildConfig;
use crate::io::mailer::{FailureNotice, Mailer};
use crate::io::process::{CommandOutput, CommandRunner};

pub struct Session<'a, R, M> {
    pub config: &'a BuildConfig,
    /// Workflow name used in notification subjects, e.g. `Build`.
    task: &'static str,
    pub log: BuildLog,
    runner: &'a R,
    /// `None` when no `[email]` section is configured.
    mailer: Option<&'a M>,
}

impl<'a, R: CommandRunner, M: Mailer> Session<'a, R, M> {
    pub fn new(
        config: &'a BuildConfig,
        task: &'static str,
        log_file: &str,
        runner: &'a R,
        mailer: Option<&'a M>,
    ) -> Self {
        Self {
            config,
            task,
            log: BuildLog::for_config(config, log_file),
            runner,
            mailer,
        }
    }

    /// Run and log a command without judging its exit status.
    pub fn run_command(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        info!(command = %spec.command_line(), "running");
        let output = self.runner.run(spec, &self.config.project_path)?;
        self.log.record_output(&output)?;
        Ok(output)
    }

    /// Run a command; a non-zero exit becomes a [`CommandFailed`] error.
    pub fn run_checked(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let output = self.run_command(spec)?;
        output.check(spec)?;
        Ok(output)
    }

    /// Report a failed command if `err` is one; other errors pass through untouched.
    pub fn report(&self, err: &Error) {
        if let Some(failure) = err.downcast_ref::<CommandFailed>() {
            self.report_failure(failure);
        }
    }

    /// Migration hint to the log, then a notice outside debug mode.
    ///
    /// Reporting problems are traced and swallowed so the command failure
    /// stays the run's result.
    pub fn report_failure(&self, failure: &CommandFailed) {
        warn!(
            command = %failure.command.command_line(),
            exit_code = failure.exit_code,
            "command failed"
        );
        if failure.is_migration()
            && let Err(e) = self.log.note(MIGRATION_HINT)
        {
            warn!(err = %format!("{e:#}"), "failed to write migration hint");
        }
        if self.config.debug() {
            return;
        }
        let (Some(email), Some(mailer)) = (&self.config.email, self.mailer) else {
            warn!("no mailer configured, skipping failure notice");
            return;
        };
        let notice = FailureNotice::for_failure(
            email,
            self.task,
            self.config.name(),
            &self.config.project_path,
            failure,
        );
        if let Err(e) = mailer.send(&notice) {
            warn!(err = %format!("{e:#}"), "failed to send failure notice");
        }
    }
}
