//! Periodic checks with email notification on findings.

use anyhow::Result;

use crate::core::commands;
use crate::io::config::BuildConfig;
use crate::io::mailer::Mailer;
use crate::io::process::CommandRunner;
use crate::session::Session;

pub const SAFETY_LOG_FILE: &str = "django_safety.log";

pub struct Checks<'a, R, M> {
    session: Session<'a, R, M>,
}

impl<'a, R: CommandRunner, M: Mailer> Checks<'a, R, M> {
    pub fn new(config: &'a BuildConfig, runner: &'a R, mailer: Option<&'a M>) -> Self {
        Self {
            session: Session::new(config, "Safety check", SAFETY_LOG_FILE, runner, mailer),
        }
    }

    /// Look for installed packages with known security vulnerabilities.
    pub fn safety(&self) -> Result<()> {
        let result = self
            .session
            .run_checked(&commands::safety_check())
            .map(drop);
        if let Err(err) = &result {
            self.session.report(err);
        }
        result
    }
}
