//! The build pipeline run when new source code arrives.

use std::path::PathBuf;

use anyhow::Result;
use tracing::{info, warn};

use crate::core::commands;
use crate::io::config::BuildConfig;
use crate::io::mailer::Mailer;
use crate::io::process::CommandRunner;
use crate::io::reload;
use crate::session::Session;

pub const BUILD_LOG_FILE: &str = "django_build.log";

/// What a successful build did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    /// 1, or 2 when the first test attempt failed and the retry passed.
    pub test_attempts: u32,
    /// Reload trigger that was touched; `None` in debug mode.
    pub reloaded: Option<PathBuf>,
}

pub struct Build<'a, R, M> {
    session: Session<'a, R, M>,
}

impl<'a, R: CommandRunner, M: Mailer> Build<'a, R, M> {
    pub fn new(config: &'a BuildConfig, runner: &'a R, mailer: Option<&'a M>) -> Self {
        Self {
            session: Session::new(config, "Build", BUILD_LOG_FILE, runner, mailer),
        }
    }

    fn config(&self) -> &BuildConfig {
        self.session.config
    }

    /// Run every step in order, stopping at the first failure.
    ///
    /// A failed command is reported (hint, notice) before being returned.
    pub fn run(&self) -> Result<BuildOutcome> {
        let result = self.run_steps();
        if let Err(err) = &result {
            self.session.report(err);
        }
        result
    }

    fn run_steps(&self) -> Result<BuildOutcome> {
        self.session.log.banner("build")?;

        self.sync_packages()?;
        self.collect_static_files(true)?;
        let test_attempts = self.run_tests()?;
        self.migrate_database()?;

        let reloaded = if self.config().debug() {
            None
        } else {
            self.collect_static_files(false)?;
            Some(self.reload_webserver()?)
        };
        info!(test_attempts, reloaded = reloaded.is_some(), "build finished");
        Ok(BuildOutcome {
            test_attempts,
            reloaded,
        })
    }

    pub fn sync_packages(&self) -> Result<()> {
        for spec in commands::sync_packages(self.config().debug()) {
            self.session.run_checked(&spec)?;
        }
        Ok(())
    }

    pub fn collect_static_files(&self, dry_run: bool) -> Result<()> {
        let spec = commands::collect_static(&self.config().python(), dry_run);
        self.session.run_checked(&spec)?;
        Ok(())
    }

    /// Run the test suite, retrying once against a fresh database.
    ///
    /// Returns the number of attempts used.
    pub fn run_tests(&self) -> Result<u32> {
        let python = self.config().python();
        let settings = self.config().test.settings.as_deref();

        let first = self
            .session
            .run_command(&commands::test_first_attempt(&python, settings))?;
        if first.success() {
            return Ok(1);
        }
        warn!(
            exit_code = first.exit_code(),
            "tests failed, retrying with a fresh database"
        );
        self.session
            .run_checked(&commands::test_retry(&python, settings))?;
        Ok(2)
    }

    pub fn migrate_database(&self) -> Result<()> {
        self.session
            .run_checked(&commands::migrate(&self.config().python()))?;
        Ok(())
    }

    pub fn reload_webserver(&self) -> Result<PathBuf> {
        let path = reload::reload_webserver(&self.config().project_path)?;
        info!(path = %path.display(), "reload triggered");
        Ok(path)
    }
}
