//! Test-only fakes for the process and mail seams, plus throwaway projects.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::core::types::CommandSpec;
use crate::io::config::{BuildConfig, load_config};
use crate::io::mailer::{FailureNotice, Mailer};
use crate::io::process::{CommandOutput, CommandRunner};

/// Scripted result for one command invocation.
#[derive(Debug, Clone)]
pub struct ScriptedCommand {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ScriptedCommand {
    pub fn ok() -> Self {
        Self::exit(0)
    }

    pub fn exit(code: i32) -> Self {
        Self {
            code,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn with_output(mut self, stdout: &str, stderr: &str) -> Self {
        self.stdout = stdout.to_string();
        self.stderr = stderr.to_string();
        self
    }
}

/// Returns queued results in order; succeeds silently once the queue is empty.
///
/// Every invocation is recorded for later assertions.
#[derive(Default)]
pub struct ScriptedRunner {
    queue: RefCell<VecDeque<ScriptedCommand>>,
    calls: RefCell<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new(queue: Vec<ScriptedCommand>) -> Self {
        Self {
            queue: RefCell::new(queue.into()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.borrow().clone()
    }

    /// Command lines (`program args...`) of all invocations so far.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(CommandSpec::command_line)
            .collect()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, spec: &CommandSpec, _workdir: &Path) -> Result<CommandOutput> {
        self.calls.borrow_mut().push(spec.clone());
        let scripted = self
            .queue
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(ScriptedCommand::ok);
        Ok(CommandOutput {
            code: Some(scripted.code),
            stdout: scripted.stdout.into_bytes(),
            stderr: scripted.stderr.into_bytes(),
            ..CommandOutput::default()
        })
    }
}

/// Collects notices instead of sending them.
#[derive(Default)]
pub struct RecordingMailer {
    sent: RefCell<Vec<FailureNotice>>,
    fail: bool,
}

impl RecordingMailer {
    /// A mailer whose deliveries always fail (after being recorded).
    pub fn failing() -> Self {
        Self {
            sent: RefCell::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<FailureNotice> {
        self.sent.borrow().clone()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, notice: &FailureNotice) -> Result<()> {
        self.sent.borrow_mut().push(notice.clone());
        if self.fail {
            anyhow::bail!("smtp unavailable");
        }
        Ok(())
    }
}

/// A temporary project directory with a `config.ini` and a `logs/` directory.
pub struct TestProject {
    temp: TempDir,
}

impl TestProject {
    /// Project in production mode (`DEBUG = false`) with an `[email]` section.
    pub fn production() -> Result<Self> {
        Self::with_config(&config_ini(false, ""))
    }

    /// Project in debug mode; logs go to the console.
    pub fn debug() -> Result<Self> {
        Self::with_config(&config_ini(true, ""))
    }

    pub fn with_config(contents: &str) -> Result<Self> {
        let temp = tempfile::tempdir().context("create temp project")?;
        fs::create_dir_all(temp.path().join("logs")).context("create logs dir")?;
        fs::write(temp.path().join("config.ini"), contents).context("write config.ini")?;
        Ok(Self { temp })
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn config(&self) -> Result<BuildConfig> {
        load_config(self.path())
    }

    pub fn log_path(&self, file_name: &str) -> PathBuf {
        self.path().join("logs").join(file_name)
    }

    /// Log contents, empty when the file does not exist.
    pub fn read_log(&self, file_name: &str) -> String {
        fs::read_to_string(self.log_path(file_name)).unwrap_or_default()
    }
}

/// `config.ini` contents with a relative `logs` directory; `extra` is appended.
pub fn config_ini(debug: bool, extra: &str) -> String {
    format!(
        "[environment]\n\
         NAME = test-env\n\
         DEBUG = {debug}\n\
         LOG_PATH = logs\n\
         \n\
         [email]\n\
         DEFAULT_FROM_EMAIL = noreply@example.com\n\
         DEFAULT_TO_EMAILS = dev@example.com admin@example.com\n\
         HOST = smtp.example.com\n\
         HOST_USER = mailer\n\
         HOST_PASSWORD = secret\n\
         {extra}"
    )
}
