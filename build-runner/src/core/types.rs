//! Shared types describing commands and their failures.
//!
//! These types define stable contracts between the pipeline and the process
//! layer. They carry no I/O handles so tests can build them directly.

use std::fmt;

/// A single external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment variables set for this command only.
    pub env: Vec<(String, String)>,
    /// Bytes written to the child's stdin; `None` connects stdin to null.
    pub stdin: Option<Vec<u8>>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn has_arg(&self, needle: &str) -> bool {
        self.args.iter().any(|arg| arg == needle)
    }

    /// Space-joined command line, used in log lines and notifications.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// A command that exited unsuccessfully.
///
/// Travels inside `anyhow::Error` up to `main`, which recovers it with
/// `downcast_ref` to pick the process exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailed {
    pub command: CommandSpec,
    /// Always non-zero.
    pub exit_code: i32,
    pub timed_out: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandFailed {
    /// Whether the failing command was a database migration.
    pub fn is_migration(&self) -> bool {
        self.command.has_arg("migrate")
    }
}

impl fmt::Display for CommandFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.timed_out {
            write!(
                f,
                "command '{}' timed out (exit status {})",
                self.command.command_line(),
                self.exit_code
            )
        } else {
            write!(
                f,
                "command '{}' returned non-zero exit status {}",
                self.command.command_line(),
                self.exit_code
            )
        }
    }
}

impl std::error::Error for CommandFailed {}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(spec: CommandSpec) -> CommandFailed {
        CommandFailed {
            command: spec,
            exit_code: 2,
            timed_out: false,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    #[test]
    fn command_line_joins_program_and_args() {
        let spec = CommandSpec::new("pipenv").args(["sync", "--dev"]);
        assert_eq!(spec.command_line(), "pipenv sync --dev");
    }

    #[test]
    fn display_names_command_and_status() {
        let err = failure(CommandSpec::new("pipenv").arg("clean"));
        assert_eq!(
            err.to_string(),
            "command 'pipenv clean' returned non-zero exit status 2"
        );
    }

    #[test]
    fn migration_detected_by_exact_argument() {
        let migrate = failure(CommandSpec::new("python").args(["manage.py", "migrate"]));
        let other = failure(CommandSpec::new("python").args(["manage.py", "makemigrations"]));
        assert!(migrate.is_migration());
        assert!(!other.is_migration());
    }
}
