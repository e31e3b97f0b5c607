//! The build log: the product record of every command a run executes.
//!
//! Debug mode writes straight to the console; otherwise output is appended to
//! a file under the configured log directory. This is separate from the
//! `tracing` diagnostics set up in [`crate::logging`].

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::io::config::BuildConfig;
use crate::io::process::CommandOutput;

/// Width of the `#` rule separating captured streams.
pub const RULE_WIDTH: usize = 60;

pub fn rule() -> String {
    "#".repeat(RULE_WIDTH)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    /// stdout/stderr of this process.
    Console,
    /// Append-only file.
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct BuildLog {
    sink: LogSink,
}

impl BuildLog {
    /// Console in debug mode, `<log dir>/<file_name>` otherwise.
    pub fn for_config(config: &BuildConfig, file_name: &str) -> Self {
        let sink = if config.debug() {
            LogSink::Console
        } else {
            LogSink::File(config.log_path(file_name))
        };
        Self { sink }
    }

    /// Run header, e.g. `\n########## build 2024-05-01 12:00:00\n`.
    pub fn banner(&self, label: &str) -> Result<()> {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.6f");
        let text = format!("\n########## {label} {now}\n");
        match &self.sink {
            LogSink::Console => write_console(io::stdout(), text.as_bytes()),
            LogSink::File(path) => append(path, text.as_bytes()),
        }
    }

    /// Record captured stdout/stderr of a finished command.
    pub fn record_output(&self, output: &CommandOutput) -> Result<()> {
        match &self.sink {
            LogSink::Console => {
                let mut stdout = output.stdout.clone();
                stdout.extend_from_slice(output.stdout_truncated_notice().as_bytes());
                stdout.push(b'\n');
                write_console(io::stdout(), &stdout)?;

                let mut stderr = output.stderr.clone();
                stderr.extend_from_slice(output.stderr_truncated_notice().as_bytes());
                stderr.extend_from_slice(timeout_notice(output).as_bytes());
                stderr.push(b'\n');
                write_console(io::stderr(), &stderr)
            }
            LogSink::File(path) => append(path, &render_output(output)),
        }
    }

    /// Free-form diagnostic text, e.g. a remediation hint.
    pub fn note(&self, text: &str) -> Result<()> {
        match &self.sink {
            LogSink::Console => write_console(io::stderr(), text.as_bytes()),
            LogSink::File(path) => append(path, text.as_bytes()),
        }
    }
}

/// File layout for one command's captured output.
pub fn render_output(output: &CommandOutput) -> Vec<u8> {
    let mut buf = Vec::with_capacity(output.stdout.len() + output.stderr.len() + 160);
    buf.extend_from_slice(rule().as_bytes());
    buf.extend_from_slice(b"\nstdout:\n");
    buf.extend_from_slice(&output.stdout);
    buf.extend_from_slice(output.stdout_truncated_notice().as_bytes());
    buf.extend_from_slice(rule().as_bytes());
    buf.extend_from_slice(b"\nstderr:\n");
    buf.extend_from_slice(&output.stderr);
    buf.extend_from_slice(output.stderr_truncated_notice().as_bytes());
    buf.extend_from_slice(timeout_notice(output).as_bytes());
    buf
}

fn timeout_notice(output: &CommandOutput) -> &'static str {
    if output.timed_out {
        "\n[command timed out]\n"
    } else {
        ""
    }
}

fn append(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log dir {}", parent.display()))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open build log {}", path.display()))?;
    file.write_all(contents)
        .with_context(|| format!("write build log {}", path.display()))
}

fn write_console<W: Write>(mut writer: W, contents: &[u8]) -> Result<()> {
    writer.write_all(contents).context("write console log")?;
    writer.flush().context("flush console log")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::parse_config;

    fn file_log(dir: &Path) -> (BuildLog, PathBuf) {
        let path = dir.join("logs").join("django_build.log");
        (
            BuildLog {
                sink: LogSink::File(path.clone()),
            },
            path,
        )
    }

    #[test]
    fn for_config_picks_sink_from_debug_flag() {
        let project = Path::new("/srv/app");
        let env = "[environment]\nNAME = dev\nLOG_PATH = logs\n";

        let debug = parse_config(project, &format!("{env}DEBUG = true\n")).expect("parse");
        assert_eq!(
            BuildLog::for_config(&debug, "django_build.log").sink,
            LogSink::Console
        );

        let prod_raw = format!(
            "{env}DEBUG = false\n[email]\nDEFAULT_FROM_EMAIL = a@example.com\n\
             DEFAULT_TO_EMAILS = b@example.com\nHOST = smtp.example.com\nHOST_USER = u\n"
        );
        let prod = parse_config(project, &prod_raw).expect("parse");
        assert_eq!(
            BuildLog::for_config(&prod, "django_build.log").sink,
            LogSink::File(project.join("logs/django_build.log"))
        );
    }

    #[test]
    fn render_output_separates_streams() {
        let output = CommandOutput {
            code: Some(0),
            stdout: b"synced\n".to_vec(),
            stderr: b"warning\n".to_vec(),
            ..CommandOutput::default()
        };
        let rendered = String::from_utf8(render_output(&output)).expect("utf8");
        let expected = format!("{r}\nstdout:\nsynced\n{r}\nstderr:\nwarning\n", r = rule());
        assert_eq!(rendered, expected);
    }

    #[test]
    fn render_output_reports_truncation_and_timeout() {
        let output = CommandOutput {
            code: None,
            stdout_truncated: 12,
            timed_out: true,
            ..CommandOutput::default()
        };
        let rendered = String::from_utf8(render_output(&output)).expect("utf8");
        assert!(rendered.contains("[stdout truncated 12 bytes]"));
        assert!(rendered.contains("[command timed out]"));
    }

    #[test]
    fn file_sink_appends_and_creates_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (log, path) = file_log(temp.path());

        log.banner("build").expect("banner");
        log.record_output(&CommandOutput::default()).expect("record");
        log.note("hint\n").expect("note");

        let contents = fs::read_to_string(&path).expect("read log");
        assert!(contents.starts_with("\n########## build "));
        assert!(contents.contains("stdout:\n"));
        assert!(contents.ends_with("hint\n"));
    }
}
