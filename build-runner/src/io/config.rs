//! Build configuration stored in `<project>/config.ini`.
//!
//! The file is shared with the web application, so it stays INI: section and
//! key names are case-insensitive and values are taken literally (no quote,
//! escape or interpolation handling).

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use ini::{Ini, ParseOption, Properties};

pub const CONFIG_FILE: &str = "config.ini";
pub const DEFAULT_PYTHON: &str = ".venv/bin/python";
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30 * 60;
pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 1_000_000;
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Immutable configuration for one build-runner invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// Directory containing `manage.py`; commands run here.
    pub project_path: PathBuf,
    pub environment: EnvironmentConfig,
    /// Required outside debug mode.
    pub email: Option<EmailConfig>,
    pub test: TestConfig,
    pub commands: CommandConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentConfig {
    pub name: String,
    pub debug: bool,
    /// Absolute log directory.
    pub log_dir: PathBuf,
}

#[derive(Clone, PartialEq, Eq)]
pub struct EmailConfig {
    pub from: String,
    pub to: Vec<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailConfig")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestConfig {
    /// Settings module passed as `--settings` to the test command.
    pub settings: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandConfig {
    /// Absolute path of the project interpreter.
    pub python: PathBuf,
    pub timeout_secs: u64,
    pub output_limit_bytes: usize,
}

impl BuildConfig {
    pub fn debug(&self) -> bool {
        self.environment.debug
    }

    pub fn name(&self) -> &str {
        &self.environment.name
    }

    /// Path of a log file inside the configured log directory.
    pub fn log_path(&self, file_name: &str) -> PathBuf {
        self.environment.log_dir.join(file_name)
    }

    /// Interpreter path as passed to the process layer.
    pub fn python(&self) -> String {
        self.commands.python.display().to_string()
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.commands.timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.environment.name.trim().is_empty() {
            bail!("environment.NAME must not be empty");
        }
        if self.commands.timeout_secs == 0 {
            bail!("build.COMMAND_TIMEOUT must be > 0");
        }
        if self.commands.output_limit_bytes == 0 {
            bail!("build.OUTPUT_LIMIT must be > 0");
        }
        match &self.email {
            Some(email) if email.to.is_empty() => {
                bail!("email.DEFAULT_TO_EMAILS must list at least one address")
            }
            None if !self.environment.debug => {
                bail!("[email] section is required when environment.DEBUG is false")
            }
            _ => Ok(()),
        }
    }
}

/// Load `config.ini` from the project directory.
pub fn load_config(project_path: &Path) -> Result<BuildConfig> {
    let path = project_path.join(CONFIG_FILE);
    let contents = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    parse_config(project_path, &contents).with_context(|| format!("parse {}", path.display()))
}

/// Parse INI contents; relative paths resolve against `project_path`.
pub fn parse_config(project_path: &Path, contents: &str) -> Result<BuildConfig> {
    let options = ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        ..ParseOption::default()
    };
    let ini = Ini::load_from_str_opt(contents, options).map_err(|e| anyhow!("{e}"))?;

    let env = section(&ini, "environment")?;
    let environment = EnvironmentConfig {
        name: required(env, "environment", "NAME")?.to_string(),
        debug: parse_bool(required(env, "environment", "DEBUG")?)
            .context("environment.DEBUG")?,
        log_dir: resolve(project_path, required(env, "environment", "LOG_PATH")?),
    };

    let email = match ini.section(Some("email")) {
        Some(props) => Some(parse_email(props)?),
        None => None,
    };

    let test = TestConfig {
        settings: optional(&ini, "test", "SETTINGS").map(str::to_string),
    };

    let commands = CommandConfig {
        python: resolve(
            project_path,
            optional(&ini, "build", "PYTHON").unwrap_or(DEFAULT_PYTHON),
        ),
        timeout_secs: optional(&ini, "build", "COMMAND_TIMEOUT")
            .map(|raw| raw.parse().context("build.COMMAND_TIMEOUT"))
            .transpose()?
            .unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECS),
        output_limit_bytes: optional(&ini, "build", "OUTPUT_LIMIT")
            .map(|raw| raw.parse().context("build.OUTPUT_LIMIT"))
            .transpose()?
            .unwrap_or(DEFAULT_OUTPUT_LIMIT_BYTES),
    };

    let cfg = BuildConfig {
        project_path: project_path.to_path_buf(),
        environment,
        email,
        test,
        commands,
    };
    cfg.validate()?;
    Ok(cfg)
}

fn parse_email(props: &Properties) -> Result<EmailConfig> {
    let port = match props.get("PORT").map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => raw.parse().context("email.PORT")?,
        None => DEFAULT_SMTP_PORT,
    };
    Ok(EmailConfig {
        from: required(props, "email", "DEFAULT_FROM_EMAIL")?.to_string(),
        to: required(props, "email", "DEFAULT_TO_EMAILS")?
            .split_whitespace()
            .map(str::to_string)
            .collect(),
        host: required(props, "email", "HOST")?.to_string(),
        port,
        user: required(props, "email", "HOST_USER")?.to_string(),
        password: props.get("HOST_PASSWORD").unwrap_or_default().to_string(),
    })
}

fn section<'a>(ini: &'a Ini, name: &str) -> Result<&'a Properties> {
    ini.section(Some(name))
        .ok_or_else(|| anyhow!("missing [{name}] section"))
}

fn required<'a>(props: &'a Properties, section: &str, key: &str) -> Result<&'a str> {
    props
        .get(key)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| anyhow!("missing {section}.{key}"))
}

fn optional<'a>(ini: &'a Ini, section: &str, key: &str) -> Option<&'a str> {
    ini.section(Some(section))
        .and_then(|props| props.get(key))
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn resolve(project_path: &Path, raw: &str) -> PathBuf {
    let path = Path::new(raw);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_path.join(path)
    }
}

/// INI boolean with the usual spellings.
pub fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Ok(true),
        "0" | "no" | "false" | "off" => Ok(false),
        other => Err(anyhow!("not a boolean: {other:?}")),
    }
}
