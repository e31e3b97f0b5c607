//! Deployment build runner.
//!
//! Reads `<project>/config.ini`, runs the build (or the safety check), and
//! exits with the failing command's exit code on the first failure.

use std::path::PathBuf;

use anyhow::{Context, Result};
use build_runner::build::Build;
use build_runner::checks::Checks;
use build_runner::io::config::{BuildConfig, load_config};
use build_runner::io::mailer::SmtpMailer;
use build_runner::io::process::SystemRunner;
use build_runner::{exit_codes, logging};
use clap::{Parser, Subcommand};
use tracing::debug;

#[derive(Parser)]
#[command(
    name = "build-runner",
    version,
    about = "Build, test, migrate and reload a Django project"
)]
struct Cli {
    /// Project directory containing `manage.py` and `config.ini`.
    #[arg(long, env = "DJANGO_PROJECT_PATH", global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Sync packages, collect static files, test, migrate and reload (default).
    Build,
    /// Check installed packages for known vulnerabilities.
    Safety,
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(()) => exit_codes::OK,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::for_error(&err)
        }
    };
    std::process::exit(code);
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let project = match cli.project {
        Some(path) => path,
        None => std::env::current_dir().context("resolve current directory")?,
    };
    let config = load_config(&project)?;
    debug!(?config, "configuration loaded");

    let command = cli.command.unwrap_or(Command::Build);
    let mailer = config.email.clone().map(SmtpMailer::new);
    dispatch(command, &config, mailer.as_ref())
}

fn dispatch(command: Command, config: &BuildConfig, mailer: Option<&SmtpMailer>) -> Result<()> {
    let runner = SystemRunner {
        timeout: config.command_timeout(),
        output_limit_bytes: config.commands.output_limit_bytes,
    };
    match command {
        Command::Build => {
            Build::new(config, &runner, mailer).run()?;
        }
        Command::Safety => Checks::new(config, &runner, mailer).safety()?,
    }
    Ok(())
}
