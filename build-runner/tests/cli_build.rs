//! CLI tests for the `build-runner` binary.
//!
//! Spawns the binary against a temporary project whose `pipenv` and
//! interpreter are small shell scripts, and checks exit codes, the build log
//! and the reload trigger.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::{Command, Output};

use build_runner::build::BUILD_LOG_FILE;
use build_runner::exit_codes;
use build_runner::io::reload::RELOAD_TRIGGER;
use build_runner::test_support::TestProject;

/// Write an executable `#!/bin/sh` script.
fn write_script(path: &Path, body: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create script dir");
    }
    fs::write(path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    let mut perms = fs::metadata(path).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod");
}

/// Install fake `pipenv` (on a private PATH dir) and `.venv/bin/python`.
fn install_tools(project: &TestProject, pipenv: &str, python: &str) {
    write_script(&project.path().join("bin/pipenv"), pipenv);
    write_script(&project.path().join(".venv/bin/python"), python);
}

fn run_cli(project: &TestProject, args: &[&str]) -> Output {
    let path = format!(
        "{}:{}",
        project.path().join("bin").display(),
        std::env::var("PATH").unwrap_or_default()
    );
    Command::new(env!("CARGO_BIN_EXE_build-runner"))
        .args(args)
        .env("DJANGO_PROJECT_PATH", project.path())
        .env("PATH", path)
        .env_remove("RUST_LOG")
        .output()
        .expect("run build-runner")
}

#[test]
fn successful_build_exits_ok_and_touches_trigger() {
    let project = TestProject::production().expect("project");
    install_tools(&project, "echo \"pipenv $*\"", "echo \"python $*\"");

    let output = run_cli(&project, &["build"]);

    assert_eq!(
        output.status.code(),
        Some(exit_codes::OK),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(project.path().join(RELOAD_TRIGGER).is_file());
    let log = project.read_log(BUILD_LOG_FILE);
    assert!(log.contains("pipenv sync\n"));
    assert!(log.contains("python manage.py migrate --noinput\n"));
}

#[test]
fn failing_command_exit_code_is_passed_through() {
    let project = TestProject::debug().expect("project");
    install_tools(
        &project,
        "echo 'lock file mismatch' >&2; exit 3",
        "exit 0",
    );

    let output = run_cli(&project, &[]);

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("lock file mismatch"));
    assert!(stderr.contains("command 'pipenv sync --dev' returned non-zero exit status 3"));
    assert!(!project.path().join(RELOAD_TRIGGER).exists());
}

#[test]
fn failed_migration_prints_hint_in_debug_mode() {
    let project = TestProject::debug().expect("project");
    install_tools(
        &project,
        "exit 0",
        "case \"$*\" in *migrate*) echo 'no such table' >&2; exit 4;; esac",
    );

    let output = run_cli(&project, &["build"]);

    assert_eq!(output.status.code(), Some(4));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no such table"));
    assert!(stderr.contains("You might solve migration issues"));
}

#[test]
fn test_retry_receives_confirmation_on_stdin() {
    let project = TestProject::debug().expect("project");
    // First attempt (-k) fails; the retry succeeds only if stdin says "yes".
    install_tools(
        &project,
        "exit 0",
        "case \"$*\" in\n\
         *'test -k'*) exit 1;;\n\
         *test*) read answer; [ \"$answer\" = yes ] || exit 9;;\n\
         esac",
    );

    let output = run_cli(&project, &["build"]);

    assert_eq!(
        output.status.code(),
        Some(exit_codes::OK),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn missing_config_is_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = Command::new(env!("CARGO_BIN_EXE_build-runner"))
        .arg("--project")
        .arg(temp.path())
        .output()
        .expect("run build-runner");

    assert_eq!(output.status.code(), Some(exit_codes::FAILURE));
    assert!(String::from_utf8_lossy(&output.stderr).contains("config.ini"));
}
