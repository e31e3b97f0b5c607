//! Command lines for each build step.
//!
//! Builders here are pure; the interpreter path is resolved by the caller.

use super::types::CommandSpec;

pub const PIPENV: &str = "pipenv";

/// Tags skipped by both test attempts.
const EXCLUDED_TEST_TAGS: [&str; 2] = ["slow", "selenium"];

/// Answer to Django's "destroy the old test database?" prompt.
pub const FRESH_DATABASE_ANSWER: &[u8] = b"yes";

/// Appended to the build log when a migration fails.
pub const MIGRATION_HINT: &str = "You might solve migration issues by switching to your \
last git branch/commit where your database/migrations worked and search for the last \
migration of the app where the migration just failed which exists in both branches. \
Then you `cd` to the django folder and run \
`pipenv run python manage.py migrate <app> <migration>` where <migration> is the unique \
beginning of the migration py file, e.g. \"0003\".\n\
(Note that this may result in data loss in the changed fields!)\n\
After a successful migration you switch branches again and run the build a second time.\n";

/// `pipenv` with the virtualenv kept inside the project.
fn pipenv<I, S>(args: I) -> CommandSpec
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    CommandSpec::new(PIPENV)
        .args(args)
        .env("PIPENV_VENV_IN_PROJECT", "1")
        // psycopg2 must be built from source
        .env("PIP_NO_BINARY", "psycopg2")
}

/// `pipenv sync` (with dev packages in debug mode) followed by `pipenv clean`.
pub fn sync_packages(debug: bool) -> [CommandSpec; 2] {
    let sync = if debug {
        pipenv(["sync", "--dev"])
    } else {
        pipenv(["sync"])
    };
    [sync, pipenv(["clean"])]
}

pub fn collect_static(python: &str, dry_run: bool) -> CommandSpec {
    let spec = manage(python).args(["collectstatic", "--noinput", "-v", "0"]);
    if dry_run { spec.arg("--dry-run") } else { spec }
}

/// First test attempt: keeps the existing test database (`-k`).
pub fn test_first_attempt(python: &str, settings: Option<&str>) -> CommandSpec {
    let spec = manage(python).args(["test", "-k"]);
    let spec = exclude_tags(spec).arg("--noinput");
    with_settings(spec, settings)
}

/// Retry against a fresh database; confirms the teardown prompt on stdin.
pub fn test_retry(python: &str, settings: Option<&str>) -> CommandSpec {
    let spec = exclude_tags(manage(python).arg("test"));
    with_settings(spec, settings).stdin(FRESH_DATABASE_ANSWER)
}

pub fn migrate(python: &str) -> CommandSpec {
    manage(python).args(["migrate", "--noinput"])
}

/// Scan installed packages for known vulnerabilities.
pub fn safety_check() -> CommandSpec {
    pipenv(["check"])
}

fn manage(python: &str) -> CommandSpec {
    CommandSpec::new(python).arg("manage.py")
}

fn exclude_tags(mut spec: CommandSpec) -> CommandSpec {
    for tag in EXCLUDED_TEST_TAGS {
        spec = spec.args(["--exclude-tag", tag]);
    }
    spec
}

fn with_settings(spec: CommandSpec, settings: Option<&str>) -> CommandSpec {
    match settings {
        Some(settings) => spec.args(["--settings", settings]),
        None => spec,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PY: &str = "/srv/app/.venv/bin/python";

    #[test]
    fn sync_uses_dev_packages_only_in_debug() {
        let [debug_sync, clean] = sync_packages(true);
        assert_eq!(debug_sync.args, vec!["sync", "--dev"]);
        assert_eq!(clean.args, vec!["clean"]);

        let [sync, _] = sync_packages(false);
        assert_eq!(sync.args, vec!["sync"]);
    }

    #[test]
    fn pipenv_keeps_virtualenv_in_project() {
        let [sync, clean] = sync_packages(false);
        for spec in [sync, clean, safety_check()] {
            assert!(
                spec.env
                    .contains(&("PIPENV_VENV_IN_PROJECT".to_string(), "1".to_string()))
            );
            assert!(
                spec.env
                    .contains(&("PIP_NO_BINARY".to_string(), "psycopg2".to_string()))
            );
        }
    }

    #[test]
    fn collect_static_dry_run_flag() {
        assert_eq!(
            collect_static(PY, true).command_line(),
            format!("{PY} manage.py collectstatic --noinput -v 0 --dry-run")
        );
        assert!(!collect_static(PY, false).has_arg("--dry-run"));
    }

    #[test]
    fn first_test_attempt_keeps_database() {
        let spec = test_first_attempt(PY, None);
        assert_eq!(
            spec.command_line(),
            format!(
                "{PY} manage.py test -k --exclude-tag slow --exclude-tag selenium --noinput"
            )
        );
        assert_eq!(spec.stdin, None);
    }

    #[test]
    fn retry_answers_prompt_and_passes_settings() {
        let spec = test_retry(PY, Some("project.test_settings"));
        assert_eq!(
            spec.args,
            vec![
                "manage.py",
                "test",
                "--exclude-tag",
                "slow",
                "--exclude-tag",
                "selenium",
                "--settings",
                "project.test_settings",
            ]
        );
        assert_eq!(spec.stdin.as_deref(), Some(FRESH_DATABASE_ANSWER));
    }

    #[test]
    fn migrate_is_non_interactive() {
        assert_eq!(migrate(PY).args, vec!["manage.py", "migrate", "--noinput"]);
    }
}
