//! Stable exit codes for build-runner commands.

use anyhow::Error;

use crate::core::types::CommandFailed;

/// Every step succeeded.
pub const OK: i32 = 0;
/// Invalid configuration, I/O or spawn errors; also used for commands killed
/// by a signal or a timeout.
pub const FAILURE: i32 = 1;

/// Exit code for a run that ended with `err`.
///
/// A failed command passes its own exit code through.
pub fn for_error(err: &Error) -> i32 {
    err.downcast_ref::<CommandFailed>()
        .map_or(FAILURE, |failure| failure.exit_code)
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;
    use crate::core::types::CommandSpec;

    #[test]
    fn command_failure_keeps_its_code() {
        let err = Error::new(CommandFailed {
            command: CommandSpec::new("pipenv").arg("sync"),
            exit_code: 42,
            timed_out: false,
            stdout: String::new(),
            stderr: String::new(),
        });
        assert_eq!(for_error(&err), 42);
    }

    #[test]
    fn other_errors_map_to_failure() {
        assert_eq!(for_error(&anyhow!("read config.ini")), FAILURE);
    }
}
