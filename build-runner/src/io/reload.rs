//! Reload trigger for the application server.
//!
//! uWSGI (`touch-reload`) restarts its workers when the watched file's
//! modification time changes.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};

pub const RELOAD_TRIGGER: &str = "uwsgi.ini";

/// Create the file if missing and set its modification time to now.
pub fn touch(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))?;
    file.set_modified(SystemTime::now())
        .with_context(|| format!("set modification time of {}", path.display()))
}

/// Touch `<project>/uwsgi.ini` and return its path.
pub fn reload_webserver(project_path: &Path) -> Result<PathBuf> {
    let path = project_path.join(RELOAD_TRIGGER);
    touch(&path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use super::*;

    #[test]
    fn creates_missing_trigger() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = reload_webserver(temp.path()).expect("reload");
        assert_eq!(path, temp.path().join(RELOAD_TRIGGER));
        assert!(path.is_file());
    }

    #[test]
    fn bumps_modification_time_without_changing_contents() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(RELOAD_TRIGGER);
        fs::write(&path, "[uwsgi]\n").expect("write");
        let old = SystemTime::now() - Duration::from_secs(3600);
        OpenOptions::new()
            .append(true)
            .open(&path)
            .expect("open")
            .set_modified(old)
            .expect("backdate");

        touch(&path).expect("touch");

        let modified = fs::metadata(&path)
            .expect("metadata")
            .modified()
            .expect("mtime");
        assert!(modified > old + Duration::from_secs(1800));
        assert_eq!(fs::read_to_string(&path).expect("read"), "[uwsgi]\n");
    }
}
