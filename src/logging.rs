//! Logging setup
//!
//! Foreground runs and CLI commands log to stderr. A detached daemon logs to
//! `$XDG_STATE_HOME/plugsw/daemon.log`, rotated by size with a single `.old`
//! backup, written from a background worker via `tracing_appender`.

use color_eyre::eyre::{self, Context, Result};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

/// Rotate the daemon log once it reaches this size
pub const MAX_LOG_BYTES: u64 = 1024 * 1024;

const LOG_FILE_NAME: &str = "daemon.log";

/// Size-limited log file keeping one previous generation
///
/// Owned by the `tracing_appender` worker thread, so no locking is needed.
/// If the log file is deleted while open, the next write re-creates it.
pub struct RotatingFileAppender {
    path: PathBuf,
    backup_path: PathBuf,
    max_bytes: u64,
    file: Option<File>,
    written: u64,
}

impl RotatingFileAppender {
    pub fn new(dir: impl Into<PathBuf>, file_name: &str, max_bytes: u64) -> Self {
        let dir = dir.into();
        Self {
            path: dir.join(file_name),
            backup_path: dir.join(format!("{file_name}.old")),
            max_bytes,
            file: None,
            written: 0,
        }
    }

    fn open(path: &Path, truncate: bool) -> io::Result<File> {
        let mut options = fs::OpenOptions::new();
        options.create(true).write(true);
        if truncate {
            options.truncate(true);
        } else {
            options.append(true);
        }

        #[cfg(unix)]
        options.mode(0o600);

        options.open(path)
    }

    /// Current file handle, (re)opening it if needed
    fn file(&mut self) -> io::Result<&mut File> {
        if self.file.is_some() && !self.path.exists() {
            self.file = None;
        }

        if self.file.is_none() {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = Self::open(&self.path, false)?;
            self.written = file.metadata()?.len();
            self.file = Some(file);
        }

        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("log file unavailable"))
    }

    /// Move the current log to the backup slot and start an empty one
    fn rotate(&mut self) -> io::Result<()> {
        self.file = None;
        if self.path.exists() {
            fs::rename(&self.path, &self.backup_path)?;
        }
        self.file = Some(Self::open(&self.path, true)?);
        self.written = 0;
        Ok(())
    }
}

impl Write for RotatingFileAppender {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file()?;

        if self.written >= self.max_bytes
            && let Err(e) = self.rotate()
        {
            eprintln!("Failed to rotate log file: {e}");
        }

        self.file()?.write_all(buf)?;
        self.written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// Directory holding the daemon log
///
/// # Errors
/// Returns an error if neither a state nor a data directory can be determined.
pub fn log_dir() -> Result<PathBuf> {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .map(|dir| dir.join("plugsw"))
        .ok_or_else(|| eyre::eyre!("Could not determine log directory"))
}

/// Path of the daemon log file
///
/// # Errors
/// Returns an error if the log directory cannot be determined.
pub fn log_file_path() -> Result<PathBuf> {
    Ok(log_dir()?.join(LOG_FILE_NAME))
}

/// `RUST_LOG` if set, otherwise `plugsw=<level>`
fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("plugsw={level}")))
}

/// Log to stderr at `level` (overridable with `RUST_LOG`)
pub fn init_stderr(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(filter_for(level))
        .with_writer(io::stderr)
        .init();
}

/// Log to the rotating daemon log file
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes and stops the writer thread.
///
/// # Errors
/// Returns an error if the log directory cannot be determined or created.
pub fn init_file(level: &str) -> Result<WorkerGuard> {
    let dir = log_dir()?;
    fs::create_dir_all(&dir).wrap_err_with(|| format!("Failed to create log dir: {dir:?}"))?;

    let appender = RotatingFileAppender::new(&dir, LOG_FILE_NAME, MAX_LOG_BYTES);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter_for(level))
        .with_ansi(false)
        .with_writer(writer)
        .init();

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotates_after_limit() {
        let dir = tempfile::tempdir().unwrap();
        let mut appender = RotatingFileAppender::new(dir.path(), "test.log", 10);

        appender.write_all(b"0123456789").unwrap();
        appender.write_all(b"next").unwrap();
        appender.flush().unwrap();

        let current = fs::read_to_string(dir.path().join("test.log")).unwrap();
        let backup = fs::read_to_string(dir.path().join("test.log.old")).unwrap();
        assert_eq!(current, "next");
        assert_eq!(backup, "0123456789");
    }

    #[test]
    fn test_recreates_deleted_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut appender = RotatingFileAppender::new(dir.path(), "test.log", 1024);

        appender.write_all(b"first\n").unwrap();
        fs::remove_file(dir.path().join("test.log")).unwrap();
        appender.write_all(b"second\n").unwrap();
        appender.flush().unwrap();

        let current = fs::read_to_string(dir.path().join("test.log")).unwrap();
        assert_eq!(current, "second\n");
    }

    #[test]
    fn test_appends_to_existing_log() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("test.log"), b"old\n").unwrap();
        let mut appender = RotatingFileAppender::new(dir.path(), "test.log", 1024);

        appender.write_all(b"new\n").unwrap();
        appender.flush().unwrap();

        let current = fs::read_to_string(dir.path().join("test.log")).unwrap();
        assert_eq!(current, "old\nnew\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_log_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let mut appender = RotatingFileAppender::new(dir.path(), "test.log", 1024);
        appender.write_all(b"x").unwrap();

        let mode = fs::metadata(dir.path().join("test.log"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
