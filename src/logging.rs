//! Tracing subscriber setup.
//!
//! Logs go to stdout by default. When `logging.file` is set, the file is
//! rotated on startup (`agent.log` → `agent.log.1` → … keeping 3) and written
//! through a line-flushing writer so nothing is lost if the process dies.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

use crate::config::{expand_tilde, LogFormat, LoggingConfig};

/// Rotated log files kept next to the live one.
const KEEP_ROTATED: u32 = 3;

/// Install the global subscriber. Fails if one is already installed.
pub fn init_tracing(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let log_path = config.file.as_deref().map(|p| PathBuf::from(expand_tilde(p)));
    let writer = match &log_path {
        Some(path) => BoxMakeWriter::new(open_log_file(path)?),
        None => BoxMakeWriter::new(std::io::stdout),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(false);

    let installed = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.with_ansi(log_path.is_none()).try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_file = ?log_path.as_ref().map(|p| p.display().to_string()),
        pid = std::process::id(),
        "=== fuse-agent starting ==="
    );
    Ok(())
}

fn open_log_file(path: &Path) -> anyhow::Result<FlushingWriter> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    }
    rotate_log_file(path, KEEP_ROTATED);

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    Ok(FlushingWriter::new(file))
}

/// Shift `path` → `path.1` → … → `path.{keep}`, dropping the oldest.
///
/// Missing files in the chain are skipped.
fn rotate_log_file(path: &Path, keep: u32) {
    let numbered = |n: u32| PathBuf::from(format!("{}.{n}", path.display()));

    let _ = std::fs::remove_file(numbered(keep));
    for i in (1..keep).rev() {
        let _ = std::fs::rename(numbered(i), numbered(i + 1));
    }
    if path.exists() {
        let _ = std::fs::rename(path, numbered(1));
    }
}

/// A shared file handle that flushes after every write.
#[derive(Clone)]
struct FlushingWriter {
    file: Arc<Mutex<File>>,
}

impl FlushingWriter {
    fn new(file: File) -> Self {
        Self {
            file: Arc::new(Mutex::new(file)),
        }
    }

    fn with_file<T>(&self, f: impl FnOnce(&mut File) -> std::io::Result<T>) -> std::io::Result<T> {
        let mut guard = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        f(&mut guard)
    }
}

impl Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.with_file(|file| {
            let n = file.write(buf)?;
            file.flush()?;
            Ok(n)
        })
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.with_file(|file| file.flush())
    }
}

impl<'a> MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_shifts_and_drops_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("agent.log");
        std::fs::write(&log, "current").unwrap();
        std::fs::write(dir.path().join("agent.log.1"), "one").unwrap();
        std::fs::write(dir.path().join("agent.log.3"), "three").unwrap();

        rotate_log_file(&log, 3);

        assert!(!log.exists());
        let read = |name: &str| std::fs::read_to_string(dir.path().join(name)).unwrap();
        assert_eq!(read("agent.log.1"), "current");
        assert_eq!(read("agent.log.2"), "one");
        assert!(!dir.path().join("agent.log.3").exists());
    }

    #[test]
    fn test_flushing_writer_writes_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("agent.log");
        let mut writer = open_log_file(&path).unwrap();

        writer.write_all(b"line one\n").unwrap();
        let mut clone = writer.make_writer();
        clone.write_all(b"line two\n").unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "line one\nline two\n"
        );
    }
}
