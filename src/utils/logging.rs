use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing_subscriber::EnvFilter;

/// Install the stderr subscriber. `RUST_LOG` overrides the `warn` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

/// Append-only log of prompts and the answers streamed for them.
pub struct TranscriptLog {
    file_path: Option<PathBuf>,
}

impl TranscriptLog {
    pub fn disabled() -> Self {
        Self { file_path: None }
    }

    /// Open (creating if needed) the log file, failing early when it is not
    /// writable.
    pub fn new(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            file_path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Write one `## heading` line followed by the body, then a blank line.
    pub fn log_entry(&self, heading: &str, body: &str) -> io::Result<()> {
        let Some(file_path) = &self.file_path else {
            return Ok(());
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "## {heading}")?;
        for line in body.lines() {
            writeln!(writer, "{line}")?;
        }
        writeln!(writer)?;
        writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn disabled_log_writes_nothing() {
        let log = TranscriptLog::disabled();
        assert!(log.path().is_none());
        log.log_entry("prompt", "ignored").expect("no-op");
    }

    #[test]
    fn entries_are_appended_in_order() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("chat.log");
        let log = TranscriptLog::new(&path).expect("log should open");

        log.log_entry("you", "hi").expect("write prompt");
        log.log_entry("answer (subtask 100)", "Hel\nlo").expect("write answer");

        let contents = std::fs::read_to_string(&path).expect("read log");
        assert_eq!(contents, "## you\nhi\n\n## answer (subtask 100)\nHel\nlo\n\n");
    }

    #[test]
    fn unwritable_path_fails_early() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("missing").join("chat.log");
        assert!(TranscriptLog::new(path).is_err());
    }
}
