//! # Alert Sink
//!
//! Append-only destination for flagged addresses. The contract is one
//! address per line, nothing else - duplicates across successive scans are
//! expected and not suppressed, so downstream consumers (fail2ban feeds,
//! `tail -f`, ad-hoc grep) see every scan's verdict.
//!
//! The file is opened fresh for every write and closed immediately after,
//! so external readers can tail it safely and a crashed daemon never holds
//! it hostage.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::{SurgeError, SurgeResult};

/// Append-only alert destination.
pub struct AlertSink {
    path: PathBuf,
}

impl AlertSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one address to the alert log.
    ///
    /// Creates the file and parent directories if they don't exist. The
    /// open/write/flush/close cycle is scoped to this call; failures map to
    /// `SurgeError::Sink` with the destination path in the message and leave
    /// detector state untouched.
    pub fn record(&self, address: &str) -> SurgeResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| self.sink_error(e))?;
            }
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.sink_error(e))?;
        writeln!(file, "{}", address).map_err(|e| self.sink_error(e))?;
        file.flush().map_err(|e| self.sink_error(e))?;

        log::warn!("[ALERT] {}", address);
        Ok(())
    }

    fn sink_error(&self, e: std::io::Error) -> SurgeError {
        SurgeError::Sink(format!("{}: {}", self.path.display(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("sentinel_surge_alert_tests")
            .join(name);
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_record_creates_file_and_parents() {
        let dir = test_dir("creates");
        let path = dir.join("nested").join("alerts.log");
        let sink = AlertSink::new(path.clone());

        sink.record("203.0.113.50").unwrap();
        assert!(path.exists());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "203.0.113.50\n");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_record_appends_one_per_line() {
        let dir = test_dir("appends");
        let sink = AlertSink::new(dir.join("alerts.log"));

        sink.record("203.0.113.50").unwrap();
        sink.record("198.51.100.7").unwrap();
        sink.record("203.0.113.50").unwrap();

        let content = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            vec!["203.0.113.50", "198.51.100.7", "203.0.113.50"],
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_unwritable_destination_is_sink_error() {
        // A directory where the file should be forces the open to fail.
        let dir = test_dir("unwritable");
        let path = dir.join("alerts.log");
        std::fs::create_dir_all(&path).unwrap();
        let sink = AlertSink::new(path);

        let result = sink.record("203.0.113.50");
        assert!(matches!(result, Err(SurgeError::Sink(_))));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
