//! Log source layer for SENTINEL Surge.
//!
//! Reduces the watched access log to the feed the detector consumes:
//! (address, time-bucket label) records in file order. Access logs are
//! written in arrival order, which is what gives the detector its
//! non-decreasing label guarantee.
//!
//! Copyright (c) 2026 CIPS Corps. All rights reserved.

pub mod web_log;

use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// One feed record: who made a request, and in which time unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessLogRecord {
    /// Source address as it appeared in the log.
    pub address: String,

    /// Time-unit label: epoch seconds floored to the bucket granularity.
    pub label: i64,
}

/// Tracks the byte offset of our last read position in the watched log so
/// each poll only reads new lines. Handles file rotation (file shrinks)
/// by resetting the offset.
pub struct LogTailer {
    path: PathBuf,
    offset: u64,
}

impl LogTailer {
    /// Tail the file starting from its beginning. The first
    /// `read_new_lines` call returns the whole file - batch mode is just
    /// one poll from offset 0.
    pub fn new(path: PathBuf) -> Self {
        Self { path, offset: 0 }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move the offset to the current end of file so that the next poll
    /// only returns lines written after this point. Call at follow-mode
    /// startup. A file that doesn't exist yet starts from 0 when it appears.
    pub fn seek_to_end(&mut self) {
        match std::fs::metadata(&self.path) {
            Ok(m) => {
                self.offset = m.len();
            }
            Err(_) => {
                self.offset = 0;
            }
        }
    }

    /// Read new lines since our last read position and advance the offset.
    ///
    /// Handles:
    /// - Missing files: logs a warning and returns an empty vec.
    /// - File rotation (file shrinks below our offset): resets to 0 and
    ///   reads from the start.
    /// - Normal growth: reads from the last offset to the current end.
    pub fn read_new_lines(&mut self) -> Vec<String> {
        let metadata = match std::fs::metadata(&self.path) {
            Ok(m) => m,
            Err(e) => {
                log::warn!("Cannot stat log file {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };

        let file_size = metadata.len();
        let read_from = if file_size < self.offset {
            log::info!(
                "File rotation detected for {} (size {} < offset {}), resetting",
                self.path.display(),
                file_size,
                self.offset,
            );
            0
        } else if file_size == self.offset {
            // No new data
            return Vec::new();
        } else {
            self.offset
        };

        let file = match std::fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) => {
                log::warn!("Cannot open log file {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };

        let mut reader = BufReader::new(file);
        if let Err(e) = reader.seek(SeekFrom::Start(read_from)) {
            log::warn!("Cannot seek in {}: {}", self.path.display(), e);
            return Vec::new();
        }

        let mut lines = Vec::new();
        let mut current_offset = read_from;

        loop {
            let mut line = String::new();
            match reader.read_line(&mut line) {
                Ok(0) => break, // EOF
                Ok(bytes_read) => {
                    current_offset += bytes_read as u64;
                    let trimmed = line.trim_end_matches(['\n', '\r']);
                    if !trimmed.is_empty() {
                        lines.push(trimmed.to_string());
                    }
                }
                Err(e) => {
                    log::warn!("Read error in {}: {}", self.path.display(), e);
                    break;
                }
            }
        }

        self.offset = current_offset;
        lines
    }
}
