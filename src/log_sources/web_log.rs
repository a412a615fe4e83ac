//! Parser for Apache/Nginx combined access log format.
//!
//! Format: `IP - - [DD/Mon/YYYY:HH:MM:SS +ZZZZ] "METHOD /path HTTP/x.x" status size "referer" "user-agent"`
//!
//! Only the client address and the timestamp matter here; the request line
//! and status are validated by the regex and discarded. The timestamp is
//! floored to the configured bucket width to form the feed label.
//!
//! Copyright (c) 2026 CIPS Corps. All rights reserved.

use chrono::DateTime;
use regex::Regex;
use std::sync::LazyLock;

use crate::log_sources::AccessLogRecord;

// ---------------------------------------------------------------------------
// Compiled regexes (compiled once, used forever)
// ---------------------------------------------------------------------------

static RE_COMBINED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^(\S+) \S+ \S+ \[([^\]]+)\] "(\S+) (\S+) (\S+)" (\d{3}) (\S+) "([^"]*)" "([^"]*)""#,
    )
    .expect("regex")
});

/// Parses combined-format lines into feed records.
pub struct WebLogParser {
    /// Bucket granularity in seconds. Timestamps are floored to multiples
    /// of this to form labels.
    bucket_secs: i64,
}

impl WebLogParser {
    pub fn new(bucket_secs: i64) -> Self {
        Self { bucket_secs }
    }

    /// Parse one access log line.
    ///
    /// Returns `None` for lines that don't match the combined format or
    /// carry an unparseable timestamp - log files contain garbage, and a
    /// bad line is skipped, never fatal.
    pub fn parse_line(&self, line: &str) -> Option<AccessLogRecord> {
        let caps = RE_COMBINED.captures(line)?;
        let address = caps.get(1)?.as_str();
        let ts_str = caps.get(2)?.as_str();

        let timestamp = DateTime::parse_from_str(ts_str, "%d/%b/%Y:%H:%M:%S %z").ok()?;
        let epoch = timestamp.timestamp();

        Some(AccessLogRecord {
            address: address.to_string(),
            label: epoch - epoch.rem_euclid(self.bucket_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn combined_line(ip: &str, ts: &str) -> String {
        format!(
            r#"{} - - [{}] "GET /index.html HTTP/1.1" 200 1024 "-" "Mozilla/5.0""#,
            ip, ts,
        )
    }

    #[test]
    fn test_parses_address_and_floors_label() {
        let parser = WebLogParser::new(60);
        // 13:55:36 UTC on 10 Oct 2023 is epoch 1696946136; floored 1696946100.
        let line = combined_line("203.0.113.50", "10/Oct/2023:13:55:36 +0000");
        let record = parser.parse_line(&line).unwrap();
        assert_eq!(record.address, "203.0.113.50");
        assert_eq!(record.label, 1696946100);
        assert_eq!(record.label % 60, 0);
    }

    #[test]
    fn test_same_minute_same_label() {
        let parser = WebLogParser::new(60);
        let a = parser
            .parse_line(&combined_line("10.0.0.1", "10/Oct/2023:13:55:02 +0000"))
            .unwrap();
        let b = parser
            .parse_line(&combined_line("10.0.0.2", "10/Oct/2023:13:55:59 +0000"))
            .unwrap();
        assert_eq!(a.label, b.label);

        let c = parser
            .parse_line(&combined_line("10.0.0.3", "10/Oct/2023:13:56:00 +0000"))
            .unwrap();
        assert_eq!(c.label, a.label + 60);
    }

    #[test]
    fn test_timezone_offset_is_honored() {
        let parser = WebLogParser::new(60);
        let utc = parser
            .parse_line(&combined_line("10.0.0.1", "10/Oct/2023:13:55:00 +0000"))
            .unwrap();
        let cet = parser
            .parse_line(&combined_line("10.0.0.1", "10/Oct/2023:14:55:00 +0100"))
            .unwrap();
        assert_eq!(utc.label, cet.label);
    }

    #[test]
    fn test_garbage_lines_are_skipped() {
        let parser = WebLogParser::new(60);
        assert!(parser.parse_line("").is_none());
        assert!(parser.parse_line("not an access log line").is_none());
        assert!(parser
            .parse_line(&combined_line("10.0.0.1", "not/a/timestamp"))
            .is_none());
    }

    #[test]
    fn test_wider_bucket_granularity() {
        let parser = WebLogParser::new(300);
        let record = parser
            .parse_line(&combined_line("10.0.0.1", "10/Oct/2023:13:57:11 +0000"))
            .unwrap();
        assert_eq!(record.label % 300, 0);
    }
}
