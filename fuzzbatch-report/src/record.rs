//! Fuzzer Stats Records
//!
//! A fuzzer periodically rewrites a plain-text status file in its output
//! directory, one `key : value` pair per line:
//!
//! ```text
//! start_time        : 1700000000
//! execs_per_sec     : 1523.12
//! bitmap_cvg        : 4.37%
//! command_line      : afl-fuzz -i in -o out -- ./target
//! ```
//!
//! Percent signs are cosmetic and removed on read.

use crate::ReportError;
use std::collections::BTreeMap;
use std::path::Path;

/// Field values from one run's stats file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsRecord {
    fields: BTreeMap<String, String>,
}

impl StatsRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the contents of a stats file
    ///
    /// Each line is split on its first colon. Lines without a colon (banners,
    /// blank lines) are ignored, and a key seen twice keeps its last value.
    pub fn parse(content: &str) -> Self {
        let mut record = Self::new();
        for line in content.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            record.insert(key, value.replace('%', "").trim());
        }
        record
    }

    /// Insert or overwrite a field
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Raw value of a field
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Whether the field is present
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StatsRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (key, value) in iter {
            record.insert(key, value);
        }
        record
    }
}

/// Read and parse `<output_dir>/<file_name>`
///
/// A missing file is reported as [`ReportError::MissingReport`] so callers
/// can tell "the run never wrote stats" apart from other I/O failures.
pub fn parse_stats_file(
    output_dir: impl AsRef<Path>,
    file_name: &str,
) -> Result<StatsRecord, ReportError> {
    let path = output_dir.as_ref().join(file_name);
    match std::fs::read_to_string(&path) {
        Ok(content) => Ok(StatsRecord::parse(&content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ReportError::MissingReport { path })
        }
        Err(source) => Err(ReportError::Io { path, source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_stripped() {
        let record = StatsRecord::parse("unique_crashes: 3%\nbitmap_cvg : 87.5%\n");
        assert_eq!(record.get("unique_crashes"), Some("3"));
        assert_eq!(record.get("bitmap_cvg"), Some("87.5"));
    }

    #[test]
    fn test_lines_without_colon_ignored() {
        let record = StatsRecord::parse("american fuzzy lop\n\nexecs_per_sec : 100.0\n   \n");
        assert_eq!(record.len(), 1);
        assert_eq!(record.get("execs_per_sec"), Some("100.0"));
    }

    #[test]
    fn test_split_on_first_colon_only() {
        let record = StatsRecord::parse("command_line : afl-fuzz -i in -o out -- ./t host:80\n");
        assert_eq!(
            record.get("command_line"),
            Some("afl-fuzz -i in -o out -- ./t host:80")
        );

        let record = StatsRecord::parse("last_update: 12:30:00\n");
        assert_eq!(record.get("last_update"), Some("12:30:00"));
    }

    #[test]
    fn test_duplicate_key_last_wins() {
        let record = StatsRecord::parse("paths_total : 10\npaths_total : 12\n");
        assert_eq!(record.get("paths_total"), Some("12"));
    }

    #[test]
    fn test_empty_key_and_value() {
        let record = StatsRecord::parse(": orphan\nempty_value :\n");
        assert!(!record.contains(""));
        assert_eq!(record.get("empty_value"), Some(""));
    }

    #[test]
    fn test_parse_stats_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("fuzzer_stats"),
            "paths_total : 42\nunique_hangs : 0\n",
        )
        .unwrap();

        let record = parse_stats_file(dir.path(), "fuzzer_stats").unwrap();
        assert_eq!(record.get("paths_total"), Some("42"));
        assert_eq!(record.get("unique_hangs"), Some("0"));
    }

    #[test]
    fn test_missing_stats_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = parse_stats_file(dir.path(), "fuzzer_stats").unwrap_err();
        match err {
            ReportError::MissingReport { path } => {
                assert_eq!(path, dir.path().join("fuzzer_stats"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
