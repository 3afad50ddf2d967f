//! Parsing history and the persisted parsing report.

use crate::error::{ParserError, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// One parse call, recorded after the parse reached a terminal state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub source_path: PathBuf,
    pub timestamp: DateTime<Local>,
    pub success: bool,
    pub rows_parsed: usize,
    pub columns_found: usize,
}

impl HistoryEntry {
    pub fn new(source_path: &Path, success: bool, rows_parsed: usize, columns_found: usize) -> Self {
        Self {
            source_path: source_path.to_path_buf(),
            timestamp: Local::now(),
            success,
            rows_parsed,
            columns_found,
        }
    }
}

/// Totals over a parsing history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_files_parsed: usize,
    pub successful_parses: usize,
    pub failed_parses: usize,
    pub total_rows_processed: usize,
    pub report_generated: DateTime<Local>,
}

impl ReportSummary {
    pub fn from_history(history: &[HistoryEntry]) -> Self {
        let successful_parses = history.iter().filter(|entry| entry.success).count();
        Self {
            total_files_parsed: history.len(),
            successful_parses,
            failed_parses: history.len() - successful_parses,
            total_rows_processed: history.iter().map(|entry| entry.rows_parsed).sum(),
            report_generated: Local::now(),
        }
    }

    /// Successful parses as a percentage of all parses
    pub fn success_rate(&self) -> f64 {
        if self.total_files_parsed == 0 {
            0.0
        } else {
            (self.successful_parses as f64 / self.total_files_parsed as f64) * 100.0
        }
    }
}

/// The JSON document written by `export_parsing_report`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsingReport {
    pub summary: ReportSummary,
    pub parsing_history: Vec<HistoryEntry>,
}

impl ParsingReport {
    pub fn new(history: &[HistoryEntry]) -> Self {
        Self {
            summary: ReportSummary::from_history(history),
            parsing_history: history.to_vec(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as pretty-printed JSON
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let report_error = |source: std::io::Error| ParserError::ReportWrite {
            path: path.to_path_buf(),
            source,
        };
        let mut body = serde_json::to_vec_pretty(self)?;
        body.push(b'\n');

        let mut file = File::create(path).map_err(report_error)?;
        file.write_all(&body).map_err(report_error)?;
        file.flush().map_err(report_error)?;

        info!(
            "Wrote parsing report for {} files to {}",
            self.summary.total_files_parsed,
            path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn history() -> Vec<HistoryEntry> {
        vec![
            HistoryEntry::new(Path::new("a.csv"), true, 100, 4),
            HistoryEntry::new(Path::new("b.csv"), true, 50, 2),
            HistoryEntry::new(Path::new("c.csv"), false, 0, 0),
        ]
    }

    #[test]
    fn test_summary_totals() {
        let summary = ReportSummary::from_history(&history());
        assert_eq!(summary.total_files_parsed, 3);
        assert_eq!(summary.successful_parses, 2);
        assert_eq!(summary.failed_parses, 1);
        assert_eq!(summary.total_rows_processed, 150);
        assert!((summary.success_rate() - 66.666).abs() < 0.01);
        assert_eq!(ReportSummary::from_history(&[]).success_rate(), 0.0);
    }

    #[test]
    fn test_report_json_shape() {
        let json = ParsingReport::new(&history()).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["summary"]["total_files_parsed"], 3);
        assert_eq!(value["parsing_history"].as_array().unwrap().len(), 3);
        assert_eq!(value["parsing_history"][1]["source_path"], "b.csv");
        assert_eq!(value["parsing_history"][2]["success"], false);
    }

    #[test]
    fn test_write_failure_is_report_error() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("missing").join("report.json");
        match ParsingReport::new(&history()).write_to(&target) {
            Err(ParserError::ReportWrite { path, .. }) => assert_eq!(path, target),
            other => panic!("expected ReportWrite, got {:?}", other),
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_write_after_open_is_report_error() {
        // Opening /dev/full succeeds; every write fails with ENOSPC
        let target = Path::new("/dev/full");
        match ParsingReport::new(&history()).write_to(target) {
            Err(ParserError::ReportWrite { path, .. }) => assert_eq!(path, target),
            other => panic!("expected ReportWrite, got {:?}", other),
        }
    }
}
