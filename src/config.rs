//! Configuration management and validation.
//!
//! `ParserConfig` holds the tunables shared by every parse on one parser
//! instance; `ParseOptions` holds the per-call overrides (forced header/data
//! lines, encoding, delimiter, row cap, validation rules).

use crate::constants::*;
use crate::error::{ParserError, Result};
use crate::models::{Delimiter, TextEncoding};
use crate::validation::ValidationRules;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Tunables for a parser instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Candidate encodings, tried in order
    pub encodings: Vec<TextEncoding>,

    /// Leading bytes each encoding candidate must decode
    pub encoding_probe_bytes: usize,

    /// Candidate delimiters, in tie-break order
    pub delimiters: Vec<Delimiter>,

    /// Non-empty lines sampled by the delimiter prober
    pub delimiter_sample_lines: usize,

    /// Share of sniffed fields that must be numeric for a data line
    pub numeric_threshold: f64,

    /// Minimum field count of a data line
    pub min_data_fields: usize,

    /// Leading fields inspected by the numeric sniffer
    pub sniff_fields: usize,

    /// Leading lines scanned for preamble metadata
    pub metadata_scan_lines: usize,

    /// Data lines between progress signals (0 silences progress)
    pub progress_interval: usize,

    /// Draw a progress bar for large data regions
    pub show_progress_bar: bool,

    /// Keys lifted from the preamble into the metadata record
    pub metadata_keys: Vec<String>,

    /// Keys that mark per-column attribute lines
    pub attribute_keys: Vec<String>,

    /// Cell tokens mapped to the missing-value sentinel
    pub missing_tokens: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            encodings: vec![
                TextEncoding::Utf8,
                TextEncoding::Latin1,
                TextEncoding::Cp1252,
                TextEncoding::Iso8859_1,
            ],
            encoding_probe_bytes: ENCODING_PROBE_BYTES,
            delimiters: DEFAULT_DELIMITERS.iter().copied().map(Delimiter::new).collect(),
            delimiter_sample_lines: DELIMITER_SAMPLE_LINES,
            numeric_threshold: NUMERIC_THRESHOLD,
            min_data_fields: MIN_DATA_FIELDS,
            sniff_fields: SNIFF_FIELDS,
            metadata_scan_lines: METADATA_SCAN_LINES,
            progress_interval: PROGRESS_INTERVAL,
            show_progress_bar: false,
            metadata_keys: METADATA_KEYS.iter().map(|k| k.to_string()).collect(),
            attribute_keys: ATTRIBUTE_KEYS.iter().map(|k| k.to_string()).collect(),
            missing_tokens: MISSING_TOKENS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl ParserConfig {
    /// Load a configuration file; absent fields keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ParserError::from_io(path, e))?;
        let config: ParserConfig = serde_json::from_str(&content)?;
        config.validate()?;
        debug!("Loaded parser configuration from {}", path.display());
        Ok(config)
    }

    /// Check that the tunables are usable
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.numeric_threshold) {
            return Err(ParserError::configuration(format!(
                "numeric_threshold must be within 0..=1, got {}",
                self.numeric_threshold
            )));
        }
        if self.delimiters.is_empty() {
            return Err(ParserError::configuration(
                "at least one candidate delimiter is required",
            ));
        }
        if self.sniff_fields == 0 {
            return Err(ParserError::configuration("sniff_fields must be positive"));
        }
        Ok(())
    }

    /// Set the candidate encodings
    pub fn with_encodings(mut self, encodings: Vec<TextEncoding>) -> Self {
        self.encodings = encodings;
        self
    }

    /// Set the candidate delimiters
    pub fn with_delimiters(mut self, delimiters: Vec<Delimiter>) -> Self {
        self.delimiters = delimiters;
        self
    }

    /// Set the numeric sniffing threshold
    pub fn with_numeric_threshold(mut self, threshold: f64) -> Self {
        self.numeric_threshold = threshold;
        self
    }

    /// Set the minimum data-line field count
    pub fn with_min_data_fields(mut self, fields: usize) -> Self {
        self.min_data_fields = fields;
        self
    }

    /// Set the delimiter sample window
    pub fn with_delimiter_sample_lines(mut self, lines: usize) -> Self {
        self.delimiter_sample_lines = lines;
        self
    }

    /// Set the progress interval (0 silences progress)
    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Enable the progress bar for large data regions
    pub fn with_progress_bar(mut self) -> Self {
        self.show_progress_bar = true;
        self
    }

    /// Add a recognised preamble key
    pub fn with_metadata_key(mut self, key: impl Into<String>) -> Self {
        self.metadata_keys.push(key.into());
        self
    }

    /// Add a recognised attribute key
    pub fn with_attribute_key(mut self, key: impl Into<String>) -> Self {
        self.attribute_keys.push(key.into());
        self
    }

    pub fn is_metadata_key(&self, key: &str) -> bool {
        self.metadata_keys.iter().any(|k| k == key)
    }

    /// Attribute keys match on their base name, so `SampleTime[ms]` is `SampleTime`
    pub fn is_attribute_key(&self, key: &str) -> bool {
        let base = key.split('[').next().unwrap_or(key).trim();
        self.attribute_keys.iter().any(|k| k == base)
    }

    pub fn is_missing_token(&self, cell: &str) -> bool {
        let trimmed = cell.trim();
        self.missing_tokens.iter().any(|token| token == trimmed)
    }
}

/// Per-call overrides for `parse_complex_csv`
///
/// `header_line` and `data_start_line` are 1-based, matching the line numbers
/// shown by text editors.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    pub header_line: Option<usize>,
    pub data_start_line: Option<usize>,
    pub encoding: Option<TextEncoding>,
    pub delimiter: Option<Delimiter>,
    pub max_rows: Option<usize>,
    pub validation: Option<ValidationRules>,
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force the column-header line (1-based)
    pub fn with_header_line(mut self, line: usize) -> Self {
        self.header_line = Some(line);
        self
    }

    /// Force the first data line (1-based)
    pub fn with_data_start_line(mut self, line: usize) -> Self {
        self.data_start_line = Some(line);
        self
    }

    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn with_delimiter(mut self, delimiter: Delimiter) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    pub fn with_validation(mut self, rules: ValidationRules) -> Self {
        self.validation = Some(rules);
        self
    }

    /// Reject 0 as a 1-based line index
    pub fn validate(&self) -> Result<()> {
        if self.header_line == Some(0) {
            return Err(ParserError::invalid_option(
                "header_line",
                "line indices are 1-based; 0 is not a line",
            ));
        }
        if self.data_start_line == Some(0) {
            return Err(ParserError::invalid_option(
                "data_start_line",
                "line indices are 1-based; 0 is not a line",
            ));
        }
        if let (Some(header), Some(data)) = (self.header_line, self.data_start_line) {
            if data <= header {
                return Err(ParserError::invalid_option(
                    "data_start_line",
                    format!("must follow header_line {} (got {})", header, data),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_matches_constants() {
        let config = ParserConfig::default();
        assert_eq!(config.encodings.len(), DEFAULT_ENCODINGS.len());
        for (encoding, name) in config.encodings.iter().zip(DEFAULT_ENCODINGS) {
            assert_eq!(encoding.name(), *name);
        }
        assert_eq!(config.delimiters[0], Delimiter::TAB);
        assert_eq!(config.numeric_threshold, 0.7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_attribute_key_matches_base_name() {
        let config = ParserConfig::default();
        assert!(config.is_attribute_key("SampleTime[ms]"));
        assert!(config.is_attribute_key("Data-Type"));
        assert!(!config.is_attribute_key("Name"));
    }

    #[test]
    fn test_partial_config_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"numeric_threshold": 0.5, "min_data_fields": 3}}"#).unwrap();

        let config = ParserConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.numeric_threshold, 0.5);
        assert_eq!(config.min_data_fields, 3);
        assert_eq!(config.delimiter_sample_lines, DELIMITER_SAMPLE_LINES);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let config = ParserConfig::default().with_numeric_threshold(1.5);
        assert!(matches!(
            config.validate(),
            Err(ParserError::Configuration { .. })
        ));
    }

    #[test]
    fn test_zero_line_index_rejected() {
        assert!(ParseOptions::new().with_header_line(0).validate().is_err());
        assert!(ParseOptions::new().with_data_start_line(0).validate().is_err());
        assert!(ParseOptions::new()
            .with_header_line(3)
            .with_data_start_line(3)
            .validate()
            .is_err());
        assert!(ParseOptions::new()
            .with_header_line(3)
            .with_data_start_line(5)
            .validate()
            .is_ok());
    }
}
