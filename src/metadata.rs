//! Preamble metadata extraction.
//!
//! Lifts recognised `key <delim> value` pairs from the leading lines of a
//! scope export into a flat metadata record and injects the parser-derived
//! entries (`total_lines`, `encoding`, `delimiter`, `analysis_timestamp`).

use crate::config::ParserConfig;
use crate::constants::derived_keys;
use crate::encoding::read_lines;
use crate::error::{ParserError, Result};
use crate::models::{Delimiter, MetadataRecord, StructureInfo, TextEncoding};
use chrono::{DateTime, Local};
use std::path::Path;
use tracing::{debug, trace};

/// Re-read a file and extract its metadata using an earlier structure analysis
pub fn parse_metadata(
    path: &Path,
    structure: &StructureInfo,
    config: &ParserConfig,
) -> Result<MetadataRecord> {
    let header_index = match structure.header_line {
        Some(0) => {
            return Err(ParserError::invalid_option(
                "header_line",
                "line indices are 1-based; 0 is not a line",
            ));
        }
        line => line.map(|line| line - 1),
    };
    let decoded = read_lines(path, structure.encoding)?;
    let metadata = extract_metadata(
        &decoded.lines,
        structure.encoding,
        structure.delimiter,
        header_index,
        config,
        Local::now(),
    );
    debug!(
        "Extracted {} metadata entries from {}",
        metadata.len(),
        path.display()
    );
    Ok(metadata)
}

/// Build the metadata record for a decoded file
///
/// Only the first `metadata_scan_lines` lines before the header line (0-based
/// `header_index`) are scanned. A file without lines yields an empty record.
pub fn extract_metadata(
    lines: &[String],
    encoding: TextEncoding,
    delimiter: Delimiter,
    header_index: Option<usize>,
    config: &ParserConfig,
    timestamp: DateTime<Local>,
) -> MetadataRecord {
    if lines.is_empty() {
        return MetadataRecord::new();
    }

    let window = config
        .metadata_scan_lines
        .min(lines.len())
        .min(header_index.unwrap_or(usize::MAX));

    let mut builder = MetadataBuilder::new(config, delimiter);
    for line in &lines[..window] {
        builder.parse_line(line);
    }
    builder.build(lines.len(), encoding, timestamp)
}

/// Accumulates preamble pairs; a repeated key keeps its last value
struct MetadataBuilder<'a> {
    config: &'a ParserConfig,
    delimiter: Delimiter,
    entries: MetadataRecord,
}

impl<'a> MetadataBuilder<'a> {
    fn new(config: &'a ParserConfig, delimiter: Delimiter) -> Self {
        Self {
            config,
            delimiter,
            entries: MetadataRecord::new(),
        }
    }

    fn parse_line(&mut self, line: &str) {
        let Some((key, value)) = line.split_once(self.delimiter.as_char()) else {
            return;
        };
        let key = key.trim();
        if !self.config.is_metadata_key(key) {
            return;
        }
        let value = value.trim();
        if let Some(previous) = self.entries.insert(key.to_string(), value.to_string()) {
            trace!("Metadata key '{}' overwritten (was '{}')", key, previous);
        }
    }

    fn build(
        mut self,
        total_lines: usize,
        encoding: TextEncoding,
        timestamp: DateTime<Local>,
    ) -> MetadataRecord {
        self.entries
            .insert(derived_keys::TOTAL_LINES.to_string(), total_lines.to_string());
        self.entries
            .insert(derived_keys::ENCODING.to_string(), encoding.name().to_string());
        self.entries.insert(
            derived_keys::DELIMITER.to_string(),
            self.delimiter.display_name(),
        );
        self.entries.insert(
            derived_keys::ANALYSIS_TIMESTAMP.to_string(),
            timestamp.to_rfc3339(),
        );
        self.entries
    }
}
