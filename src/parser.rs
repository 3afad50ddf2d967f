//! Parser facade.
//!
//! `ComplexCsvParser` drives one parse through probing, structure analysis,
//! metadata extraction and table building, and keeps the per-instance parsing
//! history that `export_parsing_report` persists.

use crate::config::{ParseOptions, ParserConfig};
use crate::delimiter::detect_from_lines;
use crate::encoding::{self, read_lines};
use crate::error::Result;
use crate::metadata::extract_metadata;
use crate::models::{
    DataTable, Delimiter, MetadataRecord, ParseState, ParsingOutcome, StructureInfo, TextEncoding,
};
use crate::report::{HistoryEntry, ParsingReport, ReportSummary};
use crate::structure::{StructureAnalysis, StructureAnalyzer};
use crate::table::build_table;
use chrono::Local;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Lines, analysis and structure info shared by `analyze_structure` and
/// `parse_complex_csv`
struct Analyzed {
    lines: Vec<String>,
    analysis: StructureAnalysis,
    structure: StructureInfo,
}

/// Adaptive parser for scope-style multi-section CSV exports
#[derive(Debug, Clone, Default)]
pub struct ComplexCsvParser {
    config: ParserConfig,
    history: Vec<HistoryEntry>,
}

impl ComplexCsvParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parser with custom tunables
    pub fn with_config(config: ParserConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            history: Vec::new(),
        })
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Probe the leading bytes of `path` for a text encoding
    pub fn detect_encoding(&self, path: &Path) -> Result<TextEncoding> {
        let probe = encoding::detect_encoding(
            path,
            &self.config.encodings,
            self.config.encoding_probe_bytes,
        )?;
        Ok(probe.encoding)
    }

    /// Score the candidate delimiters over the first `sample_lines` non-empty lines
    pub fn detect_delimiter(
        &self,
        path: &Path,
        encoding: TextEncoding,
        sample_lines: usize,
    ) -> Result<Delimiter> {
        crate::delimiter::detect_delimiter(path, encoding, &self.config.delimiters, sample_lines)
    }

    /// Probe and analyse `path` without building a table
    ///
    /// The returned structure info is in state `Analyzing` when both a header
    /// and a data start were found, `Failed` otherwise.
    pub fn analyze_structure(
        &self,
        path: &Path,
        encoding: Option<TextEncoding>,
        delimiter: Option<Delimiter>,
    ) -> Result<StructureInfo> {
        let options = ParseOptions {
            encoding,
            delimiter,
            ..ParseOptions::default()
        };
        let mut analyzed = self.probe_and_analyze(path, &options)?;
        if !analyzed.analysis.is_complete() {
            analyzed.structure.state = ParseState::Failed;
        }
        Ok(analyzed.structure)
    }

    /// Extract preamble metadata using an earlier structure analysis
    pub fn parse_metadata(&self, path: &Path, structure: &StructureInfo) -> Result<MetadataRecord> {
        crate::metadata::parse_metadata(path, structure, &self.config)
    }

    /// Parse a file into metadata, a typed table and structure diagnostics
    ///
    /// Only I/O failures and invalid options are errors. Every other outcome,
    /// including a file with no header, returns a value and appends one entry
    /// to the parsing history.
    pub fn parse_complex_csv(&mut self, path: &Path, options: &ParseOptions) -> Result<ParsingOutcome> {
        options.validate()?;
        debug!("Parsing {} ({:?})", path.display(), ParseState::Init);

        let Analyzed {
            lines,
            analysis,
            mut structure,
        } = self.probe_and_analyze(path, options)?;

        let metadata = extract_metadata(
            &lines,
            structure.encoding,
            structure.delimiter,
            analysis.header_index,
            &self.config,
            Local::now(),
        );

        let table = if analysis.is_complete() {
            transition(path, &mut structure, ParseState::Building);
            let build = build_table(
                &lines,
                &analysis,
                structure.delimiter,
                &self.config,
                options.max_rows,
                options.validation.as_ref(),
            );
            structure.skipped_rows = build.skipped_rows;
            structure.validation_violations = build.violations;
            structure.warnings.extend(build.warnings);

            let terminal = if build.table.num_rows() > 0 {
                ParseState::Done
            } else {
                ParseState::Empty
            };
            transition(path, &mut structure, terminal);
            build.table
        } else {
            transition(path, &mut structure, ParseState::Failed);
            DataTable::empty_with_columns(&analysis.columns)
        };

        structure.parsing_success = table.num_rows() > 0;
        let outcome = ParsingOutcome {
            metadata,
            table,
            structure,
        };
        self.record(path, &outcome);
        Ok(outcome)
    }

    /// Entries appended by this instance, in invocation order
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Totals over the current history
    pub fn summary(&self) -> ReportSummary {
        ReportSummary::from_history(&self.history)
    }

    /// Fold another instance's history into this one, ordered by timestamp
    pub fn merge_history(&mut self, other: &ComplexCsvParser) {
        self.history.extend(other.history.iter().cloned());
        self.history.sort_by_key(|entry| entry.timestamp);
    }

    /// Write the parsing report as JSON; the in-memory history is kept on failure
    pub fn export_parsing_report(&self, output_path: &Path) -> Result<()> {
        ParsingReport::new(&self.history).write_to(output_path)
    }

    fn probe_and_analyze(&self, path: &Path, options: &ParseOptions) -> Result<Analyzed> {
        let mut state = ParseState::Probing;
        debug!("{}: {:?}", path.display(), state);

        let (encoding, fallback) = match options.encoding {
            Some(forced) => (forced, false),
            None => {
                let probe = encoding::detect_encoding(
                    path,
                    &self.config.encodings,
                    self.config.encoding_probe_bytes,
                )?;
                (probe.encoding, probe.fallback)
            }
        };

        let decoded = read_lines(path, encoding)?;
        let delimiter = options.delimiter.unwrap_or_else(|| {
            detect_from_lines(
                &decoded.lines,
                &self.config.delimiters,
                self.config.delimiter_sample_lines,
            )
        });

        let mut structure = StructureInfo::new(encoding, delimiter);
        structure.encoding_fallback = fallback;
        if fallback {
            structure.warnings.push(format!(
                "no candidate encoding decoded the file cleanly; using {} with replacement",
                encoding
            ));
        }
        if decoded.replaced {
            structure
                .warnings
                .push(format!("undecodable bytes were replaced while decoding as {}", encoding));
        }

        state = ParseState::Analyzing;
        debug!(
            "{}: {:?} (encoding {}, delimiter {})",
            path.display(),
            state,
            encoding,
            delimiter.display_name()
        );

        let analysis = StructureAnalyzer::new(&self.config, delimiter).analyze(
            &decoded.lines,
            options.header_line.map(|line| line - 1),
            options.data_start_line.map(|line| line - 1),
        );
        analysis.apply_to(&mut structure);
        structure.state = state;

        Ok(Analyzed {
            lines: decoded.lines,
            analysis,
            structure,
        })
    }

    fn record(&mut self, path: &Path, outcome: &ParsingOutcome) {
        let rows = outcome.table.num_rows();
        let columns = outcome.table.num_columns();
        if outcome.is_success() {
            info!(
                "Parsed {}: {} rows x {} columns ({} skipped)",
                path.display(),
                rows,
                columns,
                outcome.structure.skipped_rows
            );
        } else {
            warn!(
                "No data rows parsed from {} (state {:?})",
                path.display(),
                outcome.structure.state
            );
        }
        self.history
            .push(HistoryEntry::new(path, outcome.is_success(), rows, columns));
    }
}

fn transition(path: &Path, structure: &mut StructureInfo, next: ParseState) {
    debug!("{}: {:?} -> {:?}", path.display(), structure.state, next);
    structure.state = next;
}

/// A parser shared across threads; parses are serialized by a mutex
#[derive(Debug, Default)]
pub struct SharedParser {
    inner: Mutex<ComplexCsvParser>,
}

impl SharedParser {
    pub fn new(parser: ComplexCsvParser) -> Self {
        Self {
            inner: Mutex::new(parser),
        }
    }

    pub fn parse_complex_csv(&self, path: &Path, options: &ParseOptions) -> Result<ParsingOutcome> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .parse_complex_csv(path, options)
    }

    /// Snapshot of the shared history
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .history()
            .to_vec()
    }

    pub fn export_parsing_report(&self, output_path: &Path) -> Result<()> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .export_parsing_report(output_path)
    }

    pub fn into_inner(self) -> ComplexCsvParser {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}
