//! Command-line argument definitions for the scope-csv parser
//!
//! This module defines the CLI interface using the clap derive API. Every
//! per-call parse option is exposed as a flag; tunables and validation rules
//! come from JSON files.

use crate::config::ParseOptions;
use crate::error::{ParserError, Result};
use crate::models::{Delimiter, TextEncoding};
use crate::validation::ValidationRules;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// CLI arguments for the scope-export parser
///
/// Parses PLC scope and measurement exports (preamble, interleaved
/// `Name` header, attribute lines, numeric data) and reports what was found.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "scope-csv",
    version,
    about = "Parse multi-section scope CSV exports into metadata and typed tables",
    long_about = "Detects the encoding, delimiter, column-header line and first data line of \
                  scope-style CSV exports, extracts the preamble metadata and builds a typed \
                  table. Directories are searched recursively for files matching --pattern."
)]
pub struct Args {
    /// Files or directories to parse
    #[arg(value_name = "INPUT", required = true)]
    pub inputs: Vec<PathBuf>,

    /// File-name glob used when searching directories
    #[arg(
        short = 'p',
        long = "pattern",
        value_name = "GLOB",
        default_value = "*.csv",
        help = "File-name glob used when searching directories"
    )]
    pub pattern: String,

    /// Force the column-header line (1-based)
    #[arg(long = "header-line", value_name = "LINE")]
    pub header_line: Option<usize>,

    /// Force the first data line (1-based)
    #[arg(long = "data-start-line", value_name = "LINE")]
    pub data_start_line: Option<usize>,

    /// Force the text encoding (utf-8, latin-1, cp1252, iso-8859-1)
    #[arg(short = 'e', long = "encoding", value_name = "NAME")]
    pub encoding: Option<TextEncoding>,

    /// Force the delimiter (a single character, or tab/comma/semicolon/pipe)
    #[arg(short = 'd', long = "delimiter", value_name = "CHAR")]
    pub delimiter: Option<Delimiter>,

    /// Stop after this many data rows per file
    #[arg(short = 'n', long = "max-rows", value_name = "ROWS")]
    pub max_rows: Option<usize>,

    /// JSON file of per-column validation rules
    ///
    /// An object keyed by column name; each value may carry `min`, `max`,
    /// `allowed` (list of strings) and `pattern` (regular expression).
    #[arg(long = "rules", value_name = "FILE")]
    pub rules_file: Option<PathBuf>,

    /// JSON parser configuration file
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Write the parsing report to this path
    #[arg(short = 'r', long = "report", value_name = "FILE")]
    pub report_path: Option<PathBuf>,

    /// Output format for per-file results
    #[arg(long = "format", value_enum, default_value = "human")]
    pub output_format: OutputFormat,

    /// Shorthand for `--format json`
    #[arg(long = "json", conflicts_with = "output_format")]
    pub json: bool,

    /// Logging verbosity level
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Suppress output (quiet mode)
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Suppress output except errors",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,
}

/// Output format options for per-file results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON format for scripting
    Json,
}

impl Args {
    /// Get the log level based on verbosity and quiet flags
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }

    /// Effective output format
    pub fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.output_format
        }
    }

    /// Check if we should show the per-file progress bar
    pub fn show_progress(&self) -> bool {
        !self.quiet && self.output_format() == OutputFormat::Human
    }

    /// Validate the arguments for consistency
    pub fn validate(&self) -> Result<()> {
        for (name, path) in [("rules", &self.rules_file), ("config", &self.config_file)] {
            if let Some(path) = path {
                if !path.is_file() {
                    return Err(ParserError::configuration(format!(
                        "{} file does not exist: {}",
                        name,
                        path.display()
                    )));
                }
            }
        }
        glob::Pattern::new(&self.pattern).map_err(|e| {
            ParserError::invalid_option("pattern", format!("'{}': {}", self.pattern, e))
        })?;
        self.parse_options(None).validate()
    }

    /// Per-file parse options built from the flags
    pub fn parse_options(&self, validation: Option<ValidationRules>) -> ParseOptions {
        ParseOptions {
            header_line: self.header_line,
            data_start_line: self.data_start_line,
            encoding: self.encoding,
            delimiter: self.delimiter,
            max_rows: self.max_rows,
            validation,
        }
    }
}
