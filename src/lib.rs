//! Scope CSV Library
//!
//! An adaptive parser for the multi-section text exports written by PLC
//! measurement and oscilloscope tools: a free-form preamble of `key, value`
//! lines, an interleaved `Name, col, Name, col, ...` header, attribute lines
//! describing each column, and a numeric data block.
//!
//! This library provides tools for:
//! - Probing the text encoding and field delimiter of an unknown export
//! - Locating the column-header line and first data line without a schema
//! - Extracting preamble metadata into a flat record
//! - Building a typed, rectangular table with optional per-column validation
//! - Recording a per-instance parsing history and exporting it as JSON
//!
//! ```no_run
//! use scope_csv::{ComplexCsvParser, ParseOptions};
//! use std::path::Path;
//!
//! # fn main() -> scope_csv::Result<()> {
//! let mut parser = ComplexCsvParser::new();
//! let outcome = parser.parse_complex_csv(Path::new("trace.csv"), &ParseOptions::new())?;
//! println!("{:?}", outcome.table.shape());
//! parser.export_parsing_report(Path::new("report.json"))?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod delimiter;
pub mod encoding;
pub mod error;
pub mod metadata;
pub mod models;
pub mod parser;
pub mod progress;
pub mod report;
pub mod structure;
pub mod table;
pub mod validation;

// CLI modules
pub mod cli;

// Re-export commonly used types
pub use config::{ParseOptions, ParserConfig};
pub use error::{ParserError, Result};
pub use models::{
    Column, ColumnValues, DataLayout, DataTable, Delimiter, ElementType, MetadataRecord,
    ParseState, ParsingOutcome, RegionKind, StructureInfo, TextEncoding,
};
pub use parser::{ComplexCsvParser, SharedParser};
pub use report::{HistoryEntry, ParsingReport, ReportSummary};
pub use validation::{ValidationRule, ValidationRules};
