//! Application constants for the scope-export parser
//!
//! Default tunables, candidate lists and recognised key sets. Every value here
//! is the default of a `ParserConfig` field and can be overridden per parser.

// =============================================================================
// Encoding and Delimiter Probing
// =============================================================================

/// Candidate encoding names, tried in this order
pub const DEFAULT_ENCODINGS: &[&str] = &["utf-8", "latin-1", "cp1252", "iso-8859-1"];

/// Number of leading bytes an encoding candidate must decode
pub const ENCODING_PROBE_BYTES: usize = 1024;

/// Candidate delimiters, in tie-break order
pub const DEFAULT_DELIMITERS: &[char] = &['\t', ',', ';', '|'];

/// Number of non-empty lines sampled for delimiter scoring
pub const DELIMITER_SAMPLE_LINES: usize = 10;

// =============================================================================
// Structure Analysis
// =============================================================================

/// Literal first field of a column-header line
pub const HEADER_TOKEN: &str = "Name";

/// Share of sniffed fields that must be numeric for a data line
pub const NUMERIC_THRESHOLD: f64 = 0.7;

/// Minimum number of fields on a data line
pub const MIN_DATA_FIELDS: usize = 5;

/// Number of leading fields inspected by the numeric sniffer
pub const SNIFF_FIELDS: usize = 10;

/// Upper bound on the length of an unrecognised metadata key
pub const MAX_METADATA_KEY_LEN: usize = 32;

// =============================================================================
// Metadata Extraction
// =============================================================================

/// Number of leading lines scanned for preamble metadata
pub const METADATA_SCAN_LINES: usize = 10;

/// Keys lifted from the preamble into the metadata record
pub const METADATA_KEYS: &[&str] = &[
    "Name",
    "File",
    "Start",
    "Starttime",
    "StartTime",
    "Endtime",
    "EndTime",
    "Data-Type",
    "SampleTime",
    "SymbolComment",
    "VariableSize",
    "Comment",
    "Version",
    "Machine",
    "Operator",
];

/// Keys that mark a per-column attribute line
pub const ATTRIBUTE_KEYS: &[&str] = &[
    "SymbolComment",
    "Data-Type",
    "SampleTime",
    "VariableSize",
    "SymbolBased",
    "IndexGroup",
    "IndexOffset",
    "SymbolName",
    "NetID",
    "Port",
    "Offset",
    "ScaleFactor",
    "BitMask",
    "Unit",
];

/// Attribute carrying the declared element type
pub const DATA_TYPE_ATTRIBUTE: &str = "Data-Type";

/// Derived metadata keys injected by the extractor
pub mod derived_keys {
    pub const TOTAL_LINES: &str = "total_lines";
    pub const ENCODING: &str = "encoding";
    pub const DELIMITER: &str = "delimiter";
    pub const ANALYSIS_TIMESTAMP: &str = "analysis_timestamp";
}

// =============================================================================
// Table Building
// =============================================================================

/// Cell tokens mapped to the missing-value sentinel
pub const MISSING_TOKENS: &[&str] = &["", "NaN", "nan", "NA", "null"];

/// Data lines between two progress signals
pub const PROGRESS_INTERVAL: usize = 1000;
