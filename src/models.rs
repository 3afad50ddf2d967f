//! Core data structures for scope-export parsing.
//!
//! Defines the probing results (encoding, delimiter), the region map produced
//! by structure analysis, column descriptors, the typed data table and the
//! parsing outcome handed back to callers.

use crate::constants::derived_keys;
use crate::error::{ParserError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Keyed metadata record: unique string keys, plain string values
pub type MetadataRecord = BTreeMap<String, String>;

/// Byte-to-text mappings the encoding prober can choose from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextEncoding {
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "latin-1")]
    Latin1,
    #[serde(rename = "cp1252")]
    Cp1252,
    #[serde(rename = "iso-8859-1")]
    Iso8859_1,
}

impl TextEncoding {
    /// Canonical name used in metadata and reports
    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Latin1 => "latin-1",
            TextEncoding::Cp1252 => "cp1252",
            TextEncoding::Iso8859_1 => "iso-8859-1",
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TextEncoding {
    type Err = ParserError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "latin-1" | "latin1" | "l1" => Ok(TextEncoding::Latin1),
            "cp1252" | "windows-1252" => Ok(TextEncoding::Cp1252),
            "iso-8859-1" | "iso8859-1" => Ok(TextEncoding::Iso8859_1),
            other => Err(ParserError::invalid_option(
                "encoding",
                format!("unsupported encoding '{}'", other),
            )),
        }
    }
}

/// Single-character field separator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Delimiter(char);

impl Delimiter {
    pub const TAB: Delimiter = Delimiter('\t');
    pub const COMMA: Delimiter = Delimiter(',');
    pub const SEMICOLON: Delimiter = Delimiter(';');
    pub const PIPE: Delimiter = Delimiter('|');

    pub fn new(character: char) -> Self {
        Delimiter(character)
    }

    pub fn as_char(&self) -> char {
        self.0
    }

    /// Readable form for the metadata record: `Tab` for TAB, the character otherwise
    pub fn display_name(&self) -> String {
        if self.0 == '\t' {
            "Tab".to_string()
        } else {
            self.0.to_string()
        }
    }

    /// Split a line on this delimiter without any unquoting
    pub fn split<'a>(&self, line: &'a str) -> Vec<&'a str> {
        line.split(self.0).collect()
    }
}

impl Default for Delimiter {
    fn default() -> Self {
        Delimiter::TAB
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

impl FromStr for Delimiter {
    type Err = ParserError;

    /// Accepts a single character or one of the names `tab`, `comma`,
    /// `semicolon`, `pipe` (case-insensitive)
    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "tab" | "\\t" => return Ok(Delimiter::TAB),
            "comma" => return Ok(Delimiter::COMMA),
            "semicolon" => return Ok(Delimiter::SEMICOLON),
            "pipe" => return Ok(Delimiter::PIPE),
            _ => {}
        }
        let mut chars = value.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c != '\n' && c != '\r' => Ok(Delimiter(c)),
            _ => Err(ParserError::invalid_option(
                "delimiter",
                format!("expected a single character, got '{}'", value),
            )),
        }
    }
}

/// Region labels assigned by the structure analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegionKind {
    Preamble,
    HeaderBlock,
    AttributeBlock,
    Gap,
    Data,
}

/// Contiguous run of lines sharing one label (1-based, inclusive bounds)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub kind: RegionKind,
    pub start_line: usize,
    pub end_line: usize,
}

impl Region {
    pub fn line_count(&self) -> usize {
        self.end_line + 1 - self.start_line
    }

    pub fn contains(&self, line: usize) -> bool {
        (self.start_line..=self.end_line).contains(&line)
    }
}

/// Ordered partition of the decoded lines into labelled regions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionMap {
    pub regions: Vec<Region>,
}

impl RegionMap {
    /// Build the map from one label per line, merging equal neighbours
    pub fn from_labels(labels: &[RegionKind]) -> Self {
        let mut regions: Vec<Region> = Vec::new();
        for (index, &kind) in labels.iter().enumerate() {
            let line = index + 1;
            match regions.last_mut() {
                Some(last) if last.kind == kind => last.end_line = line,
                _ => regions.push(Region {
                    kind,
                    start_line: line,
                    end_line: line,
                }),
            }
        }
        Self { regions }
    }

    /// Label of a 1-based line, if the line exists
    pub fn kind_of(&self, line: usize) -> Option<RegionKind> {
        self.regions
            .iter()
            .find(|region| region.contains(line))
            .map(|region| region.kind)
    }

    /// Number of lines covered by the map
    pub fn line_count(&self) -> usize {
        self.regions.iter().map(Region::line_count).sum()
    }

    pub fn regions_of(&self, kind: RegionKind) -> impl Iterator<Item = &Region> {
        self.regions.iter().filter(move |region| region.kind == kind)
    }
}

/// Element type of a table column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Real,
    Integer,
    Text,
}

impl ElementType {
    /// Map a PLC `Data-Type` attribute value onto an element type
    pub fn from_declared(value: &str) -> Option<Self> {
        let upper = value.trim().to_ascii_uppercase();
        match upper.as_str() {
            "REAL" | "REAL32" | "REAL64" | "LREAL" | "FLOAT" | "DOUBLE" => Some(ElementType::Real),
            "STRING" | "WSTRING" | "TEXT" => Some(ElementType::Text),
            "BOOL" | "BIT" | "BYTE" | "WORD" | "DWORD" | "LWORD" | "SINT" | "USINT" | "INT"
            | "UINT" | "DINT" | "UDINT" | "LINT" | "ULINT" => Some(ElementType::Integer),
            _ if upper.starts_with("INT") || upper.starts_with("UINT") => {
                Some(ElementType::Integer)
            }
            _ => None,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ElementType::Real => "real",
            ElementType::Integer => "integer",
            ElementType::Text => "text",
        })
    }
}

/// Per-column description derived from the header and attribute block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Zero-based logical column position
    pub position: usize,
    pub name: String,
    /// Advisory type from the `Data-Type` attribute
    pub declared_type: Option<ElementType>,
    pub attributes: BTreeMap<String, String>,
}

/// How logical columns map onto the fields of a data line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataLayout {
    /// Column `i` is field `i`; extra fields are ignored
    Flat,
    /// Column `i` is field `2i + 1`, preceded by its own time field
    Interleaved,
}

impl DataLayout {
    /// Number of fields a line must carry to yield a row of `columns` cells
    pub fn fields_required(&self, columns: usize) -> usize {
        match self {
            DataLayout::Flat => columns,
            DataLayout::Interleaved => columns * 2,
        }
    }

    pub fn field_index(&self, column: usize) -> usize {
        match self {
            DataLayout::Flat => column,
            DataLayout::Interleaved => column * 2 + 1,
        }
    }
}

/// Typed cell storage; `None` is the missing-value sentinel in every variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "lowercase")]
pub enum ColumnValues {
    Real(Vec<Option<f64>>),
    Integer(Vec<Option<i64>>),
    Text(Vec<Option<String>>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Real(values) => values.len(),
            ColumnValues::Integer(values) => values.len(),
            ColumnValues::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            ColumnValues::Real(_) => ElementType::Real,
            ColumnValues::Integer(_) => ElementType::Integer,
            ColumnValues::Text(_) => ElementType::Text,
        }
    }

    pub fn missing_count(&self) -> usize {
        match self {
            ColumnValues::Real(values) => values.iter().filter(|v| v.is_none()).count(),
            ColumnValues::Integer(values) => values.iter().filter(|v| v.is_none()).count(),
            ColumnValues::Text(values) => values.iter().filter(|v| v.is_none()).count(),
        }
    }

    /// Numeric view of a cell (integers widen to f64)
    pub fn as_f64(&self, row: usize) -> Option<f64> {
        match self {
            ColumnValues::Real(values) => values.get(row).copied().flatten(),
            ColumnValues::Integer(values) => values.get(row).copied().flatten().map(|v| v as f64),
            ColumnValues::Text(_) => None,
        }
    }
}

/// Named column of the data table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: ColumnValues,
}

impl Column {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn element_type(&self) -> ElementType {
        self.values.element_type()
    }
}

/// Rectangular table with one column per column descriptor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataTable {
    pub columns: Vec<Column>,
    /// Time field of the first column in an interleaved export
    pub time_axis: Option<Vec<Option<f64>>>,
}

impl DataTable {
    /// Zero-row table with real-typed columns named `names`
    pub fn empty_with_columns(names: &[String]) -> Self {
        Self {
            columns: names
                .iter()
                .map(|name| Column {
                    name: name.clone(),
                    values: ColumnValues::Real(Vec::new()),
                })
                .collect(),
            time_axis: None,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.num_rows(), self.num_columns())
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|column| column.name.clone()).collect()
    }

    /// All columns (and the time axis, when present) share one length
    pub fn is_rectangular(&self) -> bool {
        let rows = self.num_rows();
        self.columns.iter().all(|column| column.len() == rows)
            && self.time_axis.as_ref().is_none_or(|time| time.len() == rows)
    }
}

/// Lifecycle of a single parse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParseState {
    Init,
    Probing,
    Analyzing,
    Building,
    Done,
    Empty,
    Failed,
}

impl ParseState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ParseState::Done | ParseState::Empty | ParseState::Failed)
    }
}

/// Machine-readable record of every parsing decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureInfo {
    pub total_lines: usize,
    pub encoding: TextEncoding,
    pub delimiter: Delimiter,
    /// True when no candidate encoding decoded cleanly
    pub encoding_fallback: bool,
    /// 1-based header candidate lines
    pub header_candidates: Vec<usize>,
    /// 1-based data candidate lines
    pub data_start_candidates: Vec<usize>,
    /// Recognised key -> 1-based lines where it occurs
    pub metadata_sections: BTreeMap<String, Vec<usize>>,
    /// Chosen header line (1-based)
    pub header_line: Option<usize>,
    /// Chosen first data line (1-based)
    pub data_start_line: Option<usize>,
    pub columns: Vec<String>,
    pub column_descriptors: Vec<ColumnDescriptor>,
    pub layout: DataLayout,
    pub regions: RegionMap,
    pub skipped_rows: usize,
    pub validation_violations: BTreeMap<String, usize>,
    pub warnings: Vec<String>,
    pub state: ParseState,
    pub parsing_success: bool,
}

impl StructureInfo {
    /// Structure info before any analysis has run
    pub fn new(encoding: TextEncoding, delimiter: Delimiter) -> Self {
        Self {
            total_lines: 0,
            encoding,
            delimiter,
            encoding_fallback: false,
            header_candidates: Vec::new(),
            data_start_candidates: Vec::new(),
            metadata_sections: BTreeMap::new(),
            header_line: None,
            data_start_line: None,
            columns: Vec::new(),
            column_descriptors: Vec::new(),
            layout: DataLayout::Flat,
            regions: RegionMap::default(),
            skipped_rows: 0,
            validation_violations: BTreeMap::new(),
            warnings: Vec::new(),
            state: ParseState::Init,
            parsing_success: false,
        }
    }
}

/// Result of one parse: metadata, table and diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsingOutcome {
    pub metadata: MetadataRecord,
    pub table: DataTable,
    pub structure: StructureInfo,
}

impl ParsingOutcome {
    pub fn is_success(&self) -> bool {
        self.structure.parsing_success
    }

    /// Equality that ignores the wall-clock `analysis_timestamp` entry
    pub fn eq_ignoring_timestamp(&self, other: &ParsingOutcome) -> bool {
        let strip = |metadata: &MetadataRecord| {
            let mut metadata = metadata.clone();
            metadata.remove(derived_keys::ANALYSIS_TIMESTAMP);
            metadata
        };
        strip(&self.metadata) == strip(&other.metadata)
            && self.table == other.table
            && self.structure == other.structure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_names_round_trip() {
        for encoding in [
            TextEncoding::Utf8,
            TextEncoding::Latin1,
            TextEncoding::Cp1252,
            TextEncoding::Iso8859_1,
        ] {
            assert_eq!(encoding.name().parse::<TextEncoding>().unwrap(), encoding);
        }
        assert_eq!("UTF8".parse::<TextEncoding>().unwrap(), TextEncoding::Utf8);
        assert!("ebcdic".parse::<TextEncoding>().is_err());
    }

    #[test]
    fn test_delimiter_parsing_and_display() {
        assert_eq!("tab".parse::<Delimiter>().unwrap(), Delimiter::TAB);
        assert_eq!(";".parse::<Delimiter>().unwrap(), Delimiter::SEMICOLON);
        assert!(";;".parse::<Delimiter>().is_err());
        assert!("".parse::<Delimiter>().is_err());
        assert_eq!(Delimiter::TAB.display_name(), "Tab");
        assert_eq!(Delimiter::PIPE.display_name(), "|");
    }

    #[test]
    fn test_region_map_merges_neighbours() {
        use RegionKind::*;
        let map = RegionMap::from_labels(&[Preamble, Preamble, Gap, HeaderBlock, Data, Data]);
        assert_eq!(map.regions.len(), 4);
        assert_eq!(map.line_count(), 6);
        assert_eq!(map.kind_of(2), Some(Preamble));
        assert_eq!(map.kind_of(4), Some(HeaderBlock));
        assert_eq!(map.kind_of(6), Some(Data));
        assert_eq!(map.kind_of(7), None);
    }

    #[test]
    fn test_declared_types() {
        assert_eq!(ElementType::from_declared("REAL64"), Some(ElementType::Real));
        assert_eq!(ElementType::from_declared("int16"), Some(ElementType::Integer));
        assert_eq!(ElementType::from_declared("BOOL"), Some(ElementType::Integer));
        assert_eq!(ElementType::from_declared("STRING"), Some(ElementType::Text));
        assert_eq!(ElementType::from_declared("STRUCT"), None);
    }

    #[test]
    fn test_empty_table_keeps_names() {
        let table = DataTable::empty_with_columns(&["A".to_string(), "B".to_string()]);
        assert_eq!(table.shape(), (0, 2));
        assert_eq!(table.column_names(), vec!["A", "B"]);
        assert!(table.is_rectangular());
    }
}
