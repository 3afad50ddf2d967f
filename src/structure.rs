//! Structure analyzer.
//!
//! Classifies decoded lines (header candidates, metadata candidates, data
//! candidates, blanks), picks the column-header line and the first data line,
//! and partitions the file into a region map. Column descriptors are derived
//! from the header line and the attribute lines that follow it.

use crate::config::ParserConfig;
use crate::constants::{DATA_TYPE_ATTRIBUTE, HEADER_TOKEN, MAX_METADATA_KEY_LEN};
use crate::models::{
    ColumnDescriptor, DataLayout, Delimiter, ElementType, RegionKind, RegionMap, StructureInfo,
};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Everything the analyzer decided about one decoded file
///
/// Line indices here are 0-based; `apply_to` converts them to the 1-based
/// numbers reported in `StructureInfo`.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureAnalysis {
    pub total_lines: usize,
    pub header_candidates: Vec<usize>,
    pub data_candidates: Vec<usize>,
    pub header_index: Option<usize>,
    pub data_start_index: Option<usize>,
    pub columns: Vec<String>,
    /// Header uses the `Name, col, Name, col, ...` layout
    pub interleaved_header: bool,
    pub layout: DataLayout,
    pub descriptors: Vec<ColumnDescriptor>,
    pub regions: RegionMap,
    /// Key -> 1-based lines, for preamble metadata and attribute lines
    pub metadata_sections: BTreeMap<String, Vec<usize>>,
    pub warnings: Vec<String>,
}

impl StructureAnalysis {
    /// Header and data start are both known
    pub fn is_complete(&self) -> bool {
        self.header_index.is_some() && self.data_start_index.is_some() && !self.columns.is_empty()
    }

    /// Copy the analysis into the caller-facing structure info
    pub fn apply_to(&self, info: &mut StructureInfo) {
        info.total_lines = self.total_lines;
        info.header_candidates = self.header_candidates.iter().map(|i| i + 1).collect();
        info.data_start_candidates = self.data_candidates.iter().map(|i| i + 1).collect();
        info.metadata_sections = self.metadata_sections.clone();
        info.header_line = self.header_index.map(|i| i + 1);
        info.data_start_line = self.data_start_index.map(|i| i + 1);
        info.columns = self.columns.clone();
        info.column_descriptors = self.descriptors.clone();
        info.layout = self.layout;
        info.regions = self.regions.clone();
        info.warnings.extend(self.warnings.iter().cloned());
    }
}

/// True for fields a permissive real-number parser accepts
///
/// Integers, decimals, signs and scientific notation all count; surrounding
/// whitespace is ignored.
pub fn is_numeric(field: &str) -> bool {
    let trimmed = field.trim();
    !trimmed.is_empty() && trimmed.parse::<f64>().is_ok()
}

/// Share of the first `sniff_fields` fields that are numeric
pub fn numeric_share(fields: &[&str], sniff_fields: usize) -> f64 {
    let sniffed = &fields[..fields.len().min(sniff_fields)];
    if sniffed.is_empty() {
        return 0.0;
    }
    let numeric = sniffed.iter().filter(|field| is_numeric(field)).count();
    numeric as f64 / sniffed.len() as f64
}

/// Field count ignoring trailing empty fields left by a trailing delimiter
pub fn effective_width(fields: &[&str]) -> usize {
    fields
        .iter()
        .rposition(|field| !field.trim().is_empty())
        .map(|last| last + 1)
        .unwrap_or(0)
}

pub fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Column names of a header line, and whether it is interleaved
///
/// An interleaved header (`Name, a, Name, b`) yields its odd-indexed fields,
/// `len(fields) / 2` of them; any other line is a flat header where every
/// field up to the last non-empty one is a name.
pub fn header_columns(fields: &[&str]) -> (Vec<String>, bool) {
    if fields.first().map(|f| f.trim()) == Some(HEADER_TOKEN) {
        let names = fields
            .iter()
            .skip(1)
            .step_by(2)
            .take(fields.len() / 2)
            .map(|name| name.trim().to_string())
            .collect();
        (names, true)
    } else {
        let names = fields[..effective_width(fields)]
            .iter()
            .map(|name| name.trim().to_string())
            .collect();
        (names, false)
    }
}

/// Per-line classifier bound to one delimiter and configuration
#[derive(Debug, Clone)]
pub struct StructureAnalyzer<'a> {
    config: &'a ParserConfig,
    delimiter: Delimiter,
}

impl<'a> StructureAnalyzer<'a> {
    pub fn new(config: &'a ParserConfig, delimiter: Delimiter) -> Self {
        Self { config, delimiter }
    }

    fn fields<'l>(&self, line: &'l str) -> Vec<&'l str> {
        self.delimiter.split(line)
    }

    /// Data line: enough fields, and enough of the sniffed ones numeric
    pub fn is_data_candidate(&self, line: &str, min_fields: usize) -> bool {
        if is_blank(line) {
            return false;
        }
        let fields = self.fields(line);
        fields.len() >= min_fields.max(1)
            && numeric_share(&fields, self.config.sniff_fields) >= self.config.numeric_threshold
    }

    /// Per-column attribute line: a recognised attribute key, or an unknown
    /// key repeated at every even position in the interleaved layout
    pub fn is_attribute_line(&self, line: &str) -> bool {
        let fields = self.fields(line);
        let Some(key) = fields.first().map(|f| f.trim()) else {
            return false;
        };
        if key.is_empty() || key == HEADER_TOKEN || is_numeric(key) || fields.len() < 2 {
            return false;
        }
        if self.config.is_attribute_key(key) {
            return true;
        }
        fields.len() >= 3
            && fields
                .iter()
                .step_by(2)
                .filter(|f| !f.trim().is_empty())
                .all(|f| f.trim() == key)
    }

    /// Preamble `key <delim> value` line
    pub fn is_metadata_candidate(&self, line: &str) -> bool {
        let Some((key, value)) = line.split_once(self.delimiter.as_char()) else {
            return false;
        };
        let key = key.trim();
        if self.config.is_metadata_key(key) {
            return true;
        }
        !key.is_empty()
            && key.len() <= MAX_METADATA_KEY_LEN
            && !is_numeric(key)
            && !value.trim().is_empty()
    }

    /// Header line: first field `Name` and the delimiter present
    ///
    /// Lines with two or more columns always qualify. A single-column `Name`
    /// line qualifies only when the next non-blank line is an attribute line
    /// or data, which keeps preamble entries such as `Name<TAB>Project` out.
    pub fn is_header_candidate(&self, lines: &[String], index: usize) -> bool {
        let line = &lines[index];
        if !line.contains(self.delimiter.as_char()) {
            return false;
        }
        let fields = self.fields(line);
        if fields.first().map(|f| f.trim()) != Some(HEADER_TOKEN) {
            return false;
        }
        if fields.len() / 2 >= 2 {
            return true;
        }
        match lines[index + 1..].iter().find(|next| !is_blank(next)) {
            Some(next) => {
                self.is_attribute_line(next)
                    || self.is_data_candidate(next, self.config.min_data_fields.min(fields.len()))
            }
            None => false,
        }
    }

    /// Run the analysis
    ///
    /// `forced_header` and `forced_data_start` are 0-based and replace the
    /// corresponding choice; candidates are still collected for diagnostics.
    pub fn analyze(
        &self,
        lines: &[String],
        forced_header: Option<usize>,
        forced_data_start: Option<usize>,
    ) -> StructureAnalysis {
        let total_lines = lines.len();
        let mut warnings = Vec::new();

        let header_candidates: Vec<usize> = (0..total_lines)
            .filter(|&i| self.is_header_candidate(lines, i))
            .collect();
        trace!("Header candidates (0-based): {:?}", header_candidates);

        let header_index = match forced_header {
            Some(index) if index < total_lines => Some(index),
            Some(index) => {
                warnings.push(format!(
                    "forced header_line {} is beyond the end of the file ({} lines)",
                    index + 1,
                    total_lines
                ));
                None
            }
            None => self.select_header(lines, &header_candidates, forced_data_start),
        };

        let (columns, interleaved_header) = match header_index {
            Some(index) => header_columns(&self.fields(&lines[index])),
            None => (Vec::new(), false),
        };

        // Data after the header only needs one field per column.
        let data_candidates: Vec<usize> = (0..total_lines)
            .filter(|&i| {
                let min_fields = match header_index {
                    Some(header) if i > header => self.config.min_data_fields.min(columns.len()).max(1),
                    _ => self.config.min_data_fields,
                };
                self.is_data_candidate(&lines[i], min_fields)
            })
            .collect();

        let data_start_index = match (header_index, forced_data_start) {
            (_, Some(index)) if index >= total_lines => {
                warnings.push(format!(
                    "forced data_start_line {} is beyond the end of the file ({} lines)",
                    index + 1,
                    total_lines
                ));
                None
            }
            (Some(header), Some(index)) if index <= header => {
                warnings.push(format!(
                    "forced data_start_line {} does not follow header line {}",
                    index + 1,
                    header + 1
                ));
                None
            }
            (Some(_), Some(index)) => Some(index),
            (Some(header), None) => data_candidates.iter().copied().find(|&i| i > header),
            (None, _) => None,
        };

        if header_index.is_none() && total_lines > 0 {
            warnings.push("no column-header line found".to_string());
        } else if header_index.is_some() && data_start_index.is_none() {
            warnings.push("no data line found after the column-header line".to_string());
        }

        let layout = match data_start_index {
            Some(data)
                if interleaved_header
                    && !columns.is_empty()
                    && effective_width(&self.fields(&lines[data])) == columns.len() * 2 =>
            {
                DataLayout::Interleaved
            }
            _ => DataLayout::Flat,
        };

        let labels = self.label_lines(lines, header_index, data_start_index);
        let regions = RegionMap::from_labels(&labels);
        let descriptors = self.describe_columns(lines, &labels, &columns, interleaved_header);
        let metadata_sections = self.collect_sections(lines, &labels);

        debug!(
            "Structure: {} lines, header={:?}, data_start={:?}, {} columns, layout={:?}",
            total_lines,
            header_index.map(|i| i + 1),
            data_start_index.map(|i| i + 1),
            columns.len(),
            layout
        );

        StructureAnalysis {
            total_lines,
            header_candidates,
            data_candidates,
            header_index,
            data_start_index,
            columns,
            interleaved_header,
            layout,
            descriptors,
            regions,
            metadata_sections,
            warnings,
        }
    }

    /// Choose the header among the candidates that precede `before`
    ///
    /// The first multi-column candidate wins. Single-column candidates are
    /// used only when no multi-column one exists; a run of them with no data
    /// line in between resolves to the last, since preamble keys such as
    /// `SampleTime` also read as attribute lines.
    fn select_header(
        &self,
        lines: &[String],
        candidates: &[usize],
        before: Option<usize>,
    ) -> Option<usize> {
        let eligible: Vec<usize> = candidates
            .iter()
            .copied()
            .filter(|&h| before.is_none_or(|data| h < data))
            .collect();

        if let Some(&wide) = eligible
            .iter()
            .find(|&&h| self.fields(&lines[h]).len() / 2 >= 2)
        {
            return Some(wide);
        }

        let mut chosen: Option<usize> = None;
        for &h in &eligible {
            if let Some(previous) = chosen {
                if lines[previous + 1..h].iter().any(|line| self.is_data_candidate(line, 1)) {
                    break;
                }
            }
            chosen = Some(h);
        }
        chosen
    }

    /// One region label per line
    fn label_lines(
        &self,
        lines: &[String],
        header: Option<usize>,
        data_start: Option<usize>,
    ) -> Vec<RegionKind> {
        lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                if Some(i) == header {
                    RegionKind::HeaderBlock
                } else if is_blank(line) {
                    RegionKind::Gap
                } else {
                    match (header, data_start) {
                        (Some(h), _) if i < h => RegionKind::Preamble,
                        (Some(_), Some(d)) if i >= d => RegionKind::Data,
                        (Some(_), _) => RegionKind::AttributeBlock,
                        (None, _) => RegionKind::Preamble,
                    }
                }
            })
            .collect()
    }

    /// Build column descriptors from the header names and attribute lines
    fn describe_columns(
        &self,
        lines: &[String],
        labels: &[RegionKind],
        columns: &[String],
        interleaved: bool,
    ) -> Vec<ColumnDescriptor> {
        let mut descriptors: Vec<ColumnDescriptor> = columns
            .iter()
            .enumerate()
            .map(|(position, name)| ColumnDescriptor {
                position,
                name: name.clone(),
                declared_type: None,
                attributes: BTreeMap::new(),
            })
            .collect();

        let attribute_lines = lines
            .iter()
            .zip(labels)
            .filter(|(line, label)| **label == RegionKind::AttributeBlock && self.is_attribute_line(line))
            .map(|(line, _)| line);

        for line in attribute_lines {
            let fields = self.fields(line);
            let key = fields[0].trim();
            for descriptor in descriptors.iter_mut() {
                let index = if interleaved {
                    descriptor.position * 2 + 1
                } else {
                    descriptor.position + 1
                };
                let Some(value) = fields.get(index).map(|v| v.trim()) else {
                    continue;
                };
                if value.is_empty() {
                    continue;
                }
                descriptor.attributes.insert(key.to_string(), value.to_string());
                if key == DATA_TYPE_ATTRIBUTE {
                    descriptor.declared_type = ElementType::from_declared(value);
                }
            }
        }

        descriptors
    }

    /// Recognised keys of the preamble and attribute block, with their lines
    fn collect_sections(&self, lines: &[String], labels: &[RegionKind]) -> BTreeMap<String, Vec<usize>> {
        let mut sections: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, (line, label)) in lines.iter().zip(labels).enumerate() {
            let key = match label {
                RegionKind::Preamble if self.is_metadata_candidate(line) => line
                    .split_once(self.delimiter.as_char())
                    .map(|(key, _)| key.trim()),
                RegionKind::AttributeBlock if self.is_attribute_line(line) => {
                    self.fields(line).first().map(|key| key.trim())
                }
                _ => None,
            };
            if let Some(key) = key {
                sections.entry(key.to_string()).or_default().push(i + 1);
            }
        }
        sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    fn demo_file() -> Vec<String> {
        lines(
            "Name\tDemoFile\n\
             \n\
             Name\tA\tName\tB\n\
             Data-Type\tREAL64\tData-Type\tREAL64\n\
             \n\
             0\t1.5\t0\t2.5\n\
             1\t1.6\t1\t2.6",
        )
    }

    #[test]
    fn test_numeric_sniffing() {
        assert!(is_numeric(" 42 "));
        assert!(is_numeric("-1.5e-3"));
        assert!(is_numeric("+7"));
        assert!(!is_numeric(""));
        assert!(!is_numeric("1,5"));
        assert!(!is_numeric("REAL64"));
        assert_eq!(numeric_share(&["1", "2", "x", "4"], 10), 0.75);
        assert_eq!(numeric_share(&["1", "2", "x", "y"], 2), 1.0);
    }

    #[test]
    fn test_header_columns() {
        let (names, interleaved) = header_columns(&["Name", "A", "Name", "B"]);
        assert_eq!(names, vec!["A", "B"]);
        assert!(interleaved);

        let (names, interleaved) = header_columns(&["Name", "A", "Name", "B", ""]);
        assert_eq!(names, vec!["A", "B"]);
        assert!(interleaved);

        let (names, interleaved) = header_columns(&["time", "force", "speed", ""]);
        assert_eq!(names, vec!["time", "force", "speed"]);
        assert!(!interleaved);
    }

    #[test]
    fn test_demo_file_structure() {
        let config = ParserConfig::default();
        let analyzer = StructureAnalyzer::new(&config, Delimiter::TAB);
        let analysis = analyzer.analyze(&demo_file(), None, None);

        assert_eq!(analysis.header_candidates, vec![2]);
        assert_eq!(analysis.header_index, Some(2));
        assert_eq!(analysis.data_start_index, Some(5));
        assert_eq!(analysis.columns, vec!["A", "B"]);
        assert_eq!(analysis.layout, DataLayout::Interleaved);
        assert!(analysis.is_complete());

        use RegionKind::*;
        let kinds: Vec<RegionKind> = analysis.regions.regions.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![Preamble, Gap, HeaderBlock, AttributeBlock, Gap, Data]);
        assert_eq!(analysis.regions.line_count(), 7);

        assert_eq!(
            analysis.descriptors[0].declared_type,
            Some(ElementType::Real)
        );
        assert_eq!(
            analysis.descriptors[1].attributes.get("Data-Type").map(String::as_str),
            Some("REAL64")
        );
        assert_eq!(analysis.metadata_sections.get("Name"), Some(&vec![1]));
        assert_eq!(analysis.metadata_sections.get("Data-Type"), Some(&vec![4]));
    }

    #[test]
    fn test_single_column_header_needs_lookahead() {
        let config = ParserConfig::default();
        let analyzer = StructureAnalyzer::new(&config, Delimiter::TAB);
        let file = lines("Name\tProject\n\nName\tForce\nUnit\tkN\n\n0\t1.25\n1\t1.5");
        let analysis = analyzer.analyze(&file, None, None);

        assert_eq!(analysis.header_index, Some(2));
        assert_eq!(analysis.columns, vec!["Force"]);
        assert_eq!(analysis.data_start_index, Some(5));
        assert_eq!(analysis.layout, DataLayout::Interleaved);
        assert_eq!(
            analysis.descriptors[0].attributes.get("Unit").map(String::as_str),
            Some("kN")
        );
    }

    #[test]
    fn test_preamble_name_line_does_not_take_header_slot() {
        let config = ParserConfig::default();
        let analyzer = StructureAnalyzer::new(&config, Delimiter::TAB);
        let file = lines(
            "Name\tDemoFile\n\
             SampleTime\t10\n\
             \n\
             Name\tA\tName\tB\n\
             Data-Type\tREAL64\tData-Type\tREAL64\n\
             \n\
             0\t1.5\t0\t2.5\n\
             1\t1.6\t1\t2.6",
        );
        let analysis = analyzer.analyze(&file, None, None);

        assert_eq!(analysis.header_candidates, vec![0, 3]);
        assert_eq!(analysis.header_index, Some(3));
        assert_eq!(analysis.data_start_index, Some(6));
        assert_eq!(analysis.columns, vec!["A", "B"]);
        assert_eq!(analysis.layout, DataLayout::Interleaved);
        assert_eq!(analysis.metadata_sections.get("Name"), Some(&vec![1]));
        assert_eq!(analysis.metadata_sections.get("SampleTime"), Some(&vec![2]));
    }

    #[test]
    fn test_single_column_header_after_preamble_run() {
        let config = ParserConfig::default();
        let analyzer = StructureAnalyzer::new(&config, Delimiter::TAB);
        let file = lines("Name\tProject\nSampleTime\t10\n\nName\tForce\nUnit\tkN\n\n0\t1.25\n1\t1.5");
        let analysis = analyzer.analyze(&file, None, None);

        assert_eq!(analysis.header_index, Some(3));
        assert_eq!(analysis.columns, vec!["Force"]);
        assert_eq!(analysis.data_start_index, Some(6));
    }

    #[test]
    fn test_noise_before_header_is_not_data() {
        let config = ParserConfig::default();
        let analyzer = StructureAnalyzer::new(&config, Delimiter::COMMA);
        let file = lines(
            "1,2,3,4,5,6\n\
             Name,a,Name,b,Name,c\n\
             0,1,0,2,0,3\n\
             1,1,1,2,1,3",
        );
        let analysis = analyzer.analyze(&file, None, None);
        assert_eq!(analysis.data_candidates, vec![0, 2, 3]);
        assert_eq!(analysis.header_index, Some(1));
        assert_eq!(analysis.data_start_index, Some(2));
    }

    #[test]
    fn test_preamble_only_file() {
        let config = ParserConfig::default();
        let analyzer = StructureAnalyzer::new(&config, Delimiter::TAB);
        let file = lines("File\tC:\\scope\\run1.svdx\nStarttime\t133\nEndtime\t134");
        let analysis = analyzer.analyze(&file, None, None);

        assert!(analysis.header_index.is_none());
        assert!(analysis.data_start_index.is_none());
        assert!(!analysis.is_complete());
        assert_eq!(analysis.regions.regions.len(), 1);
        assert_eq!(analysis.regions.regions[0].kind, RegionKind::Preamble);
        assert!(!analysis.warnings.is_empty());
    }

    #[test]
    fn test_header_without_data() {
        let config = ParserConfig::default();
        let analyzer = StructureAnalyzer::new(&config, Delimiter::TAB);
        let file = lines("Name\tA\tName\tB\nData-Type\tREAL64\tData-Type\tREAL64\n\n");
        let analysis = analyzer.analyze(&file, None, None);
        assert_eq!(analysis.header_index, Some(0));
        assert!(analysis.data_start_index.is_none());
        assert_eq!(analysis.columns, vec!["A", "B"]);
    }

    #[test]
    fn test_forced_lines_override_detection() {
        let config = ParserConfig::default();
        let analyzer = StructureAnalyzer::new(&config, Delimiter::TAB);
        let file = demo_file();
        let auto = analyzer.analyze(&file, None, None);
        let forced = analyzer.analyze(&file, Some(2), Some(5));
        assert_eq!(auto, forced);

        let late = analyzer.analyze(&file, Some(2), Some(6));
        assert_eq!(late.data_start_index, Some(6));
        assert_eq!(late.header_candidates, auto.header_candidates);
    }

    #[test]
    fn test_forced_flat_header() {
        let config = ParserConfig::default();
        let analyzer = StructureAnalyzer::new(&config, Delimiter::SEMICOLON);
        let file = lines("machine;press-7\ntime;force;stroke\n0;1.5;10\n1;1.7;11");
        let analysis = analyzer.analyze(&file, Some(1), None);
        assert_eq!(analysis.columns, vec!["time", "force", "stroke"]);
        assert!(!analysis.interleaved_header);
        assert_eq!(analysis.data_start_index, Some(2));
        assert_eq!(analysis.layout, DataLayout::Flat);
    }

    #[test]
    fn test_forced_header_beyond_end() {
        let config = ParserConfig::default();
        let analyzer = StructureAnalyzer::new(&config, Delimiter::TAB);
        let analysis = analyzer.analyze(&demo_file(), Some(100), None);
        assert!(analysis.header_index.is_none());
        assert!(analysis.warnings.iter().any(|w| w.contains("beyond")));
    }

    #[test]
    fn test_region_map_covers_every_line() {
        let config = ParserConfig::default();
        let analyzer = StructureAnalyzer::new(&config, Delimiter::TAB);
        let file = lines("Name\tX\n\n\nName\tA\tName\tB\nUnit\tmm\tUnit\tmm\nnoise\n\n0\t1\t0\t2\n\n1\t1\t1\t2\n");
        let analysis = analyzer.analyze(&file, None, None);
        assert_eq!(analysis.regions.line_count(), file.len());
        for line in 1..=file.len() {
            assert!(analysis.regions.kind_of(line).is_some());
        }
        let regions = &analysis.regions.regions;
        for pair in regions.windows(2) {
            assert_eq!(pair[0].end_line + 1, pair[1].start_line);
        }
    }
}
