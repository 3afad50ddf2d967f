//! Table builder.
//!
//! Reads the data region into per-column cells, applies optional validation,
//! then picks each column's element type from what the cells actually hold.
//! Declared `Data-Type` attributes are advisory only.

use crate::config::ParserConfig;
use crate::models::{Column, ColumnValues, DataLayout, DataTable, Delimiter, ElementType};
use crate::progress::ProgressReporter;
use crate::structure::{StructureAnalysis, is_blank};
use crate::validation::ValidationRules;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Table plus the row-level diagnostics gathered while building it
#[derive(Debug, Clone, PartialEq)]
pub struct TableBuild {
    pub table: DataTable,
    /// Non-blank data lines with too few fields
    pub skipped_rows: usize,
    /// Column -> cells rejected by validation
    pub violations: BTreeMap<String, usize>,
    pub warnings: Vec<String>,
}

impl TableBuild {
    pub fn rows(&self) -> usize {
        self.table.num_rows()
    }
}

/// Build the data table for an analysed file
///
/// Returns a zero-row table carrying the column names when the analysis found
/// no data start.
pub fn build_table(
    lines: &[String],
    analysis: &StructureAnalysis,
    delimiter: Delimiter,
    config: &ParserConfig,
    max_rows: Option<usize>,
    validation: Option<&ValidationRules>,
) -> TableBuild {
    let columns = &analysis.columns;
    let Some(start) = analysis.data_start_index else {
        return TableBuild {
            table: DataTable::empty_with_columns(columns),
            skipped_rows: 0,
            violations: BTreeMap::new(),
            warnings: Vec::new(),
        };
    };

    let layout = analysis.layout;
    let required = layout.fields_required(columns.len());
    let row_cap = max_rows.unwrap_or(usize::MAX);
    let data_lines = &lines[start.min(lines.len())..];

    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); columns.len()];
    let mut time_axis: Vec<Option<f64>> = Vec::new();
    let mut rows = 0;
    let mut skipped_rows = 0;
    let mut progress = ProgressReporter::new(
        data_lines.len(),
        config.progress_interval,
        config.show_progress_bar,
    );

    for (offset, line) in data_lines.iter().enumerate() {
        if rows >= row_cap {
            break;
        }
        progress.update(offset + 1);
        if is_blank(line) {
            continue;
        }

        let fields = delimiter.split(line);
        if fields.len() < required {
            skipped_rows += 1;
            debug!(
                "Skipping line {}: {} fields, {} required",
                start + offset + 1,
                fields.len(),
                required
            );
            continue;
        }

        for (column, column_cells) in cells.iter_mut().enumerate() {
            let raw = fields[layout.field_index(column)];
            column_cells.push(to_cell(raw, config));
        }
        if layout == DataLayout::Interleaved {
            time_axis.push(fields[0].trim().parse::<f64>().ok());
        }
        rows += 1;
    }
    progress.finish(rows, skipped_rows);

    if skipped_rows > 0 {
        warn!("Skipped {} data lines with fewer than {} fields", skipped_rows, required);
    }

    let mut warnings = Vec::new();
    let mut violations = BTreeMap::new();
    if let Some(rules) = validation {
        for rule_column in rules.columns() {
            if !columns.iter().any(|name| name == rule_column) {
                warnings.push(format!(
                    "validation rules for unknown column '{}' were ignored",
                    rule_column
                ));
            }
        }
        for (name, column_cells) in columns.iter().zip(cells.iter_mut()) {
            if rules.rules_for(name).is_empty() {
                continue;
            }
            let count = rules.apply(name, column_cells);
            if count > 0 {
                warn!("Validation rejected {} cells in column '{}'", count, name);
            }
            violations.insert(name.clone(), count);
        }
    }

    let table_columns: Vec<Column> = columns
        .iter()
        .zip(cells)
        .map(|(name, column_cells)| Column {
            name: name.clone(),
            values: coerce_column(column_cells),
        })
        .collect();

    for (descriptor, column) in analysis.descriptors.iter().zip(&table_columns) {
        if let Some(declared) = descriptor.declared_type {
            if declared != ElementType::Text && column.element_type() == ElementType::Text {
                warnings.push(format!(
                    "column '{}' is declared {} but holds non-numeric values",
                    column.name, declared
                ));
            }
        }
    }

    TableBuild {
        table: DataTable {
            columns: table_columns,
            time_axis: (layout == DataLayout::Interleaved).then_some(time_axis),
        },
        skipped_rows,
        violations,
        warnings,
    }
}

/// Trimmed cell text, or `None` for a missing-value token
fn to_cell(raw: &str, config: &ParserConfig) -> Option<String> {
    if config.is_missing_token(raw) {
        None
    } else {
        Some(raw.trim().to_string())
    }
}

/// Pick a column's element type from its non-missing cells
///
/// Integer when every cell parses as `i64`, real when every cell parses as
/// `f64`, text otherwise. A column with no values at all is real.
pub fn coerce_column(cells: Vec<Option<String>>) -> ColumnValues {
    let present = || cells.iter().flatten();

    if present().next().is_none() {
        return ColumnValues::Real(vec![None; cells.len()]);
    }

    if present().all(|cell| cell.parse::<i64>().is_ok()) {
        return ColumnValues::Integer(
            cells
                .iter()
                .map(|cell| cell.as_deref().and_then(|v| v.parse::<i64>().ok()))
                .collect(),
        );
    }

    if present().all(|cell| cell.parse::<f64>().is_ok()) {
        return ColumnValues::Real(
            cells
                .iter()
                .map(|cell| cell.as_deref().and_then(|v| v.parse::<f64>().ok()))
                .collect(),
        );
    }

    ColumnValues::Text(cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::StructureAnalyzer;
    use crate::validation::ValidationRule;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    fn build(text: &str, delimiter: Delimiter, max_rows: Option<usize>) -> TableBuild {
        let config = ParserConfig::default();
        let file = lines(text);
        let analysis = StructureAnalyzer::new(&config, delimiter).analyze(&file, None, None);
        build_table(&file, &analysis, delimiter, &config, max_rows, None)
    }

    #[test]
    fn test_coercion_prefers_narrowest_type() {
        let ints = coerce_column(vec![Some("1".into()), None, Some("-3".into())]);
        assert_eq!(ints, ColumnValues::Integer(vec![Some(1), None, Some(-3)]));

        let reals = coerce_column(vec![Some("1".into()), Some("2.5".into())]);
        assert_eq!(reals, ColumnValues::Real(vec![Some(1.0), Some(2.5)]));

        let text = coerce_column(vec![Some("1".into()), Some("OK".into())]);
        assert_eq!(text.element_type(), ElementType::Text);

        let empty = coerce_column(vec![None, None]);
        assert_eq!(empty, ColumnValues::Real(vec![None, None]));
    }

    #[test]
    fn test_interleaved_scope_rows() {
        let build = build(
            "Name\tA\tName\tB\nData-Type\tREAL64\tData-Type\tREAL64\n\n0\t1.5\t0\t2.5\n1\t1.6\t1\t2.6",
            Delimiter::TAB,
            None,
        );
        let table = &build.table;
        assert_eq!(table.shape(), (2, 2));
        assert_eq!(
            table.column("A").unwrap().values,
            ColumnValues::Real(vec![Some(1.5), Some(1.6)])
        );
        assert_eq!(
            table.column("B").unwrap().values,
            ColumnValues::Real(vec![Some(2.5), Some(2.6)])
        );
        assert_eq!(table.time_axis, Some(vec![Some(0.0), Some(1.0)]));
        assert_eq!(build.skipped_rows, 0);
    }

    #[test]
    fn test_short_rows_are_skipped() {
        let build = build(
            "Name,a,Name,b,Name,c,Name,d\n\
             1,2,3,4,5,6,7,8,9,10,11,12\n\
             1,2,3\n\
             2,3,4,5,6,7,8,9,10,11,12,13",
            Delimiter::COMMA,
            None,
        );
        assert_eq!(build.skipped_rows, 1);
        assert_eq!(build.table.shape(), (2, 4));
        // 12 fields for 4 columns: flat layout, first four fields
        assert_eq!(
            build.table.column("d").unwrap().values,
            ColumnValues::Integer(vec![Some(4), Some(5)])
        );
        assert!(build.table.time_axis.is_none());
    }

    #[test]
    fn test_max_rows_caps_consumption() {
        let text = "Name;x;Name;y\n0;1;0;2\n1;1;1;2\n2;1;2;2\n3;1;3;2";
        assert_eq!(build(text, Delimiter::SEMICOLON, Some(2)).rows(), 2);
        let none = build(text, Delimiter::SEMICOLON, Some(0));
        assert_eq!(none.table.shape(), (0, 2));
        assert_eq!(none.table.column_names(), vec!["x", "y"]);
    }

    #[test]
    fn test_missing_tokens_and_text_markers() {
        let build = build(
            "Name\tp\tName\tstate\n0\t1.5\t0\tRUN\n1\tNaN\t1\tSTOP\n2\t\t2\tRUN",
            Delimiter::TAB,
            None,
        );
        assert_eq!(
            build.table.column("p").unwrap().values,
            ColumnValues::Real(vec![Some(1.5), None, None])
        );
        assert_eq!(
            build.table.column("state").unwrap().element_type(),
            ElementType::Text
        );
    }

    #[test]
    fn test_validation_blanks_and_counts() {
        let config = ParserConfig::default();
        let file = lines("Name\tA\tName\tB\n0\t1.5\t0\t20\n1\t99\t1\t21\n2\t2.5\t2\t22");
        let analysis = StructureAnalyzer::new(&config, Delimiter::TAB).analyze(&file, None, None);
        let rules = ValidationRules::new()
            .with_rule("A", ValidationRule::range(Some(0.0), Some(10.0)).unwrap())
            .with_rule("ghost", ValidationRule::allowed(["x"]));

        let build = build_table(&file, &analysis, Delimiter::TAB, &config, None, Some(&rules));
        assert_eq!(
            build.table.column("A").unwrap().values,
            ColumnValues::Real(vec![Some(1.5), None, Some(2.5)])
        );
        assert_eq!(build.violations.get("A"), Some(&1));
        assert!(!build.violations.contains_key("B"));
        assert!(build.warnings.iter().any(|w| w.contains("ghost")));
    }

    #[test]
    fn test_declared_type_is_advisory() {
        let build = build(
            "Name\tA\tName\tB\nData-Type\tREAL64\tData-Type\tREAL64\n0\tok\t0\t1.0\n1\tfail\t1\t2.0\n2\t7\t2\t3.0",
            Delimiter::TAB,
            None,
        );
        assert_eq!(build.table.column("A").unwrap().element_type(), ElementType::Text);
        assert!(build.warnings.iter().any(|w| w.contains("'A'")));
    }
}
