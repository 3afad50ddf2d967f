//! Optional per-column validation rules.
//!
//! A rule rejects a cell by range, membership or pattern. Rejected cells are
//! replaced with the missing-value sentinel and counted per column; they never
//! abort a parse.

use crate::error::{ParserError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::debug;

/// A single check applied to the text of a cell
#[derive(Debug, Clone)]
pub enum ValidationRule {
    /// Numeric value within the inclusive bounds; non-numeric cells fail
    Range { min: Option<f64>, max: Option<f64> },
    /// Trimmed value is one of the allowed tokens
    Allowed(BTreeSet<String>),
    /// Trimmed value matches the whole pattern
    Pattern(Regex),
}

impl ValidationRule {
    pub fn range(min: Option<f64>, max: Option<f64>) -> Result<Self> {
        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return Err(ParserError::invalid_rule(
                    "<range>",
                    format!("min {} exceeds max {}", lo, hi),
                ));
            }
        }
        Ok(ValidationRule::Range { min, max })
    }

    pub fn allowed<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ValidationRule::Allowed(values.into_iter().map(Into::into).collect())
    }

    pub fn pattern(pattern: &str) -> Result<Self> {
        Regex::new(&format!("^(?:{})$", pattern))
            .map(ValidationRule::Pattern)
            .map_err(|e| ParserError::invalid_rule("<pattern>", e.to_string()))
    }

    /// True when the cell passes
    pub fn check(&self, cell: &str) -> bool {
        let value = cell.trim();
        match self {
            ValidationRule::Range { min, max } => match value.parse::<f64>() {
                Ok(number) if !number.is_nan() => {
                    min.is_none_or(|lo| number >= lo) && max.is_none_or(|hi| number <= hi)
                }
                _ => false,
            },
            ValidationRule::Allowed(values) => values.contains(value),
            ValidationRule::Pattern(regex) => regex.is_match(value),
        }
    }
}

/// Serializable form of the rules for one column
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnRuleSpec {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub allowed: Option<Vec<String>>,
    pub pattern: Option<String>,
}

/// Rules keyed by column name
#[derive(Debug, Clone, Default)]
pub struct ValidationRules {
    rules: BTreeMap<String, Vec<ValidationRule>>,
}

impl ValidationRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a rule to a column
    pub fn with_rule(mut self, column: impl Into<String>, rule: ValidationRule) -> Self {
        self.rules.entry(column.into()).or_default().push(rule);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn rules_for(&self, column: &str) -> &[ValidationRule] {
        self.rules.get(column).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Compile rule specs, reporting the offending column on failure
    pub fn from_specs(specs: &BTreeMap<String, ColumnRuleSpec>) -> Result<Self> {
        let mut rules = Self::new();
        for (column, spec) in specs {
            let retag = |err: ParserError| match err {
                ParserError::InvalidRule { reason, .. } => {
                    ParserError::invalid_rule(column.clone(), reason)
                }
                other => other,
            };
            if spec.min.is_some() || spec.max.is_some() {
                let rule = ValidationRule::range(spec.min, spec.max).map_err(retag)?;
                rules = rules.with_rule(column.clone(), rule);
            }
            if let Some(allowed) = &spec.allowed {
                rules = rules.with_rule(column.clone(), ValidationRule::allowed(allowed.clone()));
            }
            if let Some(pattern) = &spec.pattern {
                let rule = ValidationRule::pattern(pattern).map_err(retag)?;
                rules = rules.with_rule(column.clone(), rule);
            }
        }
        Ok(rules)
    }

    /// Load rule specs from a JSON object keyed by column name
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ParserError::from_io(path, e))?;
        let specs: BTreeMap<String, ColumnRuleSpec> = serde_json::from_str(&content)?;
        let rules = Self::from_specs(&specs)?;
        debug!(
            "Loaded validation rules for {} columns from {}",
            specs.len(),
            path.display()
        );
        Ok(rules)
    }

    /// Replace failing cells of `column` with `None`; returns the violation count
    pub fn apply(&self, column: &str, cells: &mut [Option<String>]) -> usize {
        let rules = self.rules_for(column);
        if rules.is_empty() {
            return 0;
        }
        let mut violations = 0;
        for cell in cells.iter_mut() {
            let failed = cell
                .as_deref()
                .is_some_and(|value| rules.iter().any(|rule| !rule.check(value)));
            if failed {
                *cell = None;
                violations += 1;
            }
        }
        violations
    }
}
