//! Delimiter prober.
//!
//! Scores each candidate delimiter by how consistently it splits a sample of
//! non-empty lines: `mean(counts) / (stddev(counts) + 1)`. The sample is a
//! statistical hint, so quoted delimiters are counted like any other.

use crate::encoding::read_lines;
use crate::error::Result;
use crate::models::{Delimiter, TextEncoding};
use std::path::Path;
use tracing::{debug, trace};

/// Score of one candidate delimiter over a sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelimiterScore {
    pub delimiter: Delimiter,
    pub mean_fields: f64,
    pub stddev_fields: f64,
    pub score: f64,
}

/// Choose a delimiter for the file at `path`
pub fn detect_delimiter(
    path: &Path,
    encoding: TextEncoding,
    candidates: &[Delimiter],
    sample_lines: usize,
) -> Result<Delimiter> {
    let decoded = read_lines(path, encoding)?;
    let delimiter = detect_from_lines(&decoded.lines, candidates, sample_lines);
    debug!("Detected delimiter {:?} for {}", delimiter.as_char(), path.display());
    Ok(delimiter)
}

/// Choose a delimiter from the first `sample_lines` non-empty lines
///
/// Ties go to the earlier candidate; an empty sample yields TAB.
pub fn detect_from_lines(lines: &[String], candidates: &[Delimiter], sample_lines: usize) -> Delimiter {
    let sample: Vec<&str> = lines
        .iter()
        .map(String::as_str)
        .filter(|line| !line.trim().is_empty())
        .take(sample_lines)
        .collect();

    if sample.is_empty() {
        return Delimiter::TAB;
    }

    let mut best: Option<DelimiterScore> = None;
    for &delimiter in candidates {
        let scored = score_delimiter(&sample, delimiter);
        trace!(
            "Delimiter {:?}: mean={:.3} stddev={:.3} score={:.3}",
            delimiter.as_char(),
            scored.mean_fields,
            scored.stddev_fields,
            scored.score
        );
        if best.is_none_or(|current| scored.score > current.score) {
            best = Some(scored);
        }
    }

    best.map(|scored| scored.delimiter).unwrap_or(Delimiter::TAB)
}

/// Score `delimiter` over a sample of lines
pub fn score_delimiter(sample: &[&str], delimiter: Delimiter) -> DelimiterScore {
    let counts: Vec<f64> = sample
        .iter()
        .map(|line| line.split(delimiter.as_char()).count() as f64)
        .collect();

    let n = counts.len().max(1) as f64;
    let mean = counts.iter().sum::<f64>() / n;
    let variance = counts.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    DelimiterScore {
        delimiter,
        mean_fields: mean,
        stddev_fields: stddev,
        score: mean / (stddev + 1.0),
    }
}
