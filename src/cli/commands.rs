//! Command implementation for the scope-csv CLI
//!
//! Resolves input files, runs the parser over each of them, prints per-file
//! results and optionally writes the parsing report.

use crate::cli::args::{Args, OutputFormat};
use crate::config::ParserConfig;
use crate::models::{ParseState, ParsingOutcome};
use crate::parser::ComplexCsvParser;
use crate::validation::ValidationRules;
use anyhow::{Context, Result};
use colored::*;
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info};
use walkdir::WalkDir;

/// Totals for one CLI run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    pub files_found: usize,
    pub files_parsed: usize,
    pub successful_parses: usize,
    /// Files that could not be read at all
    pub errors_encountered: usize,
    pub rows_parsed: usize,
}

/// Per-file result line, as printed with `--json`
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub path: PathBuf,
    pub state: ParseState,
    pub success: bool,
    pub rows: usize,
    pub columns: Vec<String>,
    pub encoding: String,
    pub delimiter: String,
    pub header_line: Option<usize>,
    pub data_start_line: Option<usize>,
    pub skipped_rows: usize,
    pub warnings: Vec<String>,
}

impl FileResult {
    pub fn from_outcome(path: &Path, outcome: &ParsingOutcome) -> Self {
        let structure = &outcome.structure;
        Self {
            path: path.to_path_buf(),
            state: structure.state,
            success: structure.parsing_success,
            rows: outcome.table.num_rows(),
            columns: structure.columns.clone(),
            encoding: structure.encoding.name().to_string(),
            delimiter: structure.delimiter.display_name(),
            header_line: structure.header_line,
            data_start_line: structure.data_start_line,
            skipped_rows: structure.skipped_rows,
            warnings: structure.warnings.clone(),
        }
    }
}

/// Main entry point for the CLI
pub fn run(args: Args) -> Result<RunStats> {
    setup_logging(&args)?;
    args.validate().context("Invalid command-line arguments")?;

    let start_time = Instant::now();
    let config = match &args.config_file {
        Some(path) => ParserConfig::from_json_file(path)
            .with_context(|| format!("Failed to load parser config {}", path.display()))?,
        None => ParserConfig::default(),
    };
    let rules = match &args.rules_file {
        Some(path) => Some(
            ValidationRules::from_json_file(path)
                .with_context(|| format!("Failed to load validation rules {}", path.display()))?,
        ),
        None => None,
    };
    let options = args.parse_options(rules);

    let files = discover_input_files(&args.inputs, &args.pattern)?;
    let mut stats = RunStats {
        files_found: files.len(),
        ..RunStats::default()
    };
    info!("Parsing {} files", files.len());

    let mut parser = ComplexCsvParser::with_config(config)?;
    let progress = (args.show_progress() && files.len() > 1)
        .then(|| create_progress_bar(files.len() as u64, "Parsing files"));
    let mut results = Vec::with_capacity(files.len());

    for path in &files {
        if let Some(pb) = &progress {
            pb.set_message(display_name(path));
        }
        match parser.parse_complex_csv(path, &options) {
            Ok(outcome) => {
                stats.files_parsed += 1;
                stats.rows_parsed += outcome.table.num_rows();
                if outcome.is_success() {
                    stats.successful_parses += 1;
                }
                results.push(FileResult::from_outcome(path, &outcome));
            }
            Err(e) => {
                stats.errors_encountered += 1;
                error!("Failed to parse {}: {}", path.display(), e);
            }
        }
        if let Some(pb) = &progress {
            pb.inc(1);
        }
    }
    if let Some(pb) = &progress {
        pb.finish_and_clear();
    }

    match args.output_format() {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&results)
                .context("Failed to serialize per-file results")?;
            println!("{}", json);
        }
        OutputFormat::Human => {
            if !args.quiet {
                for result in &results {
                    print_file_result(result);
                }
                print_summary(&stats, start_time);
            }
        }
    }

    if let Some(report_path) = &args.report_path {
        parser
            .export_parsing_report(report_path)
            .with_context(|| format!("Failed to write report {}", report_path.display()))?;
        if !args.quiet && args.output_format() == OutputFormat::Human {
            println!(
                "{} {}",
                "Report written to".bright_green(),
                report_path.display()
            );
        }
    }

    Ok(stats)
}

/// Set up structured logging
pub fn setup_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("scope_csv={}", log_level)));

    if args.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
            .context("Failed to initialise logging")?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .context("Failed to initialise logging")?;
    }

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

/// Expand the inputs into a sorted, de-duplicated file list
///
/// Files are taken as given; directories are walked recursively and filtered
/// by matching `pattern` against the file name.
pub fn discover_input_files(inputs: &[PathBuf], pattern: &str) -> Result<Vec<PathBuf>> {
    let matcher = glob::Pattern::new(pattern)
        .with_context(|| format!("Invalid file pattern '{}'", pattern))?;
    let mut files = Vec::new();

    for input in inputs {
        if input.is_file() {
            files.push(input.clone());
        } else if input.is_dir() {
            let before = files.len();
            for entry in WalkDir::new(input)
                .follow_links(false)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path();
                let matches = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| matcher.matches(name));
                if entry.file_type().is_file() && matches {
                    files.push(path.to_path_buf());
                }
            }
            debug!(
                "Found {} files matching '{}' in {}",
                files.len() - before,
                pattern,
                input.display()
            );
        } else {
            anyhow::bail!("Input path does not exist: {}", input.display());
        }
    }

    files.sort();
    files.dedup();
    if files.is_empty() {
        anyhow::bail!("No input files matching '{}' were found", pattern);
    }
    Ok(files)
}

/// Create a progress bar with appropriate styling
pub fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} ETA: {eta}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.set_message(message.to_string());
    pb
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_file_result(result: &FileResult) {
    let status = match result.state {
        ParseState::Done => "OK".bright_green().bold(),
        ParseState::Empty => "EMPTY".bright_yellow().bold(),
        _ => "FAILED".bright_red().bold(),
    };
    println!("{} {}", status, result.path.display().to_string().bright_cyan());
    println!(
        "    {} rows x {} columns  (encoding {}, delimiter {})",
        result.rows,
        result.columns.len(),
        result.encoding,
        result.delimiter
    );
    if let (Some(header), Some(data)) = (result.header_line, result.data_start_line) {
        println!("    header line {}, data from line {}", header, data);
    }
    if result.skipped_rows > 0 {
        println!(
            "    {}",
            format!("{} short rows skipped", result.skipped_rows).yellow()
        );
    }
    for warning in &result.warnings {
        println!("    {} {}", "warning:".yellow(), warning);
    }
}

fn print_summary(stats: &RunStats, start_time: Instant) {
    println!();
    println!("{}", "Summary".bright_white().bold());
    println!(
        "  Files parsed:   {}/{}",
        stats.files_parsed.to_string().bright_yellow(),
        stats.files_found
    );
    println!(
        "  With data:      {}",
        stats.successful_parses.to_string().bright_green()
    );
    if stats.errors_encountered > 0 {
        println!(
            "  Unreadable:     {}",
            stats.errors_encountered.to_string().bright_red()
        );
    }
    println!("  Rows parsed:    {}", stats.rows_parsed);
    println!(
        "  Elapsed:        {}",
        HumanDuration(start_time.elapsed())
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_discover_walks_directories() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("day1");
        fs::create_dir(&nested).unwrap();
        fs::write(dir.path().join("a.csv"), "x").unwrap();
        fs::write(nested.join("b.csv"), "x").unwrap();
        fs::write(nested.join("notes.txt"), "x").unwrap();

        let files = discover_input_files(&[dir.path().to_path_buf()], "*.csv").unwrap();
        assert_eq!(files, vec![dir.path().join("a.csv"), nested.join("b.csv")]);

        let txt = discover_input_files(&[dir.path().to_path_buf()], "*.txt").unwrap();
        assert_eq!(txt, vec![nested.join("notes.txt")]);
    }

    #[test]
    fn test_explicit_files_bypass_pattern() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("trace.dat");
        fs::write(&file, "x").unwrap();
        let files = discover_input_files(&[file.clone(), file.clone()], "*.csv").unwrap();
        assert_eq!(files, vec![file]);
    }

    #[test]
    fn test_missing_input_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(discover_input_files(&[dir.path().join("nope")], "*.csv").is_err());
        assert!(discover_input_files(&[dir.path().to_path_buf()], "*.csv").is_err());
    }
}
