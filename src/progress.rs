//! Progress signalling for large data regions.
//!
//! Every `interval` data lines the table builder reports how far it got: as a
//! `tracing` event, and on an `indicatif` bar when one is requested. The
//! signal is advisory; an interval of 0 silences it.

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

/// Progress reporter for one data region
pub struct ProgressReporter {
    progress_bar: Option<ProgressBar>,
    interval: usize,
    total_lines: usize,
    signals: usize,
}

impl ProgressReporter {
    /// Reporter for a region of `total_lines` data lines
    ///
    /// Regions no larger than one interval stay silent.
    pub fn new(total_lines: usize, interval: usize, show_bar: bool) -> Self {
        let active = interval > 0 && total_lines > interval;
        let progress_bar = (active && show_bar).then(|| {
            let pb = ProgressBar::new(total_lines as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} lines ({percent}%) | {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("█▉▊▋▌▍▎▏  "),
            );
            pb.set_message("Reading data region");
            pb
        });
        if active {
            debug!(
                "Progress signals every {} lines over {} data lines",
                interval, total_lines
            );
        }
        Self {
            progress_bar,
            interval: if active { interval } else { 0 },
            total_lines,
            signals: 0,
        }
    }

    /// A reporter that never signals
    pub fn silent() -> Self {
        Self::new(0, 0, false)
    }

    /// Record that `lines_done` data lines have been consumed
    pub fn update(&mut self, lines_done: usize) {
        if self.interval == 0 || lines_done == 0 || lines_done % self.interval != 0 {
            return;
        }
        self.signals += 1;
        info!(
            "Processed {}/{} data lines ({:.0}%)",
            lines_done,
            self.total_lines,
            lines_done as f64 / self.total_lines as f64 * 100.0
        );
        if let Some(ref pb) = self.progress_bar {
            pb.set_position(lines_done as u64);
        }
    }

    /// Finish with a completion message
    pub fn finish(&self, rows: usize, skipped: usize) {
        if let Some(ref pb) = self.progress_bar {
            pb.finish_with_message(format!("Completed: {} rows, {} skipped", rows, skipped));
        }
    }

    /// Number of signals emitted so far
    pub fn signals(&self) -> usize {
        self.signals
    }

    pub fn is_enabled(&self) -> bool {
        self.interval > 0
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::silent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signals_every_interval() {
        let mut reporter = ProgressReporter::new(3500, 1000, false);
        assert!(reporter.is_enabled());
        for line in 1..=3500 {
            reporter.update(line);
        }
        assert_eq!(reporter.signals(), 3);
    }

    #[test]
    fn test_small_regions_stay_silent() {
        let mut reporter = ProgressReporter::new(1000, 1000, false);
        assert!(!reporter.is_enabled());
        for line in 1..=1000 {
            reporter.update(line);
        }
        assert_eq!(reporter.signals(), 0);
    }

    #[test]
    fn test_zero_interval_silences() {
        let mut reporter = ProgressReporter::new(50_000, 0, true);
        reporter.update(1000);
        assert_eq!(reporter.signals(), 0);
        assert!(ProgressReporter::silent().progress_bar.is_none());
    }
}
