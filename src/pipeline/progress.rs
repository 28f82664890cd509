//! Progress reporting after each completed batch.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use log::info;

use crate::pipeline::report::RunReport;

/// Receives `(processed, total, elapsed)` after every completed batch.
///
/// Called from the coordinating thread only, in batch completion order.
pub trait ProgressReporter: Send + Sync {
    /// Called once before the first batch starts.
    fn start(&self, _total: usize) {}

    fn update(&self, processed: usize, total: usize, elapsed: Duration);

    /// Called once after the last batch.
    fn finish(&self, _report: &RunReport) {}
}

/// Reports progress through `log` at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn update(&self, processed: usize, total: usize, elapsed: Duration) {
        info!(
            "Processed {processed}/{total} items ({:.1}s elapsed)",
            elapsed.as_secs_f64()
        );
    }

    fn finish(&self, report: &RunReport) {
        info!(
            "Embedded {} of {} items in {:.1}s",
            report.succeeded.len(),
            report.total,
            report.elapsed_ms as f64 / 1000.0
        );
    }
}

/// Terminal progress bar.
#[derive(Debug)]
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "  Embedding  {bar:40.cyan/blue} {pos}/{len} items [{elapsed_precise}] {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
        bar.set_style(style);
        Self { bar }
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for BarProgress {
    fn start(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn update(&self, processed: usize, total: usize, _elapsed: Duration) {
        self.bar.set_length(total as u64);
        self.bar.set_position(processed as u64);
    }

    fn finish(&self, report: &RunReport) {
        self.bar
            .finish_with_message(format!("{} failed", report.failed.len()));
    }
}

/// Discards progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn update(&self, _processed: usize, _total: usize, _elapsed: Duration) {}
}
