//! Result aggregation and statistics.
//!
//! This module consumes the per-course result stream and computes the
//! report counters and table. It performs no I/O.

use crate::models::{CourseResult, ProbeStatus, ReportData, ReportRow};
use tokio::sync::mpsc;

/// Accumulates results in arrival order.
#[derive(Debug, Default)]
pub struct Aggregator {
    data: ReportData,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one result.
    pub fn push(&mut self, result: &CourseResult) {
        if result.used_wiki {
            self.data.used_wiki_count += 1;
            if result.found_module_link {
                self.data.found_module_link_count += 1;
            }
            if result.probe_status == ProbeStatus::Failed {
                self.data.probe_failed_count += 1;
            }
        } else {
            self.data.used_other_count += 1;
        }

        self.data.table.push(ReportRow::from(result));
    }

    /// Receive until the stream is closed.
    ///
    /// `on_result` is called after each result is counted.
    pub async fn drain<F>(mut self, mut results: mpsc::Receiver<CourseResult>, mut on_result: F) -> Self
    where
        F: FnMut(&CourseResult),
    {
        while let Some(result) = results.recv().await {
            self.push(&result);
            on_result(&result);
        }
        self
    }

    /// Number of rows received so far.
    pub fn len(&self) -> usize {
        self.data.table.len()
    }

    /// Seal the report. `total_courses` is the number of candidates that
    /// were dispatched, which can exceed the row count.
    pub fn finish(mut self, total_courses: usize) -> ReportData {
        self.data.total_courses = total_courses;
        self.data
    }
}

/// Aggregate an already collected sequence of results.
pub fn summarize<I>(results: I, total_courses: usize) -> ReportData
where
    I: IntoIterator<Item = CourseResult>,
{
    let mut aggregator = Aggregator::new();
    for result in results {
        aggregator.push(&result);
    }
    aggregator.finish(total_courses)
}

/// Percentage of wiki courses whose front page links to modules.
pub fn module_link_rate(data: &ReportData) -> Option<f64> {
    if data.used_wiki_count == 0 {
        return None;
    }
    Some(data.found_module_link_count as f64 / data.used_wiki_count as f64 * 100.0)
}

/// Generate a text summary of the report counters.
pub fn generate_summary_text(data: &ReportData) -> String {
    let mut lines = Vec::new();

    lines.push(format!("Courses inspected: {}", data.total_courses));
    lines.push(format!("Rows reported: {}", data.table.len()));
    lines.push(format!("- Wiki front page: {}", data.used_wiki_count));
    match module_link_rate(data) {
        Some(rate) => lines.push(format!(
            "  - Linking to modules: {} ({:.1}%)",
            data.found_module_link_count, rate
        )),
        None => lines.push("  - Linking to modules: 0".to_string()),
    }
    if data.probe_failed_count > 0 {
        lines.push(format!(
            "  - Front page check failed: {}",
            data.probe_failed_count
        ));
    }
    lines.push(format!("- Other default view: {}", data.used_other_count));

    lines.join("\n")
}
