//! Report generation.
//!
//! This module renders the audit report as JSON or CSV and writes report
//! files under the output directory.

use crate::cli::OutputFormat;
use crate::models::{ConcludeReport, Report};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// CSV header, in column order.
pub const CSV_HEADER: [&str; 9] = [
    "course_id",
    "term",
    "subject",
    "catalog",
    "name",
    "format",
    "default_view",
    "used_wiki",
    "found_module_link",
];

/// Generate a pretty-printed JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Generate a CSV report of the table rows.
pub fn generate_csv_report(report: &Report) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for row in &report.data.table {
        let course_id = row.course_id.to_string();
        writer.write_record([
            course_id.as_str(),
            row.term.as_str(),
            row.subject.as_str(),
            row.catalog.as_str(),
            row.name.as_str(),
            row.format.as_str(),
            row.default_view.as_str(),
            row.used_wiki.as_str(),
            row.found_module_link.as_str(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV writer: {}", e))?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// File name for an audit report: `report-<term>-<subject>.<ext>`.
pub fn report_file_name(report: &Report, format: OutputFormat) -> String {
    format!(
        "report-{}-{}.{}",
        report.metadata.term,
        report.metadata.subject,
        format.extension()
    )
}

/// Render and write an audit report, creating `dir` if needed.
pub fn write_report(report: &Report, dir: &Path, format: OutputFormat) -> Result<PathBuf> {
    let content = match format {
        OutputFormat::Json => generate_json_report(report)?,
        OutputFormat::Csv => generate_csv_report(report)?,
    };

    let path = dir.join(report_file_name(report, format));
    write_file(&path, &content)?;
    info!("Report written to {}", path.display());
    Ok(path)
}

/// Write the conclude pass record as `conclude-<term>-<subject>.json`.
pub fn write_conclude_report(report: &ConcludeReport, dir: &Path) -> Result<PathBuf> {
    let content = serde_json::to_string_pretty(report)?;
    let path = dir.join(format!(
        "conclude-{}-{}.json",
        report.filter.term, report.filter.subject
    ));
    write_file(&path, &content)?;
    info!("Conclude record written to {}", path.display());
    Ok(path)
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::summarize;
    use crate::api::fake::course;
    use crate::models::{CourseFilter, CourseResult, ProbeStatus, ReportMetadata};
    use chrono::Utc;

    fn create_test_report() -> Report {
        let mut wiki = course(1, "6253-X-ENGL-1301", "wiki");
        wiki.name = "Composition I, Online".to_string();
        let other = course(2, "6253-X-ENGL-1302", "syllabus");

        let results = vec![
            CourseResult::new(&wiki, &wiki.sis_id().unwrap(), ProbeStatus::Found),
            CourseResult::new(&other, &other.sis_id().unwrap(), ProbeStatus::Skipped),
        ];

        Report {
            metadata: ReportMetadata {
                term: "6253".to_string(),
                subject: "ENGL".to_string(),
                catalog: None,
                generated_at: Utc::now(),
                duration_seconds: 1.5,
            },
            data: summarize(results, 2),
        }
    }

    #[test]
    fn test_generate_json_report() {
        let report = create_test_report();
        let json = generate_json_report(&report).unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["used_wiki_count"], 1);
        assert_eq!(value["found_module_link_count"], 1);
        assert_eq!(value["used_other_count"], 1);
        assert_eq!(value["total_courses"], 2);
        assert_eq!(value["table"][1]["found_module_link"], "N/A");
        assert_eq!(value["metadata"]["term"], "6253");
        // pretty printed
        assert!(json.contains("\n  \""));
    }

    #[test]
    fn test_generate_csv_report() {
        let report = create_test_report();
        let csv = generate_csv_report(&report).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(
            lines[0],
            "course_id,term,subject,catalog,name,format,default_view,used_wiki,found_module_link"
        );
        assert_eq!(
            lines[1],
            "1,6253,ENGL,1301,\"Composition I, Online\",on_campus,wiki,Yes,Yes"
        );
        assert_eq!(lines[2], "2,6253,ENGL,1302,Course 2,on_campus,syllabus,No,N/A");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_write_report_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("data");
        let report = create_test_report();

        let path = write_report(&report, &dir, OutputFormat::Csv).unwrap();

        assert_eq!(path, dir.join("report-6253-ENGL.csv"));
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("course_id,"));

        let path = write_report(&report, &dir, OutputFormat::Json).unwrap();
        assert_eq!(path, dir.join("report-6253-ENGL.json"));
    }

    #[test]
    fn test_write_conclude_report() {
        let tmp = tempfile::tempdir().unwrap();
        let report = ConcludeReport::new(CourseFilter::new("6251", "ENGL", None), true, vec![]);

        let path = write_conclude_report(&report, tmp.path()).unwrap();

        assert_eq!(path, tmp.path().join("conclude-6251-ENGL.json"));
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["dry_run"], true);
        assert_eq!(value["concluded"], 0);
    }
}
