//! Data models for the course scanner.
//!
//! This module contains the core data structures used throughout the
//! application: courses as returned by Canvas, the filter used to select
//! them, per-course results and the aggregated report.

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `default_view` value that marks a course as using a wiki front page.
pub const WIKI_VIEW: &str = "wiki";

/// Workflow state of a course that has been concluded.
pub const CONCLUDED_STATE: &str = "concluded";

/// A course as returned by the Canvas courses API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    /// Canvas course id.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Short course code.
    #[serde(default)]
    pub course_code: Option<String>,
    /// Composite SIS id, `TERM-CAMPUS-SUBJECT-CATALOG`.
    #[serde(default)]
    pub sis_course_id: Option<String>,
    /// Content format (on_campus, online, blended).
    #[serde(default, rename = "course_format")]
    pub format: Option<String>,
    /// Landing page type (wiki, modules, syllabus, ...).
    #[serde(default)]
    pub default_view: Option<String>,
    /// Lifecycle state (active, concluded, ...).
    #[serde(default)]
    pub workflow_state: Option<String>,
}

impl Course {
    /// Whether the course lands on a wiki front page.
    pub fn uses_wiki(&self) -> bool {
        self.default_view.as_deref() == Some(WIKI_VIEW)
    }

    /// Decompose the SIS id.
    pub fn sis_id(&self) -> Result<SisId, ValidationError> {
        match self.sis_course_id.as_deref() {
            Some(raw) => SisId::parse(raw),
            None => Err(ValidationError::MalformedSisId(String::new())),
        }
    }
}

/// Decomposed SIS course id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SisId {
    pub term: String,
    pub campus: String,
    pub subject: String,
    pub catalog: String,
}

impl SisId {
    /// Parse `TERM-CAMPUS-SUBJECT-CATALOG`. Anything other than exactly four
    /// segments is rejected.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let parts: Vec<&str> = raw.split('-').collect();
        match parts.as_slice() {
            [term, campus, subject, catalog] => Ok(Self {
                term: term.to_string(),
                campus: campus.to_string(),
                subject: subject.to_string(),
                catalog: catalog.to_string(),
            }),
            _ => Err(ValidationError::MalformedSisId(raw.to_string())),
        }
    }
}

impl fmt::Display for SisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}",
            self.term, self.campus, self.subject, self.catalog
        )
    }
}

/// Term/subject/catalog selection.
///
/// The remote search is fuzzy, so every returned course is checked again
/// here with exact matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseFilter {
    pub term: String,
    pub subject: String,
    /// `None` accepts any catalog number.
    pub catalog: Option<String>,
}

impl CourseFilter {
    /// Create a filter. An empty catalog is the same as no catalog.
    pub fn new(
        term: impl Into<String>,
        subject: impl Into<String>,
        catalog: Option<String>,
    ) -> Self {
        Self {
            term: term.into(),
            subject: subject.into(),
            catalog: catalog.filter(|c| !c.trim().is_empty()),
        }
    }

    /// Query string sent to the Canvas course search.
    pub fn search_term(&self) -> String {
        format!("{}-{}", self.term, self.subject)
    }

    /// Exact match on the decomposed SIS id.
    pub fn matches(&self, sis: &SisId) -> bool {
        sis.term == self.term
            && sis.subject == self.subject
            && self.catalog.as_ref().map_or(true, |c| *c == sis.catalog)
    }
}

impl fmt::Display for CourseFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.catalog {
            Some(ref catalog) => write!(f, "{} {} {}", self.term, self.subject, catalog),
            None => write!(f, "{} {}", self.term, self.subject),
        }
    }
}

/// Outcome of the front page probe for one course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    /// Course does not use a wiki front page; no request was made.
    Skipped,
    /// Front page links to the modules page.
    Found,
    /// Front page fetched, no modules link.
    NotFound,
    /// Front page could not be fetched or decoded. Treated as not found.
    Failed,
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStatus::Skipped => write!(f, "skipped"),
            ProbeStatus::Found => write!(f, "found"),
            ProbeStatus::NotFound => write!(f, "not found"),
            ProbeStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Result of inspecting a single course. Sent once on the result stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseResult {
    pub course_id: u64,
    pub term: String,
    pub subject: String,
    pub catalog: String,
    pub name: String,
    pub format: String,
    pub default_view: String,
    pub used_wiki: bool,
    /// Only meaningful when `used_wiki` is true.
    pub found_module_link: bool,
    pub probe_status: ProbeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_error: Option<String>,
}

impl CourseResult {
    /// Build a result from a course, its SIS id and the probe outcome.
    pub fn new(course: &Course, sis: &SisId, probe_status: ProbeStatus) -> Self {
        Self {
            course_id: course.id,
            term: sis.term.clone(),
            subject: sis.subject.clone(),
            catalog: sis.catalog.clone(),
            name: course.name.clone(),
            format: course.format.clone().unwrap_or_default(),
            default_view: course.default_view.clone().unwrap_or_default(),
            used_wiki: course.uses_wiki(),
            found_module_link: probe_status == ProbeStatus::Found,
            probe_status,
            probe_error: None,
        }
    }

    /// Attach the error that caused a failed probe.
    pub fn with_probe_error(mut self, error: impl Into<String>) -> Self {
        self.probe_error = Some(error.into());
        self
    }
}

/// One display row of the report table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    pub course_id: u64,
    pub term: String,
    pub subject: String,
    pub catalog: String,
    pub name: String,
    pub format: String,
    pub default_view: String,
    /// "Yes" or "No".
    pub used_wiki: String,
    /// "Yes", "No", or "N/A" when the course does not use a wiki.
    pub found_module_link: String,
    pub probe_status: ProbeStatus,
}

impl From<&CourseResult> for ReportRow {
    fn from(result: &CourseResult) -> Self {
        let (used_wiki, found_module_link) = match (result.used_wiki, result.found_module_link) {
            (true, true) => ("Yes", "Yes"),
            (true, false) => ("Yes", "No"),
            (false, _) => ("No", "N/A"),
        };

        Self {
            course_id: result.course_id,
            term: result.term.clone(),
            subject: result.subject.clone(),
            catalog: result.catalog.clone(),
            name: result.name.clone(),
            format: result.format.clone(),
            default_view: result.default_view.clone(),
            used_wiki: used_wiki.to_string(),
            found_module_link: found_module_link.to_string(),
            probe_status: result.probe_status,
        }
    }
}

/// Aggregated counters and rows for one run.
///
/// Rows are in arrival order on the result stream, which is not
/// deterministic across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportData {
    pub table: Vec<ReportRow>,
    pub used_wiki_count: usize,
    pub found_module_link_count: usize,
    pub used_other_count: usize,
    /// Wiki courses whose probe failed; included in `used_wiki_count`.
    pub probe_failed_count: usize,
    /// Candidates dispatched for inspection, whether or not they produced a row.
    pub total_courses: usize,
}

/// Metadata about the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub term: String,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub duration_seconds: f64,
}

/// The complete audit report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    #[serde(flatten)]
    pub data: ReportData,
}

/// State of a conclude candidate captured before any change is made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub course_id: u64,
    pub term: String,
    pub subject: String,
    pub catalog: String,
    pub name: String,
    pub previous_state: String,
}

impl StateSnapshot {
    /// Capture the current state of a course.
    pub fn capture(course: &Course, sis: &SisId) -> Self {
        Self {
            course_id: course.id,
            term: sis.term.clone(),
            subject: sis.subject.clone(),
            catalog: sis.catalog.clone(),
            name: course.name.clone(),
            previous_state: course.workflow_state.clone().unwrap_or_default(),
        }
    }

    /// Whether the course is already concluded.
    pub fn is_concluded(&self) -> bool {
        self.previous_state == CONCLUDED_STATE
    }
}

/// What the conclude pass did with a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionOutcome {
    Concluded,
    /// Already concluded; no request made.
    Skipped,
    Failed,
    /// Dry run; no request made.
    WouldConclude,
    /// Run was interrupted before this course was reached; no request made.
    NotAttempted,
}

/// Before/after record of one course in the conclude pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    #[serde(flatten)]
    pub snapshot: StateSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_state: Option<String>,
    pub outcome: TransitionOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a conclude pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcludeReport {
    pub filter: CourseFilter,
    pub generated_at: DateTime<Utc>,
    pub dry_run: bool,
    pub transitions: Vec<StateTransition>,
    pub concluded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub would_conclude: usize,
    pub not_attempted: usize,
}

impl ConcludeReport {
    /// Build a report and tally outcomes.
    pub fn new(filter: CourseFilter, dry_run: bool, transitions: Vec<StateTransition>) -> Self {
        let count = |outcome| transitions.iter().filter(|t| t.outcome == outcome).count();
        let concluded = count(TransitionOutcome::Concluded);
        let skipped = count(TransitionOutcome::Skipped);
        let failed = count(TransitionOutcome::Failed);
        let would_conclude = count(TransitionOutcome::WouldConclude);
        let not_attempted = count(TransitionOutcome::NotAttempted);

        Self {
            filter,
            generated_at: Utc::now(),
            dry_run,
            transitions,
            concluded,
            skipped,
            failed,
            would_conclude,
            not_attempted,
        }
    }
}
