//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::CourseFilter;
use crate::pipeline::MAX_CONCURRENCY;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Coursescan - audit and conclude Canvas courses
///
/// Finds the courses of a term and subject, checks whether their wiki
/// front pages link to the modules page, and writes a JSON or CSV report.
/// Optionally concludes the courses of a second term afterwards.
///
/// Examples:
///   coursescan --term 6253 --subject ENGL
///   coursescan --term 6253 --subject ENGL --catalog 1301 --format csv
///   coursescan --term 6253 --subject ENGL --conclude-term 6251 --conclude-subject ENGL
///   coursescan --skip-audit --conclude-term 6251 --conclude-subject ENGL --dry-run
///   coursescan --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Term code to audit (first SIS id segment)
    #[arg(short, long, required_unless_present_any = ["init_config", "skip_audit"])]
    pub term: Option<String>,

    /// Subject to audit (third SIS id segment)
    #[arg(short, long, required_unless_present_any = ["init_config", "skip_audit"])]
    pub subject: Option<String>,

    /// Catalog number to audit; any catalog when omitted
    #[arg(long)]
    pub catalog: Option<String>,

    /// Term whose courses are concluded after the audit
    #[arg(long, value_name = "TERM", requires = "conclude_subject")]
    pub conclude_term: Option<String>,

    /// Subject whose courses are concluded after the audit
    #[arg(long, value_name = "SUBJECT", requires = "conclude_term")]
    pub conclude_subject: Option<String>,

    /// Catalog number to conclude; any catalog when omitted
    #[arg(long, value_name = "CATALOG")]
    pub conclude_catalog: Option<String>,

    /// Only run the conclude pass
    #[arg(long)]
    pub skip_audit: bool,

    /// Show which courses would be concluded without changing them
    #[arg(long)]
    pub dry_run: bool,

    /// Canvas API token
    #[arg(long, env = "CANVAS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Canvas API base URL (e.g. https://school.instructure.com/api/v1/)
    #[arg(long, env = "CANVAS_API_URL", value_name = "URL")]
    pub api_url: Option<String>,

    /// Maximum number of courses inspected at once
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Pause in seconds between the audit and the conclude pass
    #[arg(long, value_name = "SECS")]
    pub cooldown: Option<u64>,

    /// Report format (json, csv)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Directory reports are written to
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .coursescan.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .coursescan.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Pretty-printed JSON (default)
    #[default]
    Json,
    /// CSV table
    Csv,
}

impl OutputFormat {
    /// File extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if !self.skip_audit {
            let term = self.term.as_deref().unwrap_or("").trim();
            let subject = self.subject.as_deref().unwrap_or("").trim();
            if term.is_empty() || subject.is_empty() {
                return Err("--term and --subject must not be empty".to_string());
            }
        }

        if self.skip_audit && self.conclude_filter().is_none() {
            return Err(
                "--skip-audit requires --conclude-term and --conclude-subject".to_string(),
            );
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        // Validate concurrency
        match self.concurrency {
            Some(0) => return Err("Concurrency must be at least 1".to_string()),
            Some(n) if n > MAX_CONCURRENCY => {
                return Err(format!("Concurrency must be at most {}", MAX_CONCURRENCY))
            }
            _ => {}
        }

        // Validate timeout if provided
        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Filter for the audit pass, `None` with --skip-audit.
    pub fn audit_filter(&self) -> Option<CourseFilter> {
        if self.skip_audit {
            return None;
        }
        match (&self.term, &self.subject) {
            (Some(term), Some(subject)) => Some(CourseFilter::new(
                term.trim(),
                subject.trim(),
                self.catalog.clone(),
            )),
            _ => None,
        }
    }

    /// Filter for the conclude pass, `None` when not requested.
    pub fn conclude_filter(&self) -> Option<CourseFilter> {
        match (&self.conclude_term, &self.conclude_subject) {
            (Some(term), Some(subject)) if !term.trim().is_empty() && !subject.trim().is_empty() => {
                Some(CourseFilter::new(
                    term.trim(),
                    subject.trim(),
                    self.conclude_catalog.clone(),
                ))
            }
            _ => None,
        }
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
