//! Canvas REST API access.
//!
//! The pipeline only talks to Canvas through the [`CanvasApi`] trait so the
//! HTTP client can be swapped for an in-memory fake in tests.

pub mod client;
pub mod pagination;

#[cfg(test)]
pub mod fake;

pub use client::HttpCanvasClient;
pub use pagination::{fetch_all_courses, parse_next_link};

use crate::error::ApiError;
use crate::models::{Course, CONCLUDED_STATE};
use async_trait::async_trait;

/// Page size used for every course search.
pub const PAGE_SIZE: u32 = 100;

/// A request for one page of course search results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub url: String,
}

impl PageRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// One page of course search results.
#[derive(Debug, Clone)]
pub struct Page {
    pub courses: Vec<Course>,
    /// Cursor for the following page, `None` on the last page.
    pub next: Option<PageRequest>,
}

/// State-changing course events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseEvent {
    Conclude,
}

impl CourseEvent {
    /// Value of the `course[event]` parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseEvent::Conclude => "conclude",
        }
    }

    /// Workflow state a course is in after the event.
    pub fn target_state(&self) -> &'static str {
        match self {
            CourseEvent::Conclude => CONCLUDED_STATE,
        }
    }
}

/// Operations the pipeline needs from Canvas.
#[async_trait]
pub trait CanvasApi: Send + Sync {
    /// Seed request for a course search.
    fn search_request(&self, search_term: &str) -> Result<PageRequest, ApiError>;

    /// Fetch one page of courses and the cursor for the next one.
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page, ApiError>;

    /// Fetch the HTML body of a course's front page.
    async fn fetch_front_page(&self, course_id: u64) -> Result<String, ApiError>;

    /// Apply an event to a course. Returns the new workflow state.
    async fn change_state(&self, course_id: u64, event: CourseEvent) -> Result<String, ApiError>;
}
