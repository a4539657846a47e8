//! In-memory Canvas used by unit tests.

use super::{CanvasApi, CourseEvent, Page, PageRequest};
use crate::error::ApiError;
use crate::models::Course;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

enum FakePage {
    Ok(Page),
    Status(u16),
    MalformedLink,
    Decode,
}

/// Canned responses keyed by URL / course id, plus call recording.
#[derive(Default)]
pub struct FakeCanvas {
    pages: HashMap<String, FakePage>,
    front_pages: HashMap<u64, String>,
    failing_changes: HashSet<u64>,
    probe_delay: Option<Duration>,
    cancel_on_change: Option<CancellationToken>,
    pub page_calls: AtomicUsize,
    pub probed: Mutex<Vec<u64>>,
    pub changed: Mutex<Vec<u64>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

/// Build a course with an active workflow state.
pub fn course(id: u64, sis: &str, view: &str) -> Course {
    Course {
        id,
        name: format!("Course {}", id),
        course_code: None,
        sis_course_id: Some(sis.to_string()),
        format: Some("on_campus".to_string()),
        default_view: Some(view.to_string()),
        workflow_state: Some("active".to_string()),
    }
}

impl FakeCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, courses: Vec<Course>, next: Option<&str>) -> Self {
        let page = Page {
            courses,
            next: next.map(PageRequest::new),
        };
        self.pages.insert(url.to_string(), FakePage::Ok(page));
        self
    }

    pub fn with_failing_page(mut self, url: &str, status: u16) -> Self {
        self.pages.insert(url.to_string(), FakePage::Status(status));
        self
    }

    pub fn with_malformed_page(mut self, url: &str) -> Self {
        self.pages.insert(url.to_string(), FakePage::MalformedLink);
        self
    }

    /// Page whose body does not decode into courses.
    pub fn with_undecodable_page(mut self, url: &str) -> Self {
        self.pages.insert(url.to_string(), FakePage::Decode);
        self
    }

    /// Front page body for a course. Courses without one answer 404.
    pub fn with_front_page(mut self, course_id: u64, body: &str) -> Self {
        self.front_pages.insert(course_id, body.to_string());
        self
    }

    pub fn with_failing_change(mut self, course_id: u64) -> Self {
        self.failing_changes.insert(course_id);
        self
    }

    /// Fire `cancel` from inside every state change, as an interrupt would.
    pub fn with_cancel_on_change(mut self, cancel: CancellationToken) -> Self {
        self.cancel_on_change = Some(cancel);
        self
    }

    pub fn with_probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = Some(delay);
        self
    }

    pub fn probed(&self) -> Vec<u64> {
        let mut ids = self.probed.lock().unwrap().clone();
        ids.sort_unstable();
        ids
    }

    pub fn changed(&self) -> Vec<u64> {
        self.changed.lock().unwrap().clone()
    }
}

#[async_trait]
impl CanvasApi for FakeCanvas {
    fn search_request(&self, search_term: &str) -> Result<PageRequest, ApiError> {
        Ok(PageRequest::new(format!("search:{}", search_term)))
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<Page, ApiError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        match self.pages.get(&request.url) {
            Some(FakePage::Ok(page)) => Ok(page.clone()),
            Some(FakePage::Status(status)) => Err(ApiError::Status {
                status: *status,
                url: request.url.clone(),
            }),
            Some(FakePage::MalformedLink) => {
                Err(ApiError::MalformedLink(format!("<{}>; rel=\"next\"; x", request.url)))
            }
            Some(FakePage::Decode) => Err(ApiError::Decode {
                url: request.url.clone(),
                reason: "expected a sequence".to_string(),
            }),
            None => Err(ApiError::Status {
                status: 404,
                url: request.url.clone(),
            }),
        }
    }

    async fn fetch_front_page(&self, course_id: u64) -> Result<String, ApiError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.probed.lock().unwrap().push(course_id);

        if let Some(delay) = self.probe_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.front_pages
            .get(&course_id)
            .cloned()
            .ok_or_else(|| ApiError::Status {
                status: 404,
                url: format!("courses/{}/front_page", course_id),
            })
    }

    async fn change_state(&self, course_id: u64, event: CourseEvent) -> Result<String, ApiError> {
        self.changed.lock().unwrap().push(course_id);
        if let Some(ref cancel) = self.cancel_on_change {
            cancel.cancel();
        }
        if self.failing_changes.contains(&course_id) {
            return Err(ApiError::Timeout {
                url: format!("courses/{}", course_id),
                seconds: 10,
            });
        }
        Ok(event.target_state().to_string())
    }
}
