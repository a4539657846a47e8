//! Per-course inspection: the front page modules-link probe.

use super::candidates::Candidate;
use crate::api::CanvasApi;
use crate::models::{CourseResult, ProbeStatus};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Anchor pointing at a course modules page, relative or absolute https.
static MODULES_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"href=["'](?:https://[^"']+)?/courses/\d+/modules["']"#)
        .expect("modules link pattern is valid")
});

/// Whether an HTML body links to a course modules page.
pub fn has_modules_link(body: &str) -> bool {
    MODULES_LINK.is_match(body)
}

/// Inspect one candidate.
///
/// Only wiki courses are probed. A failed probe is logged and the course
/// still produces a result, marked `ProbeStatus::Failed`.
pub async fn inspect_course<A>(api: &A, candidate: Candidate) -> CourseResult
where
    A: CanvasApi + ?Sized,
{
    let Candidate { course, sis } = candidate;

    if !course.uses_wiki() {
        return CourseResult::new(&course, &sis, ProbeStatus::Skipped);
    }

    match api.fetch_front_page(course.id).await {
        Ok(body) => {
            let status = if has_modules_link(&body) {
                ProbeStatus::Found
            } else {
                ProbeStatus::NotFound
            };
            debug!("Course {} front page: modules link {}", course.id, status);
            CourseResult::new(&course, &sis, status)
        }
        Err(e) => {
            warn!("Error checking front page of course {} ({}): {}", course.id, sis, e);
            CourseResult::new(&course, &sis, ProbeStatus::Failed).with_probe_error(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{course, FakeCanvas};

    fn candidate(id: u64, view: &str) -> Candidate {
        let course = course(id, "6253-X-ENGL-1301", view);
        let sis = course.sis_id().unwrap();
        Candidate { course, sis }
    }

    #[test]
    fn test_modules_link_pattern() {
        assert!(has_modules_link(r#"<a href="/courses/1/modules">Start</a>"#));
        assert!(has_modules_link(
            r#"<a href='https://school.instructure.com/courses/991/modules'>Go</a>"#
        ));
        assert!(!has_modules_link(r#"<a href="/courses/1/modules/items/4">x</a>"#));
        assert!(!has_modules_link(r#"<a href="/courses/1/pages">x</a>"#));
        assert!(!has_modules_link(r#"<a href="http://evil.test/courses/1/modules">x</a>"#));
        assert!(!has_modules_link(""));
    }

    #[tokio::test]
    async fn test_wiki_course_with_link() {
        let api = FakeCanvas::new().with_front_page(1, r#"<a href="/courses/1/modules">Modules</a>"#);

        let result = inspect_course(&api, candidate(1, "wiki")).await;

        assert!(result.used_wiki);
        assert!(result.found_module_link);
        assert_eq!(result.probe_status, ProbeStatus::Found);
    }

    #[tokio::test]
    async fn test_wiki_course_without_link() {
        let api = FakeCanvas::new().with_front_page(1, "<p>Welcome</p>");

        let result = inspect_course(&api, candidate(1, "wiki")).await;

        assert!(!result.found_module_link);
        assert_eq!(result.probe_status, ProbeStatus::NotFound);
        assert_eq!(result.probe_error, None);
    }

    #[tokio::test]
    async fn test_failed_probe_still_yields_result() {
        let api = FakeCanvas::new();

        let result = inspect_course(&api, candidate(1, "wiki")).await;

        assert!(result.used_wiki);
        assert!(!result.found_module_link);
        assert_eq!(result.probe_status, ProbeStatus::Failed);
        assert!(result.probe_error.unwrap().contains("404"));
    }

    #[tokio::test]
    async fn test_non_wiki_course_is_not_probed() {
        let api = FakeCanvas::new().with_front_page(2, r#"<a href="/courses/2/modules">x</a>"#);

        let result = inspect_course(&api, candidate(2, "syllabus")).await;

        assert!(!result.used_wiki);
        assert!(!result.found_module_link);
        assert_eq!(result.probe_status, ProbeStatus::Skipped);
        assert!(api.probed().is_empty());
    }
}
