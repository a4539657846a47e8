//! Cursor-following course search.

use super::{CanvasApi, PageRequest};
use crate::error::ApiError;
use crate::models::Course;
use tracing::{debug, info, warn};

/// Extract the `rel="next"` URL from a `Link` header.
///
/// A missing header ends the walk. Entries with any other `rel` are ignored.
/// A `next` entry that is not exactly `<url>; rel="next"` is an error.
pub fn parse_next_link(header: Option<&str>) -> Result<Option<String>, ApiError> {
    let header = match header.map(str::trim) {
        Some(h) if !h.is_empty() => h,
        _ => {
            warn!("Response has no Link header, treating it as the last page");
            return Ok(None);
        }
    };

    for entry in header.split(',') {
        if !entry.contains(r#"rel="next""#) {
            continue;
        }

        let parts: Vec<&str> = entry.split(';').collect();
        if parts.len() != 2 {
            return Err(ApiError::MalformedLink(entry.trim().to_string()));
        }

        let url = parts[0]
            .trim()
            .trim_start_matches('<')
            .trim_end_matches('>');
        if url.is_empty() {
            return Err(ApiError::MalformedLink(entry.trim().to_string()));
        }

        return Ok(Some(url.to_string()));
    }

    Ok(None)
}

/// Walk every page of a course search starting at `seed`.
///
/// Pages are concatenated in cursor order. Any failed page aborts the walk;
/// partial results are never returned.
pub async fn fetch_all_courses<A>(api: &A, seed: PageRequest) -> Result<Vec<Course>, ApiError>
where
    A: CanvasApi + ?Sized,
{
    let mut courses = Vec::new();
    let mut next = Some(seed);
    let mut pages = 0usize;

    while let Some(request) = next {
        debug!("Fetching course page {}: {}", pages + 1, request.url);
        let page = api.fetch_page(&request).await?;
        pages += 1;

        debug!("Page {} returned {} courses", pages, page.courses.len());
        courses.extend(page.courses);
        next = page.next;
    }

    info!("Fetched {} courses in {} pages", courses.len(), pages);
    Ok(courses)
}
