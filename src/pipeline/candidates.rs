//! Local re-validation of search results.

use crate::models::{Course, CourseFilter, SisId};
use tracing::{debug, warn};

/// A course that passed the filter, with its decomposed SIS id.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub course: Course,
    pub sis: SisId,
}

/// Outcome of filtering one search result set.
#[derive(Debug, Default)]
pub struct CandidateSet {
    pub candidates: Vec<Candidate>,
    /// Courses returned by the search.
    pub fetched: usize,
    /// Courses rejected for a malformed SIS id.
    pub invalid: usize,
    /// Courses with a valid SIS id that did not match the filter.
    pub unmatched: usize,
}

/// Keep the courses whose SIS id matches `filter` exactly.
///
/// Malformed SIS ids are logged and excluded; they never abort the run.
pub fn select_candidates(courses: Vec<Course>, filter: &CourseFilter) -> CandidateSet {
    let mut set = CandidateSet {
        fetched: courses.len(),
        ..Default::default()
    };

    for course in courses {
        match course.sis_id() {
            Ok(sis) if filter.matches(&sis) => set.candidates.push(Candidate { course, sis }),
            Ok(sis) => {
                debug!("Skipping course {} ({}): does not match {}", course.id, sis, filter);
                set.unmatched += 1;
            }
            Err(e) => {
                warn!("Skipping course {} ({}): {}", course.id, course.name, e);
                set.invalid += 1;
            }
        }
    }

    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::course;

    #[test]
    fn test_select_candidates() {
        let mut no_sis = course(4, "", "wiki");
        no_sis.sis_course_id = None;

        let courses = vec![
            course(1, "6253-X-ENGL-1301", "wiki"),
            course(2, "6253-X-MATH-1301", "syllabus"),
            course(3, "6253-ENGL-1301", "wiki"),
            no_sis,
            course(5, "6253-Y-ENGL-2311", "modules"),
        ];

        let set = select_candidates(courses, &CourseFilter::new("6253", "ENGL", None));

        let ids: Vec<u64> = set.candidates.iter().map(|c| c.course.id).collect();
        assert_eq!(ids, vec![1, 5]);
        assert_eq!(set.fetched, 5);
        assert_eq!(set.invalid, 2);
        assert_eq!(set.unmatched, 1);
    }

    #[test]
    fn test_select_candidates_with_catalog() {
        let courses = vec![
            course(1, "6253-X-ENGL-1301", "wiki"),
            course(2, "6253-X-ENGL-1302", "wiki"),
        ];

        let filter = CourseFilter::new("6253", "ENGL", Some("1302".to_string()));
        let set = select_candidates(courses, &filter);

        assert_eq!(set.candidates.len(), 1);
        assert_eq!(set.candidates[0].sis.catalog, "1302");
    }
}
