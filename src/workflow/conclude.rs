//! Conclude pass: move matching courses to the concluded state.
//!
//! Candidates are gathered and snapshotted on the worker pool like the
//! audit, then changed strictly one at a time. The pool's cancellation
//! token is checked before every change; once it fires, the remaining
//! courses are recorded as not attempted and no further request is sent.

use crate::api::{CanvasApi, CourseEvent};
use crate::models::{
    ConcludeReport, CourseFilter, StateSnapshot, StateTransition, TransitionOutcome,
};
use crate::pipeline::{find_candidates, Candidate, ResultStream, WorkerPool};
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Concludes every active course matching a filter.
pub struct ConcludeWorkflow<A: ?Sized> {
    api: Arc<A>,
    pool: WorkerPool,
    cancel: CancellationToken,
    dry_run: bool,
}

impl<A> ConcludeWorkflow<A>
where
    A: CanvasApi + ?Sized + 'static,
{
    /// Create a workflow. It stops when `pool`'s cancellation token fires.
    pub fn new(api: Arc<A>, pool: WorkerPool) -> Self {
        let cancel = pool.cancellation().clone();
        Self {
            api,
            pool,
            cancel,
            dry_run: false,
        }
    }

    /// Record what would change without sending any state change.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run the pass for `filter`.
    ///
    /// Fetch errors are fatal, as is an interrupt while snapshots are being
    /// taken. A failed state change is logged and recorded, and the pass
    /// moves on to the next course.
    pub async fn run(&self, filter: &CourseFilter) -> Result<ConcludeReport> {
        let snapshots = self.snapshot(filter).await?;
        info!(
            "Concluding {} candidate courses for {}{}",
            snapshots.len(),
            filter,
            if self.dry_run { " (dry run)" } else { "" }
        );

        let mut transitions = Vec::with_capacity(snapshots.len());
        for snapshot in snapshots {
            if self.cancel.is_cancelled() {
                transitions.push(not_attempted(snapshot));
                continue;
            }
            transitions.push(self.transition(snapshot).await);
        }

        let not_reached = transitions
            .iter()
            .filter(|t| t.outcome == TransitionOutcome::NotAttempted)
            .count();
        if not_reached > 0 {
            warn!("Interrupted, {} courses were not attempted", not_reached);
        }

        Ok(ConcludeReport::new(filter.clone(), self.dry_run, transitions))
    }

    /// Capture the current state of every candidate.
    async fn snapshot(&self, filter: &CourseFilter) -> Result<Vec<StateSnapshot>> {
        let set = find_candidates(self.api.as_ref(), filter).await?;

        let ResultStream {
            mut results,
            completion,
        } = self.pool.run(set.candidates, |candidate: Candidate| async move {
            Some(StateSnapshot::capture(&candidate.course, &candidate.sis))
        });

        let mut snapshots = Vec::new();
        while let Some(snapshot) = results.recv().await {
            snapshots.push(snapshot);
        }
        let stats = completion.await.context("Worker pool coordinator failed")?;
        if stats.cancelled > 0 {
            bail!(
                "Interrupted while reading course states ({} of {} not read)",
                stats.cancelled,
                stats.dispatched
            );
        }

        // Pool order is arbitrary; change courses in a stable order.
        snapshots.sort_by_key(|s| s.course_id);
        Ok(snapshots)
    }

    async fn transition(&self, snapshot: StateSnapshot) -> StateTransition {
        let record = |outcome, new_state: Option<String>, error: Option<String>| StateTransition {
            snapshot: snapshot.clone(),
            new_state,
            outcome,
            error,
        };

        if snapshot.is_concluded() {
            debug!("Course {} already concluded, skipping", snapshot.course_id);
            return record(TransitionOutcome::Skipped, None, None);
        }

        if self.dry_run {
            info!(
                "Would conclude course {} ({}), currently '{}'",
                snapshot.course_id, snapshot.name, snapshot.previous_state
            );
            return record(TransitionOutcome::WouldConclude, None, None);
        }

        match self
            .api
            .change_state(snapshot.course_id, CourseEvent::Conclude)
            .await
        {
            Ok(new_state) => {
                info!(
                    "Course {} ({}): {} -> {}",
                    snapshot.course_id, snapshot.name, snapshot.previous_state, new_state
                );
                record(TransitionOutcome::Concluded, Some(new_state), None)
            }
            Err(e) => {
                error!("Failed to conclude course {}: {}", snapshot.course_id, e);
                record(TransitionOutcome::Failed, None, Some(e.to_string()))
            }
        }
    }
}

fn not_attempted(snapshot: StateSnapshot) -> StateTransition {
    StateTransition {
        snapshot,
        new_state: None,
        outcome: TransitionOutcome::NotAttempted,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{course, FakeCanvas};
    use crate::models::Course;

    fn with_state(mut course: Course, state: &str) -> Course {
        course.workflow_state = Some(state.to_string());
        course
    }

    fn filter() -> CourseFilter {
        CourseFilter::new("6251", "ENGL", None)
    }

    #[tokio::test]
    async fn test_already_concluded_is_skipped() {
        let api = Arc::new(FakeCanvas::new().with_page(
            "search:6251-ENGL",
            vec![with_state(course(5, "6251-X-ENGL-1301", "wiki"), "concluded")],
            None,
        ));

        let report = ConcludeWorkflow::new(Arc::clone(&api), WorkerPool::new(4))
            .run(&filter())
            .await
            .unwrap();

        assert!(api.changed().is_empty());
        assert_eq!(report.skipped, 1);
        assert_eq!(report.concluded, 0);
        assert_eq!(report.transitions[0].outcome, TransitionOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_concludes_active_courses_in_order() {
        let api = Arc::new(FakeCanvas::new().with_page(
            "search:6251-ENGL",
            vec![
                course(9, "6251-X-ENGL-1302", "wiki"),
                with_state(course(3, "6251-X-ENGL-1301", "wiki"), "concluded"),
                course(7, "6251-X-ENGL-2311", "modules"),
                course(8, "6251-X-HIST-1301", "modules"),
            ],
            None,
        ));

        let report = ConcludeWorkflow::new(Arc::clone(&api), WorkerPool::new(4))
            .run(&filter())
            .await
            .unwrap();

        assert_eq!(api.changed(), vec![7, 9]);
        assert_eq!(report.concluded, 2);
        assert_eq!(report.skipped, 1);

        let concluded = &report.transitions[1];
        assert_eq!(concluded.snapshot.course_id, 7);
        assert_eq!(concluded.snapshot.previous_state, "active");
        assert_eq!(concluded.new_state.as_deref(), Some("concluded"));
    }

    #[tokio::test]
    async fn test_failed_change_does_not_stop_pass() {
        let api = Arc::new(
            FakeCanvas::new()
                .with_page(
                    "search:6251-ENGL",
                    vec![
                        course(1, "6251-X-ENGL-1301", "wiki"),
                        course(2, "6251-X-ENGL-1302", "wiki"),
                        course(3, "6251-X-ENGL-1303", "wiki"),
                    ],
                    None,
                )
                .with_failing_change(2),
        );

        let report = ConcludeWorkflow::new(Arc::clone(&api), WorkerPool::new(2))
            .run(&filter())
            .await
            .unwrap();

        assert_eq!(api.changed(), vec![1, 2, 3]);
        assert_eq!(report.concluded, 2);
        assert_eq!(report.failed, 1);
        let failed = &report.transitions[1];
        assert_eq!(failed.outcome, TransitionOutcome::Failed);
        assert!(failed.error.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_dry_run_changes_nothing() {
        let api = Arc::new(FakeCanvas::new().with_page(
            "search:6251-ENGL",
            vec![course(1, "6251-X-ENGL-1301", "wiki")],
            None,
        ));

        let report = ConcludeWorkflow::new(Arc::clone(&api), WorkerPool::new(2))
            .dry_run(true)
            .run(&filter())
            .await
            .unwrap();

        assert!(api.changed().is_empty());
        assert_eq!(report.would_conclude, 1);
        assert!(report.dry_run);
    }

    #[tokio::test]
    async fn test_interrupt_stops_further_changes() {
        let cancel = CancellationToken::new();
        let courses = (1..=5)
            .map(|id| course(id, &format!("6251-X-ENGL-{}", 1300 + id), "wiki"))
            .collect();
        let api = Arc::new(
            FakeCanvas::new()
                .with_page("search:6251-ENGL", courses, None)
                .with_cancel_on_change(cancel.clone()),
        );

        let pool = WorkerPool::new(2).with_cancellation(cancel.clone());
        let report = ConcludeWorkflow::new(Arc::clone(&api), pool)
            .run(&filter())
            .await
            .unwrap();

        assert!(cancel.is_cancelled());
        assert_eq!(api.changed(), vec![1]);
        assert_eq!(report.concluded, 1);
        assert_eq!(report.not_attempted, 4);
        assert!(report.transitions[1..]
            .iter()
            .all(|t| t.outcome == TransitionOutcome::NotAttempted && t.new_state.is_none()));
    }

    #[tokio::test]
    async fn test_interrupt_before_snapshots_is_fatal() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let api = Arc::new(FakeCanvas::new().with_page(
            "search:6251-ENGL",
            vec![course(1, "6251-X-ENGL-1301", "wiki")],
            None,
        ));

        let pool = WorkerPool::new(2).with_cancellation(cancel);
        let result = ConcludeWorkflow::new(Arc::clone(&api), pool)
            .run(&filter())
            .await;

        assert!(result.is_err());
        assert!(api.changed().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_is_fatal() {
        let api = Arc::new(FakeCanvas::new().with_failing_page("search:6251-ENGL", 503));

        let result = ConcludeWorkflow::new(Arc::clone(&api), WorkerPool::new(2))
            .run(&filter())
            .await;

        assert!(result.is_err());
        assert!(api.changed().is_empty());
    }
}
