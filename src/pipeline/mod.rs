//! Course audit pipeline.
//!
//! search → local filter → bounded per-course inspection → aggregation.

pub mod candidates;
pub mod pool;
pub mod probe;

pub use candidates::{select_candidates, Candidate, CandidateSet};
pub use pool::{PoolStats, ResultStream, WorkerPool, MAX_CONCURRENCY};
pub use probe::{has_modules_link, inspect_course};

use crate::analysis::Aggregator;
use crate::api::{fetch_all_courses, CanvasApi};
use crate::models::{CourseFilter, CourseResult, ReportData};
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Fetch every course matching `filter` and keep the exact matches.
pub async fn find_candidates<A>(api: &A, filter: &CourseFilter) -> Result<CandidateSet>
where
    A: CanvasApi + ?Sized,
{
    let seed = api.search_request(&filter.search_term())?;
    let courses = fetch_all_courses(api, seed)
        .await
        .with_context(|| format!("Failed to fetch courses for {}", filter))?;

    let set = select_candidates(courses, filter);
    info!(
        "{} of {} courses match {} ({} invalid SIS ids, {} other)",
        set.candidates.len(),
        set.fetched,
        filter,
        set.invalid,
        set.unmatched
    );
    Ok(set)
}

/// Inspect every candidate on the pool.
pub fn inspect_all<A>(
    api: Arc<A>,
    candidates: Vec<Candidate>,
    pool: &WorkerPool,
) -> ResultStream<CourseResult>
where
    A: CanvasApi + ?Sized + 'static,
{
    pool.run(candidates, move |candidate| {
        let api = Arc::clone(&api);
        async move { Some(inspect_course(api.as_ref(), candidate).await) }
    })
}

/// Run the full audit for `filter` and return the aggregated data.
///
/// `on_result` is called once per received result, e.g. to drive a
/// progress bar. An interrupted run is an error: no partial data is
/// returned when the pool was cancelled before every course was inspected.
pub async fn audit_courses<A, F>(
    api: Arc<A>,
    filter: &CourseFilter,
    pool: &WorkerPool,
    on_candidates: impl FnOnce(usize),
    on_result: F,
) -> Result<ReportData>
where
    A: CanvasApi + ?Sized + 'static,
    F: FnMut(&CourseResult),
{
    let set = find_candidates(api.as_ref(), filter).await?;
    let total = set.candidates.len();
    on_candidates(total);

    let ResultStream {
        results,
        completion,
    } = inspect_all(api, set.candidates, pool);

    let aggregator = Aggregator::new().drain(results, on_result).await;
    let stats = completion.await.context("Worker pool coordinator failed")?;

    if stats.cancelled > 0 {
        bail!(
            "Audit of {} interrupted: {} of {} courses not inspected",
            filter,
            stats.cancelled,
            total
        );
    }

    if stats.emitted != total {
        warn!(
            "{} of {} courses produced no result ({} panicked, {} cancelled)",
            total - stats.emitted,
            total,
            stats.panicked,
            stats.cancelled
        );
    }

    Ok(aggregator.finish(total))
}
