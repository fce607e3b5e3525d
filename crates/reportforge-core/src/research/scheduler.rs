//! Bounded fan-out of search tasks across the query × source cross product.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::research::record::ResultRecord;
use crate::research::sources::SourceAdapter;

/// Execute every (query, source) pair under a global concurrency cap and
/// merge the per-task results in submission order (query-major,
/// source-minor), independent of completion timing.
///
/// A task that panics contributes an empty list; siblings are unaffected and
/// the call itself never fails.
pub async fn fan_out(
    queries: &[String],
    sources: &[Arc<dyn SourceAdapter>],
    concurrency_limit: usize,
    max_results: usize,
) -> Vec<ResultRecord> {
    let gate = Arc::new(Semaphore::new(concurrency_limit.max(1)));

    let mut handles = Vec::with_capacity(queries.len() * sources.len());
    for query in queries {
        for source in sources {
            let gate = Arc::clone(&gate);
            let source = Arc::clone(source);
            let query = query.clone();

            handles.push(tokio::spawn(async move {
                // Closing the semaphore is not part of this design; acquire
                // only fails on close, so an empty contribution is the safe
                // answer either way.
                let Ok(_permit) = gate.acquire_owned().await else {
                    return Vec::new();
                };
                source.search(&query, max_results).await
            }));
        }
    }

    debug!(
        task_count = handles.len(),
        concurrency_limit, "search fan-out started"
    );

    // Handles are awaited in submission order, which fixes the merged record
    // order regardless of which task finished first.
    let mut merged = Vec::new();
    for handle in handles {
        match handle.await {
            Ok(records) => merged.extend(records),
            Err(err) => {
                warn!(error = %err, "search task aborted, contributing no results");
            }
        }
    }

    merged
}
