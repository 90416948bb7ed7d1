//! Bounded concurrency for outbound probes
//!
//! Tasks run in consecutive chunks of `limit`: every task in a chunk runs
//! concurrently, and the next chunk starts only once the whole chunk is done.
//! That keeps the number of simultaneous requests to retailers fixed.

use std::future::Future;

use futures::future::join_all;

/// Default number of platforms probed at once
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Run `tasks` at most `limit` at a time, returning results in input order.
///
/// Tasks are expected to resolve to a value even when their work fails
/// (e.g., `Option<T>` or `Result<T, E>`), so one failure never holds back
/// the others. A `limit` of 0 is treated as 1.
pub async fn run_batched<T, F, Fut>(tasks: Vec<F>, limit: usize) -> Vec<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let limit = limit.max(1);
    let mut results = Vec::with_capacity(tasks.len());
    let mut pending = tasks.into_iter().peekable();

    while pending.peek().is_some() {
        // Futures are created here, so nothing in a later chunk starts early
        let chunk: Vec<Fut> = pending.by_ref().take(limit).map(|task| task()).collect();
        results.extend(join_all(chunk).await);
    }

    results
}
