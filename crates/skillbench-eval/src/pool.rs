//! Bounded fan-out of per-case work
//!
//! Every item becomes a task on a `JoinSet`; a semaphore caps how many run at
//! once. Outputs come back in input order regardless of completion order.

use skillbench_types::InferenceError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::error;

/// Run `f` over `items` with at most `max_concurrency` in flight.
///
/// The output has one slot per input. A slot is `None` only when its task
/// panicked.
pub async fn run_bounded<T, R, F, Fut>(items: Vec<T>, max_concurrency: usize, f: F) -> Vec<Option<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    let total = items.len();
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let f = Arc::new(f);
    let mut tasks = JoinSet::new();

    for (index, item) in items.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let f = Arc::clone(&f);
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            (index, f(item).await)
        });
    }

    let mut slots: Vec<Option<R>> = (0..total).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, output)) => slots[index] = Some(output),
            Err(e) => error!("Evaluation task failed: {}", e),
        }
    }
    slots
}

/// Apply the per-call deadline to a model call
pub async fn with_deadline<T, Fut>(secs: u64, call: Fut) -> Result<T, InferenceError>
where
    Fut: Future<Output = Result<T, InferenceError>>,
{
    tokio::time::timeout(Duration::from_secs(secs), call)
        .await
        .map_err(|_| InferenceError::Timeout { secs })?
}
