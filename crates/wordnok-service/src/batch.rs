//! Fan-out of one operation over many inputs.

use std::future::Future;

use futures::StreamExt;
use futures::stream::FuturesUnordered;

use crate::error::{Error, Result};

/// Runs `operation` once per item, all of them concurrently.
///
/// Every invocation is spawned onto the runtime right away, without any concurrency limit.
/// On success, the results are returned in the order of `items`.
///
/// The first error that is observed is returned immediately. Invocations that are still running
/// at that point are not cancelled, but keep running detached and their results are discarded.
///
/// # Panics
///
/// A panic inside of an invocation is resumed on the caller.
pub async fn run_batch<T, R, F, Fut>(
    operation: F,
    items: impl IntoIterator<Item = T>,
) -> Result<Vec<R>>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R>> + Send + 'static,
    R: Send + 'static,
{
    let mut pending: FuturesUnordered<_> = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let handle = tokio::spawn(operation(item));
            async move { (index, handle.await) }
        })
        .collect();

    let len = pending.len();
    metric!(histogram("batch.size") = len as u64);

    let mut results: Vec<Option<R>> = std::iter::repeat_with(|| None).take(len).collect();
    while let Some((index, outcome)) = pending.next().await {
        let result = match outcome {
            Ok(result) => result,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(err) => Err(Error::from(err)),
        };

        match result {
            Ok(value) => results[index] = Some(value),
            Err(err) => {
                metric!(counter("batch.failed") += 1);
                tracing::debug!(error = %err, "Batch item {} of {} failed", index, len);
                return Err(err);
            }
        }
    }

    // every slot was filled, as each index is yielded exactly once
    Ok(results.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    async fn frequency_lookup(word: &'static str) -> Result<u64> {
        match word {
            "cat" => {
                // finishes last, but must come first
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(599)
            }
            "dog" => Ok(1105),
            other => Err(Error::Unparseable {
                url: format!("http://api.wordnik.com/v4/word.json/{other}/frequency"),
            }),
        }
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let results = run_batch(frequency_lookup, Vec::<&'static str>::new())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_results_are_ordered() {
        let results = run_batch(frequency_lookup, ["cat", "dog"]).await.unwrap();
        assert_eq!(results, [599, 1105]);

        let results = run_batch(frequency_lookup, ["dog", "cat", "dog"])
            .await
            .unwrap();
        assert_eq!(results, [1105, 599, 1105]);
    }

    #[tokio::test]
    async fn test_first_error_wins() {
        let err = run_batch(frequency_lookup, ["cat", "DS_Store", "dog"])
            .await
            .unwrap_err();
        assert_eq!(
            err,
            Error::Unparseable {
                url: "http://api.wordnik.com/v4/word.json/DS_Store/frequency".into()
            }
        );
    }

    #[tokio::test]
    async fn test_error_does_not_wait_for_stragglers() {
        let started = Arc::new(AtomicUsize::new(0));

        let operation = |fail: bool| {
            let started = Arc::clone(&started);
            async move {
                started.fetch_add(1, Ordering::Relaxed);
                if fail {
                    Err(Error::MissingWord)
                } else {
                    // never resolves
                    futures::future::pending::<Result<()>>().await
                }
            }
        };

        let err = run_batch(operation, [false, false, true]).await.unwrap_err();
        assert_eq!(err, Error::MissingWord);
        // everything was started without waiting on the others
        assert_eq!(started.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    #[should_panic(expected = "lookup exploded")]
    async fn test_panics_are_resumed() {
        let operation = |word: &'static str| async move {
            if word == "boom" {
                panic!("lookup exploded");
            }
            Ok(word.len())
        };

        let _ = run_batch(operation, ["cat", "boom"]).await;
    }

    #[tokio::test]
    async fn test_full_concurrency() {
        let running = Arc::new(AtomicUsize::new(0));
        let max_running = Arc::new(AtomicUsize::new(0));

        let operation = |i: usize| {
            let running = Arc::clone(&running);
            let max_running = Arc::clone(&max_running);
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                max_running.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(i * 2)
            }
        };

        let results = run_batch(operation, 0..10).await.unwrap();
        assert_eq!(results, (0..10).map(|i| i * 2).collect::<Vec<_>>());
        assert_eq!(max_running.load(Ordering::SeqCst), 10);
    }
}
