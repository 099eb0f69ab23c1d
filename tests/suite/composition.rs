//! Primitives composed the way callers combine them: cached retrying lookups raced
//! against mirrors, bounded batches over a cache, debounced retrying searches.

use std::time::Duration;

use tempo_core::clock::{Instant, after};
use tempo_core::{
    Memoized, RetryError, RetryPolicy, debounce, execute_with_retry, memoize_with_ttl,
    race_first_success, run_bounded,
};

use crate::common::{Backend, BackendError, BoxedOp};

fn policy(timeout_ms: u64, retries: u32, retry_delay_ms: u64) -> RetryPolicy {
    RetryPolicy::new(
        Duration::from_millis(timeout_ms),
        retries,
        Duration::from_millis(retry_delay_ms),
    )
    .unwrap()
}

fn retrying_lookup(
    backend: Backend,
    policy: RetryPolicy,
) -> Memoized<u64, String, RetryError<BackendError>> {
    memoize_with_ttl(
        move |key: u64| {
            let backend = backend.clone();
            async move {
                let fetch = move || {
                    let backend = backend.clone();
                    async move { backend.get(key).await }
                };
                execute_with_retry(fetch, &policy)
                    .await
                    .map(|outcome| outcome.data)
            }
        },
        Duration::from_secs(1),
    )
}

fn cached_op(cache: &Memoized<u64, String, RetryError<BackendError>>, key: u64) -> BoxedOp<String> {
    let cache = cache.clone();
    Box::new(move || Box::pin(async move { cache.call(key).await.map_err(|e| e.to_string()) }))
}

#[tokio::test(start_paused = true)]
async fn cached_retrying_primary_beats_slow_mirror() {
    let primary = Backend::flaky("primary", 30, 1);
    let mirror = Backend::reliable("mirror", 200);
    let lookup = retrying_lookup(primary.clone(), policy(100, 3, 10));

    let start = Instant::now();
    let win = race_first_success(vec![cached_op(&lookup, 1), mirror.op(1)])
        .await
        .unwrap();
    assert_eq!(win.source, 0);
    assert_eq!(win.data, "primary:1");
    // 30ms failure, 10ms delay, 30ms success
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(70), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(200), "{elapsed:?}");
    assert_eq!(primary.calls(), 2);

    let start = Instant::now();
    let win = race_first_success(vec![cached_op(&lookup, 1), mirror.op(1)])
        .await
        .unwrap();
    assert_eq!(win.source, 0);
    assert!(start.elapsed() < Duration::from_millis(1));
    assert_eq!(primary.calls(), 2);
    assert_eq!(mirror.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn timed_out_primary_falls_back_to_mirror() {
    let primary = Backend::reliable("primary", 500);
    let mirror = Backend::reliable("mirror", 300);
    let lookup = retrying_lookup(primary.clone(), policy(100, 2, 0));

    let win = race_first_success(vec![cached_op(&lookup, 9), mirror.op(9)])
        .await
        .unwrap();
    assert_eq!(win.source, 1);
    assert_eq!(win.data, "mirror:9");
    assert_eq!(primary.calls(), 2);

    // The failed lookup is not cached.
    assert!(lookup.is_empty());
}

#[tokio::test(start_paused = true)]
async fn bounded_batch_over_cache_reaches_backend_once_per_key() {
    let store = Backend::reliable("store", 50);
    let backend = store.clone();
    let cache = memoize_with_ttl(
        move |key: u64| {
            let backend = backend.clone();
            async move { backend.get(key).await }
        },
        Duration::from_secs(1),
    );

    let keys = [1u64, 2, 1, 3, 2, 1];
    let operations: Vec<_> = keys
        .iter()
        .map(|&key| {
            let cache = cache.clone();
            move || cache.call(key)
        })
        .collect();

    let results = run_bounded(operations, 2).await.unwrap();
    assert_eq!(
        results,
        vec!["store:1", "store:2", "store:1", "store:3", "store:2", "store:1"]
    );
    assert_eq!(store.calls(), 3);
    assert_eq!(cache.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn debounced_search_retries_once_for_the_whole_burst() {
    let index = Backend::flaky("index", 20, 1);
    let backend = index.clone();
    let retry = policy(100, 3, 10);
    let search = debounce(
        move |query: String| {
            let backend = backend.clone();
            async move {
                let key = query.len() as u64;
                let fetch = move || {
                    let backend = backend.clone();
                    async move { backend.get(key).await }
                };
                execute_with_retry(fetch, &retry).await
            }
        },
        Duration::from_millis(50),
    );

    let first = search.call("t".to_string());
    after(Duration::from_millis(10)).await;
    let second = search.call("te".to_string());

    let (first, second) = tokio::join!(first, second);
    let outcome = second.unwrap();
    assert_eq!(first.unwrap(), outcome);
    assert_eq!(outcome.data, "index:2");
    assert_eq!(outcome.attempts, 2);
    assert_eq!(index.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn every_source_exhausting_retries_reports_each_in_order() {
    let sources = [Backend::down("east", 10), Backend::down("west", 20)];
    let retry = policy(100, 2, 5);

    let operations: Vec<_> = sources
        .iter()
        .cloned()
        .map(|backend| {
            move || async move {
                let fetch = move || {
                    let backend = backend.clone();
                    async move { backend.get(4).await }
                };
                execute_with_retry(fetch, &retry).await
            }
        })
        .collect();

    let err = race_first_success(operations).await.unwrap_err();
    assert_eq!(err.len(), 2);
    let names: Vec<_> = err
        .into_errors()
        .into_iter()
        .map(|e| {
            assert_eq!(e.attempts(), 2);
            assert!(!e.is_timeout());
            e.into_operation_error().unwrap().backend
        })
        .collect();
    assert_eq!(names, vec!["east", "west"]);
    assert!(sources.iter().all(|backend| backend.calls() == 2));
}
