//! Error values as callers see them: source chains, `anyhow` context, messages.

use std::error::Error as _;
use std::time::Duration;

use anyhow::Context;

use tempo_core::{
    ConfigurationError, DebounceError, RetryPolicy, RunError, debounce, execute_with_retry,
    race_first_success, run_bounded,
};

use crate::common::{Backend, BackendError};

#[tokio::test(start_paused = true)]
async fn retry_error_exposes_operation_error_as_source() {
    let backend = Backend::down("ledger", 10);
    let policy = RetryPolicy::new(Duration::from_millis(100), 1, Duration::ZERO).unwrap();

    let err = execute_with_retry(
        || {
            let backend = backend.clone();
            async move { backend.get(3).await }
        },
        &policy,
    )
    .await
    .unwrap_err();

    assert_eq!(
        err.to_string(),
        "operation failed on attempt 1: ledger: request 1 for key 3 failed"
    );
    let source = err
        .source()
        .and_then(|source| source.downcast_ref::<BackendError>())
        .unwrap();
    assert_eq!(source.backend, "ledger");
}

#[tokio::test(start_paused = true)]
async fn retry_timeout_names_attempt_and_limit() {
    let backend = Backend::reliable("slow", 1_000);
    let policy = RetryPolicy::new(Duration::from_millis(50), 2, Duration::ZERO).unwrap();

    let err = execute_with_retry(
        || {
            let backend = backend.clone();
            async move { backend.get(1).await }
        },
        &policy,
    )
    .await
    .unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(err.attempts(), 2);
    assert!(err.to_string().starts_with("Timeout:"), "{err}");
    assert!(err.source().is_none());
}

#[tokio::test(start_paused = true)]
async fn run_error_chains_through_anyhow_context() {
    let backends = [
        Backend::reliable("pages", 10),
        Backend::down("pages", 20),
        Backend::reliable("pages", 10),
    ];
    let operations: Vec<_> = backends
        .into_iter()
        .map(|backend| move || async move { backend.get(7).await })
        .collect();

    let err = run_bounded(operations, 3)
        .await
        .context("loading pages")
        .unwrap_err();

    let rendered = format!("{err:#}");
    assert!(
        rendered.starts_with("loading pages: operation 1 failed"),
        "{rendered}"
    );
    let run_error = err.downcast_ref::<RunError<BackendError>>().unwrap();
    assert!(matches!(run_error, RunError::Operation { index: 1, .. }));
}

#[tokio::test]
async fn zero_limit_is_reported_as_configuration() {
    let operations = vec![|| async { Ok::<_, BackendError>(()) }];
    let err = run_bounded(operations, 0).await.unwrap_err();

    assert!(matches!(
        err,
        RunError::Config(ConfigurationError::ZeroLimit)
    ));
    assert_eq!(
        err.to_string(),
        "invalid runner configuration: concurrency limit must be at least 1"
    );
}

#[tokio::test(start_paused = true)]
async fn aggregate_error_converts_to_boxed_error() {
    let sources = [Backend::down("a", 5), Backend::down("b", 5)];

    let result: Result<_, Box<dyn std::error::Error + Send + Sync>> =
        race_first_success(sources.iter().map(|backend| backend.op(1)).collect())
            .await
            .map_err(Into::into);

    let err = result.unwrap_err();
    assert_eq!(
        err.to_string(),
        "all 2 operations failed; [0] a: request 1 for key 1 failed; [1] b: request 1 for key 1 failed"
    );
}

#[tokio::test(start_paused = true)]
async fn debounce_failure_unwraps_to_operation_error() {
    let backend = Backend::down("search", 10);
    let search = debounce(
        move |key: u64| {
            let backend = backend.clone();
            async move { backend.get(key).await }
        },
        Duration::from_millis(20),
    );

    let err = search.call(5).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "debounced operation failed: search: request 1 for key 5 failed"
    );
    assert!(matches!(err, DebounceError::Operation(_)));
    assert_eq!(err.into_operation_error().unwrap().backend, "search");
}
