use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use huginn::{
    FetchError, HuginnError, Result, RetryConfig, RetryCoordinator, RetryDecision, with_retry,
};

/// Operation that fails N times then succeeds.
struct FailThenSucceed {
    fail_count: AtomicU32,
    fail_with: fn() -> HuginnError,
    total_calls: AtomicU32,
}

impl FailThenSucceed {
    fn new(failures: u32, fail_with: fn() -> HuginnError) -> Self {
        Self {
            fail_count: AtomicU32::new(failures),
            fail_with,
            total_calls: AtomicU32::new(0),
        }
    }

    fn call_count(&self) -> u32 {
        self.total_calls.load(Ordering::Relaxed)
    }

    async fn call(&self) -> Result<&'static str> {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        let remaining = self.fail_count.load(Ordering::Relaxed);
        if remaining > 0 {
            self.fail_count.fetch_sub(1, Ordering::Relaxed);
            return Err((self.fail_with)());
        }
        Ok("ok")
    }
}

fn network_error() -> HuginnError {
    FetchError::network("connection reset").into()
}

fn format_error() -> HuginnError {
    FetchError::format("unexpected body").into()
}

fn fast_config() -> RetryConfig {
    RetryConfig::new()
        .max_attempts(3)
        .initial_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(10))
}

// ============================================================================
// with_retry
// ============================================================================

#[tokio::test]
async fn retries_transient_errors_until_success() {
    let op = FailThenSucceed::new(2, network_error);
    let result = with_retry(&fast_config(), "test", || op.call()).await;
    assert_eq!(result.unwrap(), "ok");
    assert_eq!(op.call_count(), 3);
}

#[tokio::test]
async fn gives_up_after_max_attempts() {
    let op = FailThenSucceed::new(10, network_error);
    let err = with_retry(&fast_config(), "test", || op.call())
        .await
        .unwrap_err();
    assert!(matches!(err, HuginnError::Fetch(_)));
    assert_eq!(op.call_count(), 3);
}

#[tokio::test]
async fn permanent_errors_are_not_retried() {
    let op = FailThenSucceed::new(1, format_error);
    assert!(with_retry(&fast_config(), "test", || op.call()).await.is_err());
    assert_eq!(op.call_count(), 1);

    let op = FailThenSucceed::new(1, || HuginnError::InvalidIdentifier("x".into()));
    assert!(with_retry(&fast_config(), "test", || op.call()).await.is_err());
    assert_eq!(op.call_count(), 1);
}

#[tokio::test]
async fn disabled_config_makes_one_attempt() {
    let op = FailThenSucceed::new(1, network_error);
    assert!(
        with_retry(&RetryConfig::disabled(), "test", || op.call())
            .await
            .is_err()
    );
    assert_eq!(op.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn backoff_delays_grow_exponentially() {
    let config = RetryConfig::new()
        .max_attempts(4)
        .initial_delay(Duration::from_secs(1));
    let op = FailThenSucceed::new(3, network_error);

    let start = tokio::time::Instant::now();
    with_retry(&config, "test", || op.call()).await.unwrap();

    // 1s + 2s + 4s
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(7), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(8), "elapsed {elapsed:?}");
}

// ============================================================================
// RetryCoordinator
// ============================================================================

fn counting_coordinator(config: RetryConfig) -> (RetryCoordinator, Arc<AtomicU32>) {
    let coordinator = RetryCoordinator::new(config);
    let runs = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&runs);
    coordinator.register("preview", move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });
    (coordinator, runs)
}

#[tokio::test(start_paused = true)]
async fn coordinator_runs_callback_after_backoff() {
    let config = RetryConfig::new().initial_delay(Duration::from_secs(2));
    let (coordinator, runs) = counting_coordinator(config);

    let decision = coordinator.report_failure("preview", &network_error());
    assert_eq!(
        decision,
        RetryDecision::Scheduled {
            attempt: 1,
            delay: Duration::from_secs(2),
        }
    );

    tokio::time::sleep(Duration::from_millis(1_900)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    let decision = coordinator.report_failure("preview", &network_error());
    assert_eq!(
        decision,
        RetryDecision::Scheduled {
            attempt: 2,
            delay: Duration::from_secs(4),
        }
    );
}

#[tokio::test]
async fn coordinator_stops_after_max_attempts() {
    let (coordinator, _runs) = counting_coordinator(fast_config());

    assert!(matches!(
        coordinator.report_failure("preview", &network_error()),
        RetryDecision::Scheduled { attempt: 1, .. }
    ));
    assert!(matches!(
        coordinator.report_failure("preview", &network_error()),
        RetryDecision::Scheduled { attempt: 2, .. }
    ));
    assert_eq!(
        coordinator.report_failure("preview", &network_error()),
        RetryDecision::Exhausted { attempts: 3 }
    );
    assert_eq!(coordinator.failures("preview"), Some(3));
}

#[tokio::test]
async fn coordinator_success_resets_attempts() {
    let (coordinator, _runs) = counting_coordinator(fast_config());

    coordinator.report_failure("preview", &network_error());
    coordinator.report_failure("preview", &network_error());
    coordinator.report_success("preview");
    assert_eq!(coordinator.failures("preview"), Some(0));

    assert!(matches!(
        coordinator.report_failure("preview", &network_error()),
        RetryDecision::Scheduled { attempt: 1, .. }
    ));
}

#[tokio::test]
async fn coordinator_ignores_permanent_and_unknown() {
    let (coordinator, runs) = counting_coordinator(fast_config());

    assert_eq!(
        coordinator.report_failure("preview", &format_error()),
        RetryDecision::NotRetryable
    );
    assert_eq!(
        coordinator.report_failure("preview", &HuginnError::Cancelled),
        RetryDecision::NotRetryable
    );
    assert_eq!(
        coordinator.report_failure("other", &network_error()),
        RetryDecision::Unregistered
    );
    assert_eq!(coordinator.failures("preview"), Some(0));
    assert_eq!(runs.load(Ordering::SeqCst), 0);

    assert!(coordinator.unregister("preview"));
    assert!(!coordinator.unregister("preview"));
    assert_eq!(coordinator.failures("preview"), None);
}
