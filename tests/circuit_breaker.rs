use flowguard::infrastructure::mocks::{MockCaptureLayer, MockClock};
use flowguard::{BreakerError, CircuitBreaker, CircuitBreakerConfig, CircuitState};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;

#[derive(Debug, PartialEq)]
struct UpstreamError(u16);

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "upstream returned {}", self.0)
    }
}

impl std::error::Error for UpstreamError {}

fn breaker(clock: &MockClock) -> CircuitBreaker {
    CircuitBreaker::with_clock(
        CircuitBreakerConfig::new(3, Duration::from_secs(10)),
        Arc::new(clock.clone()),
    )
}

#[test]
fn test_full_lifecycle() {
    let clock = MockClock::new(0);
    let cb = breaker(&clock);
    let attempts = AtomicUsize::new(0);

    let failing = || {
        attempts.fetch_add(1, Ordering::SeqCst);
        Err::<(), _>(UpstreamError(503))
    };

    for _ in 0..3 {
        let err = cb.call(failing).unwrap_err();
        assert_eq!(err.into_inner(), Some(UpstreamError(503)));
    }
    assert_eq!(cb.state(), CircuitState::Open);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);

    // Rejected without running the operation
    clock.set(4000);
    match cb.call(failing) {
        Err(BreakerError::Open(open)) => assert_eq!(open.retry_after_ms, 6000),
        other => panic!("expected rejection, got {:?}", other),
    }
    assert_eq!(attempts.load(Ordering::SeqCst), 3);

    // Exactly at the reset timeout the circuit probes
    clock.set(10_000);
    assert_eq!(cb.state(), CircuitState::HalfOpen);
    assert_eq!(cb.call(|| Ok::<_, UpstreamError>("recovered")).unwrap(), "recovered");
    assert_eq!(cb.state(), CircuitState::Closed);
    assert_eq!(cb.failures(), 0);
}

#[test]
fn test_failed_probe_reopens() {
    let clock = MockClock::new(0);
    let cb = breaker(&clock);
    for _ in 0..3 {
        cb.record_failure();
    }

    clock.set(10_000);
    let err = cb.call(|| Err::<(), _>(UpstreamError(500))).unwrap_err();
    assert!(!err.is_open());
    assert_eq!(cb.state(), CircuitState::Open);

    clock.set(15_000);
    assert_eq!(cb.check().unwrap_err().retry_after(), Duration::from_secs(5));
}

#[test]
fn test_error_source_chain() {
    use std::error::Error;

    let clock = MockClock::new(0);
    let cb = breaker(&clock);
    let err = cb.call(|| Err::<(), _>(UpstreamError(429))).unwrap_err();

    assert_eq!(err.to_string(), "upstream returned 429");
    assert_eq!(err.source().unwrap().to_string(), "upstream returned 429");
}

#[test]
fn test_reset_restores_initial_state() {
    let clock = MockClock::new(0);
    let cb = breaker(&clock);
    for _ in 0..5 {
        cb.record_failure();
    }

    cb.reset();
    assert_eq!(cb.state(), CircuitState::Closed);
    assert_eq!(cb.failures(), 0);
    cb.record_failure();
    cb.record_failure();
    assert_eq!(cb.state(), CircuitState::Closed);
}

#[test]
fn test_opening_logs_warning() {
    let clock = MockClock::new(0);
    let cb = breaker(&clock);
    let capture = MockCaptureLayer::new();
    let subscriber = tracing_subscriber::registry().with(capture.clone());

    tracing::subscriber::with_default(subscriber, || {
        for _ in 0..4 {
            let _ = cb.call(|| Err::<(), _>(UpstreamError(502)));
        }
    });

    let warnings = capture.at_level(Level::WARN);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].message, "circuit breaker opened");
    assert_eq!(warnings[0].field("failures"), Some("3"));
    assert_eq!(warnings[0].field("reset_timeout_ms"), Some("10000"));

    let rejections = capture.at_level(Level::DEBUG);
    assert_eq!(rejections.len(), 1);
    assert_eq!(rejections[0].field("retry_after_ms"), Some("10000"));
}

#[tokio::test]
async fn test_call_async_propagates_errors() {
    let clock = MockClock::new(0);
    let cb = breaker(&clock);

    let result = cb
        .call_async(|| async {
            tokio::task::yield_now().await;
            Err::<u8, _>(UpstreamError(504))
        })
        .await;

    assert_eq!(result.unwrap_err().into_inner(), Some(UpstreamError(504)));
    assert_eq!(cb.failures(), 1);
}
