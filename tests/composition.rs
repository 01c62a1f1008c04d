//! The primitives composed around a flaky upstream, driven by one mock clock.

use flowguard::infrastructure::mocks::MockClock;
use flowguard::{
    BreakerError, CacheConfig, CircuitBreaker, CircuitBreakerConfig, CircuitState, LruCache,
    RateLimiter, RateLimiterConfig, Semaphore,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, PartialEq)]
enum FetchError {
    RateLimited { retry_after_ms: u64 },
    CircuitOpen { retry_after_ms: u64 },
    Upstream(String),
}

struct Client {
    limiter: RateLimiter,
    breaker: CircuitBreaker,
    semaphore: Semaphore,
    cache: LruCache<String, String>,
    healthy: AtomicBool,
    upstream_calls: AtomicUsize,
}

impl Client {
    fn new(clock: &MockClock) -> Self {
        let clock = Arc::new(clock.clone());
        Self {
            limiter: RateLimiter::with_clock(
                RateLimiterConfig::default().with_max_requests(5).with_window_ms(1000),
                clock.clone(),
            ),
            breaker: CircuitBreaker::with_clock(
                CircuitBreakerConfig::default()
                    .with_failure_threshold(2)
                    .with_reset_timeout_ms(500),
                clock.clone(),
            ),
            semaphore: Semaphore::new(2),
            cache: LruCache::with_clock(CacheConfig::new(8).with_ttl_ms(200), clock),
            healthy: AtomicBool::new(true),
            upstream_calls: AtomicUsize::new(0),
        }
    }

    async fn fetch(&self, key: &str) -> Result<String, FetchError> {
        if let Some(hit) = self.cache.get(key) {
            return Ok(hit);
        }

        let decision = self.limiter.consume();
        if decision.is_denied() {
            return Err(FetchError::RateLimited {
                retry_after_ms: decision.retry_after_ms,
            });
        }

        let _permit = self.semaphore.acquire().await;
        let result = self
            .breaker
            .call_async(|| async {
                self.upstream_calls.fetch_add(1, Ordering::SeqCst);
                if self.healthy.load(Ordering::SeqCst) {
                    Ok(format!("value-of-{}", key))
                } else {
                    Err("503".to_string())
                }
            })
            .await;

        match result {
            Ok(value) => {
                self.cache.set(key.to_string(), value.clone());
                Ok(value)
            }
            Err(BreakerError::Open(open)) => Err(FetchError::CircuitOpen {
                retry_after_ms: open.retry_after_ms,
            }),
            Err(BreakerError::Inner(err)) => Err(FetchError::Upstream(err)),
        }
    }
}

#[tokio::test]
async fn test_cache_shields_limiter_and_upstream() {
    let clock = MockClock::new(0);
    let client = Client::new(&clock);

    for _ in 0..10 {
        assert_eq!(client.fetch("a").await.unwrap(), "value-of-a");
    }
    assert_eq!(client.upstream_calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.limiter.count(), 1);
    assert_eq!(client.cache.metrics().hits(), 9);

    // After the TTL the upstream is consulted again
    clock.advance_ms(200);
    client.fetch("a").await.unwrap();
    assert_eq!(client.upstream_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_limiter_rejects_before_upstream() {
    let clock = MockClock::new(0);
    let client = Client::new(&clock);

    for i in 0..5 {
        client.fetch(&format!("k{}", i)).await.unwrap();
    }
    clock.advance_ms(250);
    let err = client.fetch("k5").await.unwrap_err();

    assert_eq!(err, FetchError::RateLimited { retry_after_ms: 750 });
    assert_eq!(client.upstream_calls.load(Ordering::SeqCst), 5);
    assert_eq!(client.semaphore.active(), 0);
}

#[tokio::test]
async fn test_breaker_opens_and_recovers() {
    let clock = MockClock::new(0);
    let client = Client::new(&clock);
    client.healthy.store(false, Ordering::SeqCst);

    assert_eq!(
        client.fetch("a").await,
        Err(FetchError::Upstream("503".into()))
    );
    assert_eq!(
        client.fetch("b").await,
        Err(FetchError::Upstream("503".into()))
    );
    assert_eq!(client.breaker.state(), CircuitState::Open);

    clock.advance_ms(100);
    assert_eq!(
        client.fetch("c").await,
        Err(FetchError::CircuitOpen { retry_after_ms: 400 })
    );
    assert_eq!(client.upstream_calls.load(Ordering::SeqCst), 2);

    client.healthy.store(true, Ordering::SeqCst);
    clock.advance_ms(1000);
    assert_eq!(client.fetch("c").await.unwrap(), "value-of-c");
    assert_eq!(client.breaker.state(), CircuitState::Closed);
    assert_eq!(client.semaphore.active(), 0);
}
