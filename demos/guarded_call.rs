//! Guarded calls to a flaky upstream.
//!
//! Every request goes through a rate limiter, then a circuit breaker, then a
//! semaphore bounding in-flight calls. Successful responses are cached, and a
//! throttle reports progress at most every 200ms.
//!
//! Run with `RUST_LOG=flowguard=debug cargo run --example guarded_call` to see
//! the primitives' own log output.

use flowguard::{
    BreakerError, CacheConfig, CircuitBreaker, CircuitBreakerConfig, LruCache, RateLimiter,
    RateLimiterConfig, Semaphore, Throttle,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

struct Upstream {
    calls: AtomicU32,
}

impl Upstream {
    /// Fails calls 5 through 12, then recovers.
    async fn get(&self, id: u32) -> Result<String, String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        if (5..13).contains(&n) {
            Err(format!("upstream error on call {}", n))
        } else {
            Ok(format!("record-{}", id))
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Guarded Call Example ===\n");

    let limiter = Arc::new(RateLimiter::new(RateLimiterConfig::new(
        20,
        Duration::from_secs(1),
    )));
    let breaker = Arc::new(CircuitBreaker::with_config(
        CircuitBreakerConfig::default()
            .with_failure_threshold(3)
            .with_reset_timeout_ms(300),
    ));
    let semaphore = Semaphore::new(4);
    let cache: Arc<LruCache<u32, String>> = Arc::new(LruCache::new(
        CacheConfig::new(16).with_ttl(Duration::from_secs(5)),
    ));
    let upstream = Arc::new(Upstream {
        calls: AtomicU32::new(0),
    });

    let done = Arc::new(AtomicU32::new(0));
    let progress = Throttle::builder(|completed: u32| {
        info!(completed, "progress");
    })
    .with_interval(Duration::from_millis(200))
    .build()
    .expect("running inside a tokio runtime");

    let mut handles = Vec::new();
    for request in 0..40u32 {
        let id = request % 10;
        let limiter = Arc::clone(&limiter);
        let breaker = Arc::clone(&breaker);
        let semaphore = semaphore.clone();
        let cache = Arc::clone(&cache);
        let upstream = Arc::clone(&upstream);
        let done = Arc::clone(&done);
        let progress = progress.clone();

        handles.push(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(request as u64 * 25)).await;

            let outcome = if let Some(hit) = cache.get(&id) {
                Ok(format!("{} (cached)", hit))
            } else {
                let decision = limiter.consume();
                if decision.is_denied() {
                    Err(format!("rate limited, retry in {:?}", decision.retry_after()))
                } else {
                    let _permit = semaphore.acquire().await;
                    match breaker.call_async(|| upstream.get(id)).await {
                        Ok(body) => {
                            cache.set(id, body.clone());
                            Ok(body)
                        }
                        Err(BreakerError::Open(open)) => {
                            Err(format!("circuit open, retry in {:?}", open.retry_after()))
                        }
                        Err(BreakerError::Inner(err)) => Err(err),
                    }
                }
            };

            match outcome {
                Ok(body) => info!(request, %body, "request served"),
                Err(reason) => warn!(request, %reason, "request failed"),
            }
            progress.call(done.fetch_add(1, Ordering::SeqCst) + 1);
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }
    progress.flush();

    let stats = cache.metrics().snapshot();
    println!("\n=== Example Complete ===");
    println!("Circuit state: {}", breaker.state());
    println!("Upstream calls: {}", upstream.calls.load(Ordering::SeqCst));
    println!(
        "Cache: {} hits, {} misses, hit rate {:.0}%",
        stats.hits,
        stats.misses,
        stats.hit_rate() * 100.0
    );
}
