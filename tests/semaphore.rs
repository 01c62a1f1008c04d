use flowguard::Semaphore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinSet;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_active_never_exceeds_limit() {
    let semaphore = Semaphore::new(3);
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let mut tasks = JoinSet::new();

    for _ in 0..50 {
        let semaphore = semaphore.clone();
        let running = Arc::clone(&running);
        let peak = Arc::clone(&peak);
        tasks.spawn(async move {
            semaphore
                .run(|| async {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    assert!(semaphore.active() <= semaphore.limit());
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .await;
        });
    }

    while let Some(result) = tasks.join_next().await {
        result.unwrap();
    }

    assert_eq!(peak.load(Ordering::SeqCst), 3);
    assert_eq!(semaphore.active(), 0);
    assert_eq!(semaphore.waiting(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_fifo_service_under_contention() {
    let semaphore = Semaphore::new(1);
    let order = Arc::new(Mutex::new(Vec::new()));
    let gate = semaphore.acquire().await;

    let mut handles = Vec::new();
    for i in 0..5 {
        let semaphore = semaphore.clone();
        let order = Arc::clone(&order);
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire().await;
            order.lock().unwrap().push(i);
            tokio::time::sleep(Duration::from_millis(1)).await;
        }));
        // Let each task enqueue before spawning the next one
        tokio::task::yield_now().await;
    }
    assert_eq!(semaphore.waiting(), 5);

    gate.release();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    assert_eq!(semaphore.active(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_acquire_is_skipped() {
    let semaphore = Semaphore::new(1);
    let held = semaphore.acquire().await;

    let timed_out = tokio::time::timeout(Duration::from_millis(10), semaphore.acquire()).await;
    assert!(timed_out.is_err());
    assert_eq!(semaphore.waiting(), 0);

    let waiter = {
        let semaphore = semaphore.clone();
        tokio::spawn(async move { semaphore.acquire().await })
    };
    tokio::task::yield_now().await;
    assert_eq!(semaphore.waiting(), 1);

    drop(held);
    let permit = waiter.await.unwrap();
    assert_eq!(semaphore.active(), 1);
    drop(permit);
    assert_eq!(semaphore.active(), 0);
}

#[tokio::test]
async fn test_run_returns_error_unchanged() {
    let semaphore = Semaphore::new(2);
    let result: Result<u32, String> = semaphore
        .run(|| async { Err("backend unavailable".to_string()) })
        .await;

    assert_eq!(result.unwrap_err(), "backend unavailable");
    assert_eq!(semaphore.active(), 0);
}

#[tokio::test]
async fn test_try_acquire_respects_queue() {
    let semaphore = Semaphore::new(1);
    let held = semaphore.try_acquire().unwrap();
    assert!(semaphore.try_acquire().is_none());

    drop(held);
    let again = semaphore.try_acquire();
    assert!(again.is_some());
}
