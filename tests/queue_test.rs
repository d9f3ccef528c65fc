//! Properties of the FIFO generation queue

use seed_gateway::error::AppError;
use seed_gateway::queue::{GenerationQueue, QueueConfig};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

fn queue_with_avg(initial_avg_duration_ms: u64) -> GenerationQueue {
    GenerationQueue::with_config(QueueConfig {
        max_queue_size: 1000,
        initial_avg_duration_ms,
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_jobs_never_overlap() {
    let queue = queue_with_avg(1000);
    let in_flight = Arc::new(AtomicBool::new(false));
    let overlapped = Arc::new(AtomicBool::new(false));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let in_flight = in_flight.clone();
        let overlapped = overlapped.clone();
        let handle = queue
            .enqueue(async move {
                if in_flight.swap(true, Ordering::SeqCst) {
                    overlapped.store(true, Ordering::SeqCst);
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
                in_flight.store(false, Ordering::SeqCst);
                Ok(vec![1])
            })
            .unwrap();
        handles.push(handle);
    }

    for handle in handles {
        assert!(handle.wait().await.is_ok());
    }
    assert!(
        !overlapped.load(Ordering::SeqCst),
        "two jobs ran concurrently"
    );
}

#[tokio::test]
async fn test_jobs_run_in_submission_order() {
    let queue = queue_with_avg(1000);
    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for i in 0..6usize {
        let order = order.clone();
        let handle = queue
            .enqueue(async move {
                order.lock().push(i);
                Ok(vec![])
            })
            .unwrap();
        handles.push(handle);
    }

    for handle in handles {
        handle.wait().await.unwrap();
    }
    assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_pending_count_tracks_lifecycle() {
    let queue = queue_with_avg(1000);
    assert_eq!(queue.pending_count(), 0);
    assert_eq!(queue.estimated_wait_ms(), 0);

    let gate = Arc::new(Semaphore::new(0));
    let mut handles = Vec::new();
    for _ in 0..3 {
        let gate = gate.clone();
        let handle = queue
            .enqueue(async move {
                gate.acquire().await.unwrap().forget();
                Ok(vec![])
            })
            .unwrap();
        handles.push(handle);
    }

    assert_eq!(queue.pending_count(), 3);
    // The job already in flight does not count toward the wait
    assert_eq!(queue.estimated_wait_ms(), 2 * 1000);

    let mut expected = 3u64;
    for handle in handles {
        gate.add_permits(1);
        handle.wait().await.unwrap();
        expected -= 1;
        assert_eq!(queue.pending_count(), expected);
    }
    assert_eq!(queue.estimated_wait_ms(), 0);
}

#[tokio::test]
async fn test_failure_does_not_poison_the_chain() {
    let queue = queue_with_avg(1000);

    let failing = queue
        .enqueue(async { Err(AppError::BackendFailure("boom".to_string())) })
        .unwrap();
    let succeeding = queue.enqueue(async { Ok(b"fine".to_vec()) }).unwrap();

    let err = failing.wait().await.unwrap_err();
    assert_eq!(err.kind(), "backend_failure");
    assert_eq!(succeeding.wait().await.unwrap(), b"fine");
    assert_eq!(queue.pending_count(), 0);
    assert_eq!(queue.processed_count(), 2);
}

#[tokio::test]
async fn test_average_moves_toward_observed_durations() {
    let queue = queue_with_avg(1000);
    assert_eq!(queue.average_duration_ms(), 1000);

    // A near-instant job pulls the average down by the observation weight
    queue
        .enqueue(async { Ok(vec![]) })
        .unwrap()
        .wait()
        .await
        .unwrap();

    let avg = queue.average_duration_ms();
    assert!(
        (700..=740).contains(&avg),
        "expected ~0.7 * 1000, got {}",
        avg
    );
}

#[tokio::test]
async fn test_dropped_handle_does_not_cancel_the_job() {
    let queue = queue_with_avg(1000);
    let ran = Arc::new(AtomicUsize::new(0));

    let ran_clone = ran.clone();
    let handle = queue
        .enqueue(async move {
            ran_clone.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        })
        .unwrap();
    drop(handle);

    // A later job observes the earlier one already ran (FIFO)
    let ran_clone = ran.clone();
    queue
        .enqueue(async move {
            assert_eq!(ran_clone.load(Ordering::SeqCst), 1);
            Ok(vec![])
        })
        .unwrap()
        .wait()
        .await
        .unwrap();
}

#[tokio::test]
async fn test_full_queue_rejects_submission() {
    let queue = GenerationQueue::with_config(QueueConfig {
        max_queue_size: 2,
        initial_avg_duration_ms: 1000,
    });

    let gate = Arc::new(Semaphore::new(0));
    let mut handles = Vec::new();
    for _ in 0..2 {
        let gate = gate.clone();
        handles.push(
            queue
                .enqueue(async move {
                    gate.acquire().await.unwrap().forget();
                    Ok(vec![])
                })
                .unwrap(),
        );
    }

    assert!(queue.enqueue(async { Ok(vec![]) }).is_err());

    gate.add_permits(2);
    for handle in handles {
        handle.wait().await.unwrap();
    }
}
