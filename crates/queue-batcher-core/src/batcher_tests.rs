//! Tests for the timed batcher.

use super::*;
use tokio::time::Instant;

const TIMEOUT: Duration = Duration::from_millis(100);

fn batcher(capacity: usize) -> TimedBatcher<u32> {
    TimedBatcher::new(BatcherOptions::new(capacity, TIMEOUT.as_millis() as u64)).unwrap()
}

fn items(range: std::ops::Range<u32>) -> Vec<u32> {
    range.collect()
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_missing_capacity_is_rejected() {
    let result = TimedBatcher::<u32>::new(BatcherOptions {
        capacity: None,
        timeout_ms: Some(100),
    });
    assert_eq!(result.err().map(|e| e.field().to_string()), Some("capacity".to_string()));
}

#[test]
fn test_missing_timeout_is_rejected() {
    let result = TimedBatcher::<u32>::new(BatcherOptions {
        capacity: Some(10),
        timeout_ms: None,
    });
    assert_eq!(
        result.err(),
        Some(ConfigurationError::missing("timeout_ms"))
    );
}

#[test]
fn test_zero_values_are_rejected() {
    assert!(matches!(
        TimedBatcher::<u32>::new(BatcherOptions::new(0, 100)),
        Err(ConfigurationError::Invalid { .. })
    ));
    assert!(matches!(
        TimedBatcher::<u32>::new(BatcherOptions::new(10, 0)),
        Err(ConfigurationError::Invalid { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_huge_capacity_allocates_nothing_up_front() {
    let batcher =
        TimedBatcher::<u32>::new(BatcherOptions::new(usize::MAX, TIMEOUT.as_millis() as u64))
            .unwrap();
    assert_eq!(batcher.capacity(), usize::MAX);

    let mut flushes = batcher.subscribe();
    batcher.add(items(0..3));
    assert_eq!(flushes.recv().await.unwrap(), vec![0, 1, 2]);
}

// ============================================================================
// Size-triggered flushes
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_full_sequence_flushes_immediately() {
    let batcher = batcher(100);
    let mut flushes = batcher.subscribe();

    batcher.add(items(0..100));

    let batch = flushes.try_recv().unwrap();
    assert_eq!(batch, items(0..100));
    assert!(batcher.is_empty());
    assert!(!batcher.has_pending_timer());
}

#[tokio::test(start_paused = true)]
async fn test_single_items_flush_once_at_capacity() {
    let batcher = batcher(10);
    let mut flushes = batcher.subscribe();

    for i in 0..10 {
        assert!(flushes.try_recv().is_err());
        batcher.add_one(i);
    }

    assert_eq!(flushes.try_recv().unwrap(), items(0..10));
    assert!(flushes.try_recv().is_err());
    assert!(!batcher.has_pending_timer());
}

#[tokio::test(start_paused = true)]
async fn test_overflow_is_carried_into_next_batch() {
    let batcher = batcher(100);
    let mut flushes = batcher.subscribe();
    let started = Instant::now();

    batcher.add(items(0..70));
    assert!(batcher.has_pending_timer());
    batcher.add(items(70..110));

    assert_eq!(flushes.try_recv().unwrap(), items(0..100));
    assert_eq!(batcher.len(), 10);
    assert!(batcher.has_pending_timer());

    let remainder = flushes.recv().await.unwrap();
    assert_eq!(remainder, items(100..110));
    assert_eq!(started.elapsed(), TIMEOUT);
}

#[tokio::test(start_paused = true)]
async fn test_large_input_is_split_into_capacity_sized_flushes() {
    let batcher = batcher(10);
    let mut flushes = batcher.subscribe();

    batcher.add(items(0..35));

    for expected in [0..10, 10..20, 20..30] {
        assert_eq!(flushes.try_recv().unwrap(), items(expected));
    }
    assert!(flushes.try_recv().is_err());
    assert_eq!(flushes.recv().await.unwrap(), items(30..35));
}

// ============================================================================
// Timer-triggered flushes
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_single_item_flushes_after_timeout() {
    let batcher = batcher(100);
    let mut flushes = batcher.subscribe();
    let started = Instant::now();

    batcher.add_one(7);
    assert!(flushes.try_recv().is_err());

    assert_eq!(flushes.recv().await.unwrap(), vec![7]);
    assert_eq!(started.elapsed(), TIMEOUT);
    assert!(!batcher.has_pending_timer());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_measured_from_first_item() {
    let batcher = batcher(10);
    let mut flushes = batcher.subscribe();
    let started = Instant::now();

    batcher.add_one(1);
    tokio::time::advance(Duration::from_millis(60)).await;
    batcher.add_one(2);

    assert_eq!(flushes.recv().await.unwrap(), vec![1, 2]);
    assert_eq!(started.elapsed(), TIMEOUT);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_fixed_before_timer_task_runs() {
    let batcher = batcher(10);
    let mut flushes = batcher.subscribe();
    let started = Instant::now();

    // The timer task first runs after the clock has already moved
    batcher.add_one(1);
    tokio::time::advance(TIMEOUT - Duration::from_millis(10)).await;

    assert_eq!(flushes.recv().await.unwrap(), vec![1]);
    assert_eq!(started.elapsed(), TIMEOUT);
}

#[tokio::test]
async fn test_busy_runtime_does_not_extend_timeout() {
    let batcher = batcher(10);
    let mut flushes = batcher.subscribe();
    let added = std::time::Instant::now();

    batcher.add_one(1);
    // Block the only runtime thread well past the timeout
    std::thread::sleep(Duration::from_millis(300));

    assert_eq!(flushes.recv().await.unwrap(), vec![1]);
    let elapsed = added.elapsed();
    assert!(elapsed >= Duration::from_millis(300));
    assert!(
        elapsed < Duration::from_millis(300) + TIMEOUT,
        "flushed {:?} after the first add",
        elapsed
    );
}

#[tokio::test(start_paused = true)]
async fn test_capacity_flush_cancels_timer() {
    let batcher = batcher(3);
    let mut flushes = batcher.subscribe();

    batcher.add(vec![1, 2]);
    assert!(batcher.has_pending_timer());
    batcher.add_one(3);
    assert_eq!(flushes.try_recv().unwrap(), vec![1, 2, 3]);

    tokio::time::sleep(TIMEOUT * 2).await;
    assert!(flushes.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_empty_add_starts_no_timer() {
    let batcher = batcher(3);
    batcher.add(Vec::new());
    assert!(!batcher.has_pending_timer());
    assert!(batcher.is_empty());
}

// ============================================================================
// Ordering and subscribers
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_flushes_preserve_order_and_never_exceed_capacity() {
    let capacity = 5;
    let batcher = batcher(capacity);
    let mut flushes = batcher.subscribe();

    let mut next = 0u32;
    let mut added = Vec::new();
    for size in [3u32, 0, 7, 12, 1, 25, 4, 5, 2] {
        let chunk = items(next..next + size);
        next += size;
        added.extend(chunk.iter().copied());
        batcher.add(chunk);
    }

    let mut emitted = Vec::new();
    while emitted.len() < added.len() {
        let batch = flushes.recv().await.unwrap();
        assert!(!batch.is_empty());
        assert!(batch.len() <= capacity);
        emitted.extend(batch);
    }

    assert_eq!(emitted, added);
}

#[tokio::test(start_paused = true)]
async fn test_every_subscriber_receives_every_flush() {
    let batcher = batcher(2);
    let mut first = batcher.subscribe();
    let mut second = batcher.subscribe();

    batcher.add(vec![1, 2, 3, 4]);

    assert_eq!(first.try_recv().unwrap(), vec![1, 2]);
    assert_eq!(first.try_recv().unwrap(), vec![3, 4]);
    assert_eq!(second.try_recv().unwrap(), vec![1, 2]);
    assert_eq!(second.try_recv().unwrap(), vec![3, 4]);
}

#[tokio::test(start_paused = true)]
async fn test_closed_subscribers_are_dropped() {
    let batcher = batcher(1);
    let dropped = batcher.subscribe();
    let mut kept = batcher.subscribe();
    drop(dropped);

    batcher.add_one(9);
    assert_eq!(kept.try_recv().unwrap(), vec![9]);
}

#[tokio::test(start_paused = true)]
async fn test_usable_through_trait_object() {
    let batcher: Arc<dyn Batcher<u32>> = Arc::new(batcher(2));
    let mut flushes = batcher.subscribe();

    batcher.add_one(1);
    batcher.add_one(2);
    assert_eq!(flushes.try_recv().unwrap(), vec![1, 2]);
}
