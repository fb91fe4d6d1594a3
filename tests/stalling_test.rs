use linkage::StallingQueue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::thread;
use std::time::Duration;

#[test]
fn test_priority_then_fifo_order() {
    let queue: StallingQueue<Box<&str>, 3> = StallingQueue::new();
    queue.push(Box::new("low-1"), 2);
    queue.push(Box::new("high-1"), 0);
    queue.push(Box::new("mid-1"), 1);
    queue.push(Box::new("high-2"), 0);

    let order: Vec<&str> = std::iter::from_fn(|| queue.pop(0, false).map(|b| *b)).collect();
    assert_eq!(order, ["high-1", "high-2", "mid-1", "low-1"]);
    assert!(queue.is_empty());
}

#[test]
fn test_stall_then_push_wakes_lowest_slot() {
    let queue: StallingQueue<Box<u32>, 1> = StallingQueue::new();
    assert!(queue.pop(3, true).is_none());
    assert!(queue.pop(1, true).is_none());
    assert_eq!(queue.stalled_mask(), 0b1010);
    assert!(queue.is_stalled(1) && queue.is_stalled(3));

    assert_eq!(queue.push(Box::new(7), 0), Some(1));
    assert!(!queue.is_stalled(1));
    assert_eq!(queue.pop(1, true).map(|b| *b), Some(7));

    assert_eq!(queue.push(Box::new(8), 0), Some(3));
    assert_eq!(queue.stalled_mask(), 0);
    assert_eq!(queue.push(Box::new(9), 0), None);
}

#[test]
fn test_pop_without_stall_leaves_register_alone() {
    let queue: StallingQueue<Box<u32>, 2> = StallingQueue::new();
    assert!(queue.pop(0, false).is_none());
    assert_eq!(queue.stalled_mask(), 0);
}

#[test]
fn test_cancel_stall() {
    let queue: StallingQueue<Box<u32>, 1> = StallingQueue::new();
    assert!(!queue.cancel_stall(2));
    assert!(queue.pop(2, true).is_none());
    assert!(queue.cancel_stall(2));
    assert!(!queue.is_stalled(2));
    assert_eq!(queue.push(Box::new(1), 0), None);
}

#[test]
#[should_panic(expected = "out of range")]
fn test_priority_out_of_range() {
    let queue: StallingQueue<Box<u32>, 2> = StallingQueue::new();
    queue.push(Box::new(1), 2);
}

/// Consumers block on a condvar while stalled; every wake designated by a
/// push must find its consumer again and every item must be consumed.
#[test]
fn test_no_lost_wakeups() {
    const CONSUMERS: usize = 4;
    const ITEMS: usize = 20_000;

    let queue: StallingQueue<Box<usize>, 2> = StallingQueue::new();
    let parked = Mutex::new(());
    let wake = Condvar::new();
    let consumed = AtomicUsize::new(0);

    thread::scope(|s| {
        for slot in 0..CONSUMERS {
            let queue = &queue;
            let parked = &parked;
            let wake = &wake;
            let consumed = &consumed;
            s.spawn(move || {
                while consumed.load(Ordering::Acquire) < ITEMS {
                    if queue.pop(slot, true).is_some() {
                        consumed.fetch_add(1, Ordering::AcqRel);
                        continue;
                    }
                    let mut guard = parked.lock().unwrap();
                    while queue.is_stalled(slot) && consumed.load(Ordering::Acquire) < ITEMS {
                        let timeout = Duration::from_millis(50);
                        guard = wake.wait_timeout(guard, timeout).unwrap().0;
                    }
                    drop(guard);
                    queue.cancel_stall(slot);
                }
            });
        }

        for i in 0..ITEMS {
            if queue.push(Box::new(i), i % 2).is_some() {
                let _guard = parked.lock().unwrap();
                wake.notify_all();
            }
        }
    });

    assert_eq!(consumed.load(Ordering::Relaxed), ITEMS);
    assert!(queue.is_empty());
}
