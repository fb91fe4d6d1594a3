use linkage::ClosableList;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

#[test]
fn test_close_returns_contents_newest_first() {
    let list = ClosableList::new();
    assert!(!list.is_closed());
    for i in 0..5 {
        assert!(list.push_if_not_closed(Box::new(i)).is_ok());
    }
    let drained: Vec<i32> = list.pop_all_and_close().into_iter().map(|b| *b).collect();
    assert_eq!(drained, [4, 3, 2, 1, 0]);
    assert!(list.is_closed());
    assert!(list.is_empty());
}

#[test]
fn test_push_after_close_hands_item_back() {
    let list = ClosableList::new();
    assert!(list.pop_all_and_close().is_empty());
    match list.push_if_not_closed(Box::new(42)) {
        Err(item) => assert_eq!(*item, 42),
        Ok(()) => panic!("pushed into a closed list"),
    }
    assert!(list.is_empty());
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "closed twice")]
fn test_double_close_is_caught() {
    let list: ClosableList<Box<u8>> = ClosableList::new();
    list.pop_all_and_close();
    list.pop_all_and_close();
}

#[test]
fn test_drop_open_list_releases_payloads() {
    use std::sync::Arc;
    let marker = Arc::new(());
    {
        let list = ClosableList::new();
        for _ in 0..10 {
            list.push_if_not_closed(Arc::clone(&marker)).unwrap();
        }
    }
    assert_eq!(Arc::strong_count(&marker), 1);
}

#[test]
fn test_close_is_monotonic_under_contention() {
    const PRODUCERS: usize = 4;

    let list = ClosableList::new();
    let accepted = AtomicUsize::new(0);

    let drained = thread::scope(|s| {
        for p in 0..PRODUCERS {
            let list = &list;
            let accepted = &accepted;
            s.spawn(move || {
                let mut i = 0;
                loop {
                    match list.push_if_not_closed(Box::new(p * 1_000_000 + i)) {
                        Ok(()) => {
                            accepted.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(_) => {
                            assert!(list.is_closed());
                            break;
                        }
                    }
                    i += 1;
                }
            });
        }

        thread::sleep(std::time::Duration::from_millis(5));
        list.pop_all_and_close()
    });

    // Every accepted push was drained by the close; nothing slipped in after.
    assert!(list.is_closed());
    assert_eq!(drained.len(), accepted.load(Ordering::Relaxed));
    assert!(list.is_empty());
}
