use linkage::{ClosableList, LockFreeQueue, LockFreeStack, StallingQueue};
use proptest::prelude::*;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
enum Operation {
    Push(u32),
    PushAll(Vec<u32>),
    Pop,
    PopAll,
}

fn operations() -> impl Strategy<Value = Vec<Operation>> {
    proptest::collection::vec(
        prop_oneof![
            4 => any::<u32>().prop_map(Operation::Push),
            1 => proptest::collection::vec(any::<u32>(), 0..8).prop_map(Operation::PushAll),
            3 => Just(Operation::Pop),
            1 => Just(Operation::PopAll),
        ],
        1..200,
    )
}

proptest! {
    #[test]
    fn test_stack_matches_vec(ops in operations()) {
        let mut model = Vec::new();
        let stack = LockFreeStack::new();

        for op in ops {
            match op {
                Operation::Push(v) => {
                    model.push(v);
                    stack.push(Box::new(v));
                }
                Operation::PushAll(vs) => {
                    model.extend(vs.iter().copied());
                    stack.push_all(vs.into_iter().map(Box::new));
                }
                Operation::Pop => {
                    prop_assert_eq!(stack.pop().map(|b| *b), model.pop());
                }
                Operation::PopAll => {
                    let drained: Vec<u32> = stack.pop_all().into_iter().map(|b| *b).collect();
                    let expected: Vec<u32> = model.drain(..).rev().collect();
                    prop_assert_eq!(drained, expected);
                }
            }
            prop_assert_eq!(stack.is_empty(), model.is_empty());
        }
    }

    #[test]
    fn test_queue_matches_vec_deque(ops in operations()) {
        let mut model = VecDeque::new();
        let queue = LockFreeQueue::new();

        for op in ops {
            match op {
                Operation::Push(v) => {
                    model.push_back(v);
                    queue.push(Box::new(v));
                }
                Operation::PushAll(vs) => {
                    for v in vs {
                        model.push_back(v);
                        queue.push(Box::new(v));
                    }
                }
                Operation::Pop => {
                    prop_assert_eq!(queue.pop().map(|b| *b), model.pop_front());
                }
                Operation::PopAll => {
                    let drained: Vec<u32> = queue.pop_all().into_iter().map(|b| *b).collect();
                    let expected: Vec<u32> = model.drain(..).collect();
                    prop_assert_eq!(drained, expected);
                }
            }
            prop_assert_eq!(queue.is_empty(), model.is_empty());
        }
    }

    #[test]
    fn test_closable_accepts_until_closed(
        before in proptest::collection::vec(any::<u16>(), 0..50),
        after in proptest::collection::vec(any::<u16>(), 0..10),
    ) {
        let list = ClosableList::new();
        for &v in &before {
            prop_assert!(list.push_if_not_closed(Box::new(v)).is_ok());
        }
        let drained: Vec<u16> = list.pop_all_and_close().into_iter().map(|b| *b).collect();
        prop_assert_eq!(drained, before.iter().rev().copied().collect::<Vec<_>>());
        for v in after {
            let refused = list.push_if_not_closed(Box::new(v));
            prop_assert_eq!(refused.map_err(|b| *b), Err(v));
        }
        prop_assert!(list.is_closed());
    }

    #[test]
    fn test_stalling_queue_matches_per_level_fifo(
        pushes in proptest::collection::vec((any::<u32>(), 0usize..4), 0..100),
    ) {
        let queue: StallingQueue<Box<u32>, 4> = StallingQueue::new();
        let mut levels: [VecDeque<u32>; 4] = Default::default();
        for &(v, priority) in &pushes {
            prop_assert_eq!(queue.push(Box::new(v), priority), None);
            levels[priority].push_back(v);
        }
        let expected: Vec<u32> = levels.iter_mut().flat_map(|level| level.drain(..)).collect();
        let popped: Vec<u32> = std::iter::from_fn(|| queue.pop(0, false).map(|b| *b)).collect();
        prop_assert_eq!(popped, expected);
        prop_assert!(queue.pop(0, true).is_none());
        prop_assert!(queue.is_stalled(0));
    }
}
