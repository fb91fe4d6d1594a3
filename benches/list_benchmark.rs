use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use linkage::{LockFreeQueue, LockFreeStack};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::thread;

const OPS: usize = 10_000;

fn bench_single_thread(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_thread_push_pop");
    group.throughput(Throughput::Elements(OPS as u64));

    group.bench_function("linkage_stack", |b| {
        let stack = LockFreeStack::new();
        b.iter(|| {
            for i in 0..OPS {
                stack.push(Box::new(i));
                black_box(stack.pop());
            }
        })
    });

    group.bench_function("mutex_vec", |b| {
        let stack = Mutex::new(Vec::new());
        b.iter(|| {
            for i in 0..OPS {
                stack.lock().unwrap().push(Box::new(i));
                black_box(stack.lock().unwrap().pop());
            }
        })
    });

    group.bench_function("linkage_queue", |b| {
        let queue = LockFreeQueue::new();
        b.iter(|| {
            for i in 0..OPS {
                queue.push(Box::new(i));
                black_box(queue.pop());
            }
        })
    });

    group.bench_function("mutex_vec_deque", |b| {
        let queue = Mutex::new(VecDeque::new());
        b.iter(|| {
            for i in 0..OPS {
                queue.lock().unwrap().push_back(Box::new(i));
                black_box(queue.lock().unwrap().pop_front());
            }
        })
    });

    group.finish();
}

fn bench_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_push_pop");

    for threads in [2usize, 4] {
        group.throughput(Throughput::Elements((OPS * threads) as u64));

        group.bench_with_input(BenchmarkId::new("linkage_stack", threads), &threads, |b, _| {
            let stack = LockFreeStack::new();
            b.iter(|| {
                thread::scope(|s| {
                    for _ in 0..threads {
                        let stack = &stack;
                        s.spawn(move || {
                            for i in 0..OPS {
                                stack.push(Box::new(i));
                                black_box(stack.pop());
                            }
                        });
                    }
                });
            })
        });

        group.bench_with_input(BenchmarkId::new("mutex_vec", threads), &threads, |b, _| {
            let stack = Mutex::new(Vec::new());
            b.iter(|| {
                thread::scope(|s| {
                    for _ in 0..threads {
                        let stack = &stack;
                        s.spawn(move || {
                            for i in 0..OPS {
                                stack.lock().unwrap().push(Box::new(i));
                                black_box(stack.lock().unwrap().pop());
                            }
                        });
                    }
                });
            })
        });

        group.bench_with_input(BenchmarkId::new("linkage_queue", threads), &threads, |b, _| {
            let queue = LockFreeQueue::new();
            b.iter(|| {
                thread::scope(|s| {
                    for _ in 0..threads {
                        let queue = &queue;
                        s.spawn(move || {
                            for i in 0..OPS {
                                queue.push(Box::new(i));
                                black_box(queue.pop());
                            }
                        });
                    }
                });
            })
        });

        group.bench_with_input(BenchmarkId::new("mutex_vec_deque", threads), &threads, |b, _| {
            let queue = Mutex::new(VecDeque::new());
            b.iter(|| {
                thread::scope(|s| {
                    for _ in 0..threads {
                        let queue = &queue;
                        s.spawn(move || {
                            for i in 0..OPS {
                                queue.lock().unwrap().push_back(Box::new(i));
                                black_box(queue.lock().unwrap().pop_front());
                            }
                        });
                    }
                });
            })
        });
    }

    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch");
    group.throughput(Throughput::Elements(OPS as u64));

    group.bench_function("linkage_push_all_pop_all", |b| {
        let stack = LockFreeStack::new();
        b.iter(|| {
            stack.push_all((0..OPS).map(Box::new));
            black_box(stack.pop_all());
        })
    });

    group.bench_function("mutex_vec_extend_drain", |b| {
        let stack = Mutex::new(Vec::new());
        b.iter(|| {
            stack.lock().unwrap().extend((0..OPS).map(Box::new));
            black_box(std::mem::take(&mut *stack.lock().unwrap()));
        })
    });

    group.finish();
}

criterion_group!(benches, bench_single_thread, bench_contended, bench_batch);
criterion_main!(benches);
