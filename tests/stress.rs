#![cfg(not(loom))]
use counted_stack::Stack;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Barrier,
    },
    thread,
    time::Duration,
};

/// A value that counts how many times values of its batch were dropped.
struct Counted {
    id: usize,
    drops: Arc<AtomicUsize>,
}

impl Drop for Counted {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

fn run_stress(pushers: usize, poppers: usize, per_thread: usize) {
    let stack = Arc::new(Stack::new());
    let drops = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(AtomicBool::new(false));
    let start = Arc::new(Barrier::new(pushers + poppers));

    let push_handles: Vec<_> = (0..pushers)
        .map(|t| {
            let stack = stack.clone();
            let drops = drops.clone();
            let start = start.clone();
            thread::spawn(move || {
                start.wait();
                for i in 0..per_thread {
                    stack.push(Counted {
                        id: t * per_thread + i,
                        drops: drops.clone(),
                    });
                }
            })
        })
        .collect();

    let pop_handles: Vec<_> = (0..poppers)
        .map(|_| {
            let stack = stack.clone();
            let done = done.clone();
            let start = start.clone();
            thread::spawn(move || {
                start.wait();
                let mut ids = Vec::new();
                loop {
                    match stack.pop() {
                        Some(value) => ids.push(value.id),
                        None if done.load(Ordering::Acquire) => {
                            // quiescence window: nothing is pushed any more,
                            // so two empty results in a row mean we're done.
                            thread::sleep(Duration::from_millis(1));
                            if stack.is_empty() {
                                break;
                            }
                        }
                        None => thread::yield_now(),
                    }
                }
                ids
            })
        })
        .collect();

    for handle in push_handles {
        handle.join().expect("pusher should not panic");
    }
    done.store(true, Ordering::Release);

    let mut counts = HashMap::new();
    for handle in pop_handles {
        for id in handle.join().expect("popper should not panic") {
            *counts.entry(id).or_insert(0usize) += 1;
        }
    }

    let total = pushers * per_thread;
    assert_eq!(counts.len(), total, "every pushed value is popped");
    assert!(
        counts.values().all(|&n| n == 1),
        "no value is popped twice"
    );
    assert_eq!(drops.load(Ordering::SeqCst), total);

    stack.try_reclaim();
    assert_eq!(stack.pending(), 0);
    assert_eq!(stack.pop().map(|v| v.id), None);
}

#[test]
fn balanced() {
    run_stress(4, 4, 5_000);
}

#[test]
fn many_poppers() {
    run_stress(2, 8, 5_000);
}

#[test]
fn many_pushers() {
    run_stress(8, 2, 2_500);
}

#[test]
fn mixed_push_pop_per_thread() {
    let stack = Arc::new(Stack::new());
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let stack = stack.clone();
            thread::spawn(move || {
                let mut popped = 0;
                for i in 0..10_000 {
                    if i % 3 == 2 {
                        popped += stack.pop().is_some() as usize;
                    } else {
                        stack.push(t * 10_000 + i);
                    }
                }
                popped
            })
        })
        .collect();

    let popped: usize = handles
        .into_iter()
        .map(|h| h.join().expect("thread should not panic"))
        .sum();

    let stack = Arc::try_unwrap(stack).expect("all clones are gone");
    let pushed = 8 * (10_000 - 10_000 / 3);
    let remaining = stack.into_iter().count();
    assert_eq!(popped + remaining, pushed);
}
