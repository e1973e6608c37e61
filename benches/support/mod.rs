use std::{
    sync::{Arc, Barrier},
    thread,
    time::{Duration, Instant},
};

/// Runs closures on several threads at once and times them from a shared
/// starting line to the moment the last one finishes.
#[derive(Clone)]
pub struct MultithreadedBench<T> {
    start: Arc<Barrier>,
    end: Arc<Barrier>,
    target: Arc<T>,
}

impl<T: Send + Sync + 'static> MultithreadedBench<T> {
    /// `threads` is the number of closures that will be passed to
    /// [`thread`](Self::thread).
    pub fn new(target: Arc<T>, threads: usize) -> Self {
        Self {
            start: Arc::new(Barrier::new(threads + 1)),
            end: Arc::new(Barrier::new(threads + 1)),
            target,
        }
    }

    pub fn thread(&self, f: impl FnOnce(&Barrier, &T) + Send + 'static) -> &Self {
        let start = self.start.clone();
        let end = self.end.clone();
        let target = self.target.clone();
        thread::spawn(move || {
            f(&start, &target);
            end.wait();
        });
        self
    }

    pub fn run(&self) -> Duration {
        self.start.wait();
        let t0 = Instant::now();
        self.end.wait();
        t0.elapsed()
    }
}
