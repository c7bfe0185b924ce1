use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use log::trace;

use gradnet_core::{Shape, Tensor};

use crate::loader::Loader;

/// A bounded queue of buffer sets with its own lock and wakeup.
struct Queue {
    items: Mutex<VecDeque<Vec<Tensor>>>,
    cond: Condvar,
}

impl Queue {
    fn new() -> Self {
        Queue { items: Mutex::new(VecDeque::new()), cond: Condvar::new() }
    }

    fn push(&self, set: Vec<Tensor>) {
        self.items.lock().unwrap().push_back(set);
        self.cond.notify_all();
    }

    /// Blocks until a set is available or `stop` is raised.
    fn pop_wait(&self, stop: &AtomicBool) -> Option<Vec<Tensor>> {
        let mut items = self.items.lock().unwrap();
        loop {
            if let Some(set) = items.pop_front() {
                return Some(set);
            }
            if stop.load(Ordering::Acquire) {
                return None;
            }
            items = self.cond.wait(items).unwrap();
        }
    }
}

struct Shared {
    pending: Queue,
    available: Queue,
    loaders: Mutex<Vec<Box<dyn Loader>>>,
    stop: AtomicBool,
}

/// Double-buffered batch preloader.
///
/// A fixed number of buffer sets cycles between two queues: `pending` sets
/// wait to be filled by the loaders, `available` sets hold data ready for
/// consumption. In threaded mode a worker fills sets as soon as they come
/// back, so loading overlaps with graph execution; otherwise one set is
/// filled synchronously per [`DataPreloader::load_into`] call.
pub struct DataPreloader {
    shared: Arc<Shared>,
    threaded: bool,
    worker: Option<JoinHandle<()>>,
}

impl DataPreloader {
    /// `shapes` gives one slot per destination tensor; `capacity` is the
    /// number of buffer sets in flight.
    pub fn new(
        shapes: &[Shape],
        loaders: Vec<Box<dyn Loader>>,
        capacity: usize,
        threaded: bool,
    ) -> Self {
        let shared = Arc::new(Shared {
            pending: Queue::new(),
            available: Queue::new(),
            loaders: Mutex::new(loaders),
            stop: AtomicBool::new(false),
        });
        for _ in 0..capacity {
            shared.pending.push(shapes.iter().map(|&s| Tensor::zeros(s)).collect());
        }

        let worker = threaded.then(|| {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                while !shared.stop.load(Ordering::Acquire) {
                    Self::preload(&shared);
                }
            })
        });

        DataPreloader { shared, threaded, worker }
    }

    /// Takes a pending set, runs every loader over it and publishes it as
    /// available. Returns without publishing when stopped mid-wait.
    fn preload(shared: &Shared) {
        let Some(mut set) = shared.pending.pop_wait(&shared.stop) else {
            return;
        };

        let mut filled = 0;
        let mut loaders = shared.loaders.lock().unwrap();
        for loader in loaders.iter_mut() {
            filled += loader.load(&mut set, filled);
        }
        assert_eq!(filled, set.len(), "loaders filled {} of {} slots", filled, set.len());
        drop(loaders);

        trace!("preloaded a buffer set of {} tensors", set.len());
        shared.available.push(set);
    }

    /// Blocks until a filled buffer set is ready, copies it into `dest`
    /// (resizing each destination's batch axis to match) and recycles the
    /// set. The call is a no-op if the preloader is stopping.
    pub fn load_into(&self, dest: &mut [Tensor]) {
        if !self.threaded {
            Self::preload(&self.shared);
        }

        let Some(set) = self.shared.available.pop_wait(&self.shared.stop) else {
            return;
        };
        assert_eq!(set.len(), dest.len(), "buffer set size does not match destination count");

        for (src, dst) in set.iter().zip(dest.iter_mut()) {
            src.copy_into(dst);
        }

        self.shared.pending.push(set);
    }
}

impl Drop for DataPreloader {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        self.shared.pending.cond.notify_all();
        self.shared.available.cond.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
#[path = "preloader_test.rs"]
mod preloader_test;
