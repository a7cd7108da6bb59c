//! Fixed-size thread pools driving message callbacks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::queue::MpmcQueue;

/// Threads per worker pool unless configured otherwise.
pub const DEFAULT_WORKERS: usize = 8;

/// How long a worker blocks on its queue before re-checking the shutdown
/// flag.
const POP_TIMEOUT: Duration = Duration::from_millis(5);

/// A fixed set of threads draining one queue into one callback.
///
/// All threads observe a shared `keep_running` flag; once it drops and
/// the queue closes, each thread exits after its current message.
pub struct WorkerPool<T: Send + 'static> {
    name: String,
    queue: Arc<MpmcQueue<T>>,
    keep_running: Arc<AtomicBool>,
    handles: Vec<std::thread::JoinHandle<()>>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Spawn `worker_count` threads feeding `callback` from `queue`.
    pub fn start(
        name: impl Into<String>,
        worker_count: usize,
        queue: Arc<MpmcQueue<T>>,
        keep_running: Arc<AtomicBool>,
        callback: Arc<dyn Fn(T) + Send + Sync>,
    ) -> Self {
        let name = name.into();
        let mut handles = Vec::with_capacity(worker_count);
        for worker in 0..worker_count.max(1) {
            let queue = Arc::clone(&queue);
            let keep_running = Arc::clone(&keep_running);
            let callback = Arc::clone(&callback);
            let thread_name = format!("{name}-{worker}");
            let handle = std::thread::Builder::new()
                .name(thread_name.clone())
                .spawn(move || {
                    debug!(worker = %thread_name, "worker started");
                    while keep_running.load(Ordering::Acquire) || !queue.is_empty() {
                        if let Some(item) = queue.pop_timeout(POP_TIMEOUT) {
                            callback(item);
                        }
                    }
                    debug!(worker = %thread_name, "worker stopped");
                })
                .expect("spawning a worker thread");
            handles.push(handle);
        }
        Self {
            name,
            queue,
            keep_running,
            handles,
        }
    }

    /// Enqueue one item for the pool, spinning briefly when full.
    pub fn push(&self, item: T) -> bool {
        self.queue.push(item)
    }

    /// The pool's input queue, for producers held elsewhere.
    pub fn queue(&self) -> &Arc<MpmcQueue<T>> {
        &self.queue
    }

    /// Close the queue and join every thread.
    ///
    /// The shared `keep_running` flag must already be false or the
    /// threads will keep waiting for work.
    pub fn stop(mut self) {
        self.keep_running.store(false, Ordering::Release);
        self.queue.close();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!(pool = %self.name, "worker thread panicked");
            }
        }
    }
}
