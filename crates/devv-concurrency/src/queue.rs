//! A bounded multi-producer/multi-consumer queue.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Mutex-and-condvar bounded MPMC queue.
///
/// `try_push` never blocks; `pop_timeout` waits at most its timeout so
/// consumers can re-check their shutdown flag between waits. Closing the
/// queue wakes every blocked consumer.
pub struct MpmcQueue<T> {
    inner: Mutex<Inner<T>>,
    not_empty: Condvar,
    capacity: usize,
}

impl<T> MpmcQueue<T> {
    /// A queue holding at most `capacity` items.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_empty: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    /// Push without blocking. Returns the item back when the queue is full
    /// or closed.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        let mut inner = self.inner.lock();
        if inner.closed || inner.items.len() >= self.capacity {
            return Err(item);
        }
        inner.items.push_back(item);
        drop(inner);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Push, spinning briefly while the queue is full.
    ///
    /// Returns `false` if the queue closed before the item fit.
    pub fn push(&self, mut item: T) -> bool {
        loop {
            match self.try_push(item) {
                Ok(()) => return true,
                Err(rejected) => {
                    if self.is_closed() {
                        return false;
                    }
                    item = rejected;
                    std::thread::sleep(Duration::from_millis(1));
                }
            }
        }
    }

    /// Pop, waiting up to `timeout` for an item.
    ///
    /// `None` means the wait timed out or the queue closed empty; callers
    /// check their shutdown flag and try again.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let mut inner = self.inner.lock();
        if inner.items.is_empty() && !inner.closed {
            self.not_empty.wait_for(&mut inner, timeout);
        }
        inner.items.pop_front()
    }

    /// Close the queue and wake every waiting consumer. Items already
    /// queued can still be popped.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.not_empty.notify_all();
    }

    /// Whether the queue was closed.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Items currently queued.
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Maximum queued items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_fifo_order() {
        let queue = MpmcQueue::new(4);
        queue.try_push(1).unwrap();
        queue.try_push(2).unwrap();
        assert_eq!(queue.pop_timeout(Duration::from_millis(1)), Some(1));
        assert_eq!(queue.pop_timeout(Duration::from_millis(1)), Some(2));
        assert_eq!(queue.pop_timeout(Duration::from_millis(1)), None);
    }

    #[test]
    fn test_try_push_full() {
        let queue = MpmcQueue::new(1);
        queue.try_push(1).unwrap();
        assert_eq!(queue.try_push(2), Err(2));
    }

    #[test]
    fn test_close_wakes_consumer() {
        let queue = Arc::new(MpmcQueue::<u32>::new(1));
        let waiter = Arc::clone(&queue);
        let handle = std::thread::spawn(move || waiter.pop_timeout(Duration::from_secs(30)));

        std::thread::sleep(Duration::from_millis(20));
        queue.close();
        assert_eq!(handle.join().unwrap(), None);
    }

    #[test]
    fn test_drains_after_close() {
        let queue = MpmcQueue::new(2);
        queue.try_push(7).unwrap();
        queue.close();
        assert_eq!(queue.try_push(8), Err(8));
        assert_eq!(queue.pop_timeout(Duration::from_millis(1)), Some(7));
    }

    #[test]
    fn test_concurrent_producers_and_consumers() {
        let queue = Arc::new(MpmcQueue::new(8));
        let total = 4 * 250;

        let producers: Vec<_> = (0..4)
            .map(|p| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for i in 0..250 {
                        assert!(queue.push(p * 1000 + i));
                    }
                })
            })
            .collect();

        let consumed = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let consumed = Arc::clone(&consumed);
                std::thread::spawn(move || loop {
                    match queue.pop_timeout(Duration::from_millis(10)) {
                        Some(_) => {
                            consumed.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        }
                        None if queue.is_closed() => break,
                        None => {}
                    }
                })
            })
            .collect();

        for producer in producers {
            producer.join().unwrap();
        }
        queue.close();
        for consumer in consumers {
            consumer.join().unwrap();
        }
        assert_eq!(consumed.load(std::sync::atomic::Ordering::SeqCst), total);
    }
}
