use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use kissgate_frame::Frame;

/// Frames buffered per port before the oldest is evicted.
pub const QUEUE_CAPACITY: usize = 512;

#[derive(Debug)]
struct QueueState {
    frames: VecDeque<Frame>,
    closed: bool,
}

/// Bounded, drop-oldest frame queue for one port.
///
/// `pop` blocks until a frame arrives or the queue is closed. Frames already
/// queued at close time are still handed out before readers see the end.
#[derive(Debug)]
pub struct PortQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
    capacity: usize,
}

impl PortQueue {
    pub fn new() -> Self {
        Self::with_capacity(QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                frames: VecDeque::with_capacity(capacity.min(QUEUE_CAPACITY)),
                closed: false,
            }),
            ready: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a frame, returning the frame evicted to make room, if any.
    ///
    /// Frames pushed after close are discarded.
    pub fn push(&self, frame: Frame) -> Option<Frame> {
        let mut state = self.lock();
        if state.closed {
            return None;
        }
        let evicted = if state.frames.len() >= self.capacity {
            state.frames.pop_front()
        } else {
            None
        };
        state.frames.push_back(frame);
        drop(state);
        self.ready.notify_one();
        evicted
    }

    /// Take the oldest frame, blocking while the queue is empty and open.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub fn pop(&self) -> Option<Frame> {
        let mut state = self.lock();
        loop {
            if let Some(frame) = state.frames.pop_front() {
                return Some(frame);
            }
            if state.closed {
                return None;
            }
            state = self
                .ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Take the oldest frame without blocking.
    pub fn try_pop(&self) -> Option<Frame> {
        self.lock().frames.pop_front()
    }

    /// Close the queue and wake every blocked reader. Idempotent.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        drop(state);
        self.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for PortQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use kissgate_frame::DATA;

    use super::*;

    fn numbered(i: usize) -> Frame {
        Frame::new(0, DATA, i.to_string().into_bytes())
    }

    #[test]
    fn pops_in_arrival_order() {
        let queue = PortQueue::new();
        queue.push(numbered(1));
        queue.push(numbered(2));

        assert_eq!(queue.pop().unwrap().payload.as_ref(), b"1");
        assert_eq!(queue.pop().unwrap().payload.as_ref(), b"2");
        assert!(queue.try_pop().is_none());
    }

    #[test]
    fn overflow_evicts_single_oldest() {
        let queue = PortQueue::new();
        for i in 0..QUEUE_CAPACITY {
            assert!(queue.push(numbered(i)).is_none());
        }

        let evicted = queue.push(numbered(QUEUE_CAPACITY)).expect("oldest evicted");
        assert_eq!(evicted.payload.as_ref(), b"0");
        assert_eq!(queue.len(), QUEUE_CAPACITY);

        for i in 1..=QUEUE_CAPACITY {
            let frame = queue.try_pop().expect("frame queued");
            assert_eq!(frame.payload.as_ref(), i.to_string().as_bytes());
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn close_drains_then_ends() {
        let queue = PortQueue::with_capacity(4);
        queue.push(numbered(7));
        queue.close();
        queue.close();

        assert!(queue.is_closed());
        assert_eq!(queue.pop().unwrap().payload.as_ref(), b"7");
        assert!(queue.pop().is_none());
        assert!(queue.push(numbered(8)).is_none());
        assert!(queue.pop().is_none());
    }

    #[test]
    fn close_wakes_blocked_readers() {
        let queue = Arc::new(PortQueue::new());
        let readers: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || queue.pop())
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        queue.close();

        for reader in readers {
            assert!(reader.join().expect("reader should finish").is_none());
        }
    }

    #[test]
    fn blocked_reader_receives_pushed_frame() {
        let queue = Arc::new(PortQueue::new());
        let reader = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop())
        };

        thread::sleep(Duration::from_millis(20));
        queue.push(numbered(42));

        let frame = reader.join().expect("reader should finish").expect("frame");
        assert_eq!(frame.payload.as_ref(), b"42");
    }
}
