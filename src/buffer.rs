//! Bounded, non-blocking, closeable FIFO buffer.
//!
//! `Buffer` is the unit the elastic [`BufferPool`](crate::pool::BufferPool)
//! is built from. Both `put` and `get` return immediately; blocking behavior
//! is the pool's job.
//!
//! The close protocol is the one non-trivial part: `put` runs under the
//! shared half of a lock and re-checks the closed flag *inside* the shared
//! region, while `close` flips the flag with a CAS and then acquires the
//! exclusive half. Once `close` holds the exclusive lock, every in-flight
//! `put` has either finished or will observe the flag, so no value can slip
//! into a buffer that a caller believes closed — without serializing `put`
//! calls against each other.

use std::sync::atomic::{AtomicU32, Ordering};

use crossbeam::queue::ArrayQueue;
use parking_lot::RwLock;
use thiserror::Error;

use crate::error::CrawlerError;

/// Errors raised by [`Buffer`] and [`BufferPool`](crate::pool::BufferPool).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BufferError {
    /// The buffer has been closed.
    #[error("closed buffer")]
    ClosedBuffer,
    /// The buffer pool has been closed.
    #[error("closed buffer pool")]
    ClosedPool,
}

/// Outcome of a non-blocking [`Buffer::put`].
#[derive(Debug, PartialEq, Eq)]
pub enum PutStatus<T> {
    /// The value was enqueued.
    Accepted,
    /// The buffer was full; the rejected value is handed back.
    Full(T),
}

/// A bounded FIFO of values with non-blocking operations.
pub struct Buffer<T> {
    /// Backing queue holding the data.
    ch: ArrayQueue<T>,
    /// Closed state: 0 = open, 1 = closed.
    closed: AtomicU32,
    /// Sequences `put` bodies (shared) against `close` (exclusive).
    closing_lock: RwLock<()>,
}

impl<T> Buffer<T> {
    /// Creates a buffer with the given capacity.
    pub fn new(size: u32) -> Result<Self, CrawlerError> {
        if size == 0 {
            return Err(CrawlerError::illegal_parameter(format!(
                "illegal size for buffer: {size}"
            )));
        }
        Ok(Buffer {
            ch: ArrayQueue::new(size as usize),
            closed: AtomicU32::new(0),
            closing_lock: RwLock::new(()),
        })
    }

    /// The buffer's capacity.
    pub fn cap(&self) -> u32 {
        self.ch.capacity() as u32
    }

    /// The number of values currently enqueued.
    pub fn len(&self) -> u32 {
        self.ch.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.ch.is_empty()
    }

    /// Enqueues a value without blocking.
    ///
    /// Returns [`PutStatus::Full`] with the value when the buffer is at
    /// capacity and `Err(ClosedBuffer)` once the buffer has been closed.
    pub fn put(&self, datum: T) -> Result<PutStatus<T>, BufferError> {
        let _shared = self.closing_lock.read();
        // The flag must be read after the shared lock is held; a close
        // between the read and the push would otherwise let a value land in
        // a buffer the closer already considers drained.
        if self.closed() {
            return Err(BufferError::ClosedBuffer);
        }
        match self.ch.push(datum) {
            Ok(()) => Ok(PutStatus::Accepted),
            Err(rejected) => Ok(PutStatus::Full(rejected)),
        }
    }

    /// Dequeues a value without blocking.
    ///
    /// Returns `Ok(None)` when the buffer is empty but still open, and
    /// `Err(ClosedBuffer)` once it is both closed and drained.
    pub fn get(&self) -> Result<Option<T>, BufferError> {
        if let Some(datum) = self.ch.pop() {
            return Ok(Some(datum));
        }
        if self.closed() {
            // A put racing the close may have landed after the first pop.
            match self.ch.pop() {
                Some(datum) => Ok(Some(datum)),
                None => Err(BufferError::ClosedBuffer),
            }
        } else {
            Ok(None)
        }
    }

    /// Closes the buffer. Returns `true` only on the first call.
    pub fn close(&self) -> bool {
        if self
            .closed
            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            // Waits out every put that entered before the flag flipped.
            let _exclusive = self.closing_lock.write();
            true
        } else {
            false
        }
    }

    /// Whether the buffer has been closed.
    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_capacity() {
        assert!(Buffer::<u32>::new(0).is_err());
    }

    #[test]
    fn fifo_order_is_preserved() {
        let buf = Buffer::new(8).unwrap();
        for i in 0..5u32 {
            assert!(matches!(buf.put(i), Ok(PutStatus::Accepted)));
        }
        assert_eq!(buf.len(), 5);
        for i in 0..5u32 {
            assert_eq!(buf.get().unwrap(), Some(i));
        }
        assert_eq!(buf.get().unwrap(), None);
    }

    #[test]
    fn full_buffer_hands_value_back() {
        let buf = Buffer::new(1).unwrap();
        assert!(matches!(buf.put(1u32), Ok(PutStatus::Accepted)));
        match buf.put(2u32) {
            Ok(PutStatus::Full(rejected)) => assert_eq!(rejected, 2),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.cap(), 1);
    }

    #[test]
    fn close_is_idempotent() {
        let buf = Buffer::<u32>::new(2).unwrap();
        assert!(!buf.closed());
        assert!(buf.close());
        assert!(buf.closed());
        assert!(!buf.close());
    }

    #[test]
    fn closed_buffer_drains_then_errors() {
        let buf = Buffer::new(4).unwrap();
        buf.put(10u32).unwrap();
        buf.put(20u32).unwrap();
        assert!(buf.close());
        assert_eq!(buf.put(30u32), Err(BufferError::ClosedBuffer));
        assert_eq!(buf.get().unwrap(), Some(10));
        assert_eq!(buf.get().unwrap(), Some(20));
        assert_eq!(buf.get(), Err(BufferError::ClosedBuffer));
    }

    #[test]
    fn concurrent_put_and_close_never_lose_the_flag() {
        use std::sync::Arc;

        let buf = Arc::new(Buffer::new(1024).unwrap());
        let mut handles = Vec::new();
        for t in 0..4 {
            let buf = Arc::clone(&buf);
            handles.push(std::thread::spawn(move || {
                let mut accepted = 0u32;
                for i in 0..1000u32 {
                    match buf.put(t * 1000 + i) {
                        Ok(PutStatus::Accepted) => accepted += 1,
                        Ok(PutStatus::Full(_)) => {}
                        Err(BufferError::ClosedBuffer) => break,
                        Err(e) => panic!("unexpected error: {e}"),
                    }
                }
                accepted
            }));
        }
        std::thread::sleep(std::time::Duration::from_millis(1));
        buf.close();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(buf.closed());
        assert_eq!(buf.put(0), Err(BufferError::ClosedBuffer));
    }
}
