//! Elastic pool of buffers acting as one logical stage channel.
//!
//! A `BufferPool` holds between one and `max_buffer_number` [`Buffer`]s that
//! share a per-buffer capacity. `put` and `get` block (by awaiting a buffer
//! handle), which is what gives the pipeline its backpressure: a producer
//! facing a full pool parks until a consumer makes room.
//!
//! Buffers circulate through an internal handle channel. Each operation
//! borrows one buffer, tries it, and returns it — and only sustained failure
//! changes the population: a producer that keeps meeting full buffers grows
//! the pool (up to the maximum), a consumer that keeps meeting empty ones
//! shrinks it (down to one). Bursts are absorbed without unbounded memory,
//! and the extra buffers are reclaimed when traffic subsides.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use kanal::{AsyncReceiver, AsyncSender};
use parking_lot::RwLock;
use tracing::trace;

use crate::buffer::{Buffer, BufferError, PutStatus};
use crate::error::CrawlerError;

/// How many consecutive full-buffer misses (per current buffer) a producer
/// tolerates before growing the pool.
const PUT_FAIL_FACTOR: u32 = 5;
/// How many consecutive empty-buffer misses (per current buffer) a consumer
/// tolerates before shrinking the pool.
const GET_FAIL_FACTOR: u32 = 10;

/// An elastic, closeable collection of [`Buffer`]s with blocking `put`/`get`.
pub struct BufferPool<T> {
    /// Capacity of every buffer in the pool.
    buffer_cap: u32,
    /// Upper bound on the buffer population.
    max_buffer_number: u32,
    /// Current buffer population.
    buffer_number: AtomicU32,
    /// Values currently enqueued across all buffers.
    total: AtomicU64,
    buf_tx: AsyncSender<Arc<Buffer<T>>>,
    buf_rx: AsyncReceiver<Arc<Buffer<T>>>,
    /// Closed state: 0 = open, 1 = closed.
    closed: AtomicU32,
    /// Sequences buffer hand-backs (shared) against `close` (exclusive).
    rwlock: RwLock<()>,
}

impl<T> BufferPool<T> {
    /// Creates a pool with one warm buffer.
    pub fn new(buffer_cap: u32, max_buffer_number: u32) -> Result<Self, CrawlerError> {
        if buffer_cap == 0 {
            return Err(CrawlerError::illegal_parameter(format!(
                "illegal buffer cap for buffer pool: {buffer_cap}"
            )));
        }
        if max_buffer_number == 0 {
            return Err(CrawlerError::illegal_parameter(format!(
                "illegal max buffer number for buffer pool: {max_buffer_number}"
            )));
        }
        let (buf_tx, buf_rx) = kanal::bounded_async(max_buffer_number as usize);
        let warm = Buffer::new(buffer_cap)?;
        // The channel was just created with room for max_buffer_number
        // handles, so the warm buffer always fits.
        let _ = buf_tx.try_send(Arc::new(warm));
        Ok(BufferPool {
            buffer_cap,
            max_buffer_number,
            buffer_number: AtomicU32::new(1),
            total: AtomicU64::new(0),
            buf_tx,
            buf_rx,
            closed: AtomicU32::new(0),
            rwlock: RwLock::new(()),
        })
    }

    /// The uniform capacity of buffers in this pool.
    pub fn buffer_cap(&self) -> u32 {
        self.buffer_cap
    }

    /// The maximum buffer population.
    pub fn max_buffer_number(&self) -> u32 {
        self.max_buffer_number
    }

    /// The current buffer population.
    pub fn buffer_number(&self) -> u32 {
        self.buffer_number.load(Ordering::SeqCst)
    }

    /// The number of values currently enqueued across all buffers.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    /// Puts a value into the pool, blocking while every buffer is full.
    ///
    /// Returns `Err(ClosedPool)` once the pool has been closed.
    pub async fn put(&self, datum: T) -> Result<(), BufferError> {
        if self.is_closed() {
            return Err(BufferError::ClosedPool);
        }
        let mut fail = 0u32;
        let max_fail = self.buffer_number() * PUT_FAIL_FACTOR;
        let mut datum = datum;
        loop {
            let buf = match self.buf_rx.recv().await {
                Ok(buf) => buf,
                Err(_) => return Err(BufferError::ClosedPool),
            };
            match self.put_into(buf, datum, &mut fail, max_fail)? {
                None => return Ok(()),
                Some(back) => {
                    datum = back;
                    // The handle channel is rarely empty, so a producer stuck
                    // on full buffers must yield or it can starve consumers
                    // on a small runtime.
                    tokio::task::yield_now().await;
                }
            }
        }
    }

    /// Tries one borrowed buffer; hands the value back when it must be
    /// retried against another buffer.
    fn put_into(
        &self,
        buf: Arc<Buffer<T>>,
        datum: T,
        fail: &mut u32,
        max_fail: u32,
    ) -> Result<Option<T>, BufferError> {
        if self.is_closed() {
            return Err(BufferError::ClosedPool);
        }
        let mut back = None;
        let mut err = None;
        match buf.put(datum) {
            Ok(PutStatus::Accepted) => {
                self.total.fetch_add(1, Ordering::SeqCst);
            }
            Ok(PutStatus::Full(rejected)) => {
                *fail = fail.saturating_add(1);
                if *fail >= max_fail && self.buffer_number() < self.max_buffer_number {
                    back = self.grow_with(rejected, fail);
                } else {
                    back = Some(rejected);
                }
            }
            Err(_) => {
                // A pooled buffer only closes while the pool is closing.
                err = Some(BufferError::ClosedPool);
            }
        }
        self.hand_back(buf, &mut err);
        if let Some(e) = err {
            return Err(e);
        }
        Ok(back)
    }

    /// Creates a new buffer seeded with `datum` and adds it to the pool.
    ///
    /// Returns the value back when the pool is closing or another producer
    /// grew it to the maximum first.
    fn grow_with(&self, datum: T, fail: &mut u32) -> Option<T> {
        let _exclusive = self.rwlock.write();
        if self.is_closed() {
            return Some(datum);
        }
        if self.buffer_number() >= self.max_buffer_number {
            *fail = 0;
            return Some(datum);
        }
        let fresh = match Buffer::new(self.buffer_cap) {
            Ok(buf) => buf,
            Err(_) => return Some(datum),
        };
        // Fresh buffer with a non-zero capacity: the put always lands.
        let _ = fresh.put(datum);
        let _ = self.buf_tx.try_send(Arc::new(fresh));
        self.buffer_number.fetch_add(1, Ordering::SeqCst);
        self.total.fetch_add(1, Ordering::SeqCst);
        trace!(buffer_number = self.buffer_number(), "buffer pool grew");
        *fail = 0;
        None
    }

    /// Gets a value from the pool, blocking while every buffer is empty.
    ///
    /// Returns `Err(ClosedPool)` once the pool has been closed.
    pub async fn get(&self) -> Result<T, BufferError> {
        if self.is_closed() {
            return Err(BufferError::ClosedPool);
        }
        let mut fail = 0u32;
        let max_fail = self.buffer_number() * GET_FAIL_FACTOR;
        loop {
            let buf = match self.buf_rx.recv().await {
                Ok(buf) => buf,
                Err(_) => return Err(BufferError::ClosedPool),
            };
            if let Some(datum) = self.get_from(buf, &mut fail, max_fail)? {
                return Ok(datum);
            }
            tokio::task::yield_now().await;
        }
    }

    fn get_from(
        &self,
        buf: Arc<Buffer<T>>,
        fail: &mut u32,
        max_fail: u32,
    ) -> Result<Option<T>, BufferError> {
        if self.is_closed() {
            return Err(BufferError::ClosedPool);
        }
        let mut datum = None;
        let mut err = None;
        match buf.get() {
            Ok(Some(value)) => {
                self.total.fetch_sub(1, Ordering::SeqCst);
                datum = Some(value);
            }
            Ok(None) => {
                *fail = fail.saturating_add(1);
            }
            Err(_) => {
                err = Some(BufferError::ClosedPool);
            }
        }
        // A consumer that has missed often enough discards an empty buffer
        // instead of returning it, as long as at least one buffer remains.
        if *fail >= max_fail && buf.is_empty() && self.buffer_number() > 1 {
            buf.close();
            self.buffer_number.fetch_sub(1, Ordering::SeqCst);
            trace!(buffer_number = self.buffer_number(), "buffer pool shrank");
            *fail = 0;
            return match err {
                Some(e) => Err(e),
                None => Ok(datum),
            };
        }
        self.hand_back(buf, &mut err);
        match (datum, err) {
            // Data obtained just as the pool closed: deliver it anyway, the
            // caller's next call will observe the closure.
            (Some(value), _) => Ok(Some(value)),
            (None, Some(e)) => Err(e),
            (None, None) => Ok(None),
        }
    }

    /// Returns a borrowed buffer to the handle channel, or drops it (and its
    /// population slot) when the pool closed in the meantime.
    fn hand_back(&self, buf: Arc<Buffer<T>>, err: &mut Option<BufferError>) {
        let _shared = self.rwlock.read();
        if self.is_closed() {
            self.buffer_number.fetch_sub(1, Ordering::SeqCst);
            *err = Some(BufferError::ClosedPool);
        } else {
            // Channel capacity equals max_buffer_number, so an open pool
            // always has room for a returning handle.
            let _ = self.buf_tx.try_send(buf);
        }
    }

    /// Closes the pool and every buffer still inside it.
    ///
    /// Returns `true` only on the first call. Waiters blocked in `put`/`get`
    /// observe `ClosedPool`.
    pub fn close(&self) -> bool {
        if self
            .closed
            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        let _exclusive = self.rwlock.write();
        while let Ok(Some(buf)) = self.buf_rx.try_recv() {
            buf.close();
        }
        self.buf_tx.close();
        // The data went away with the buffers.
        self.total.store(0, Ordering::SeqCst);
        true
    }

    /// Whether the pool has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) == 1
    }
}
