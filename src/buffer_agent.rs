//! Background producer feeding a ring buffer from a random engine.
//!
//! The producer thread owns the engine. It generates into a scratch chunk
//! without holding the lock, so consumers keep reading while it works, then
//! publishes the chunk into the ring. Consumers read through `&self`, so one
//! agent can serve any number of threads; each request is served as one
//! contiguous run of the engine stream.

use crate::{engine::RandomEngine, CryptoRandomError};
use std::{
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread::{self, JoinHandle},
    time::Duration,
};
use tracing::{debug, error, trace};
use zeroize::{Zeroize, Zeroizing};

/// Largest amount generated by the producer in one go
const MAX_CHUNK: usize = 16 * 1024;
/// How long the producer sleeps on a full ring before checking for shutdown
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Unread bytes are `len` bytes starting at `read`, wrapping around.
struct Ring {
    buf: Vec<u8>,
    read: usize,
    len: usize,
    stopped: bool,
}

impl Ring {
    fn free(&self) -> usize {
        self.buf.len() - self.len
    }

    /// Append `data`, which must fit in the free space
    fn push(&mut self, data: &[u8]) {
        debug_assert!(data.len() <= self.free());
        let capacity = self.buf.len();
        let write = (self.read + self.len) % capacity;
        let first = data.len().min(capacity - write);
        self.buf[write..write + first].copy_from_slice(&data[..first]);
        self.buf[..data.len() - first].copy_from_slice(&data[first..]);
        self.len += data.len();
    }

    /// Move up to `dest.len()` unread bytes out, returning how many
    fn pop(&mut self, dest: &mut [u8]) -> usize {
        let capacity = self.buf.len();
        let n = dest.len().min(self.len);
        let first = n.min(capacity - self.read);
        dest[..first].copy_from_slice(&self.buf[self.read..self.read + first]);
        self.buf[self.read..self.read + first].zeroize();
        dest[first..n].copy_from_slice(&self.buf[..n - first]);
        self.buf[..n - first].zeroize();
        self.read = (self.read + n) % capacity;
        self.len -= n;
        n
    }
}

impl Drop for Ring {
    fn drop(&mut self) {
        self.buf.zeroize();
    }
}

struct Shared {
    ring: Mutex<Ring>,
    data_available: Condvar,
    space_available: Condvar,
    /// Serializes consumers so that a request is never split across another
    consumers: Mutex<()>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Ring> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Decorator running a random engine on its own thread.
///
/// The bytes handed out are exactly the stream of the wrapped engine, in
/// order; only the timing of their generation changes.
pub struct RandomBufferAgent {
    shared: Arc<Shared>,
    producer: Option<JoinHandle<()>>,
    buffer_size: usize,
}

impl RandomBufferAgent {
    /// Move `engine` to a new producer thread filling a ring of
    /// `buffer_size` bytes.
    ///
    /// If the agent cannot be built, the engine is dropped.
    ///
    /// The ring is reserved with `try_reserve_exact`, so only a refused
    /// reservation is reported as `OutOfMemory`. The ring is then zero
    /// filled, which touches every page: on a kernel that overcommits
    /// memory, a `buffer_size` larger than the available memory is more
    /// likely to get the process killed than to return an error.
    pub fn new<E>(engine: E, buffer_size: usize) -> Result<Self, CryptoRandomError>
    where
        E: RandomEngine + 'static,
    {
        if buffer_size == 0 {
            return Err(CryptoRandomError::OtherConstructionError(
                "the buffer size of a random buffer agent must be positive".to_string(),
            ));
        }
        let mut buf = Vec::new();
        buf.try_reserve_exact(buffer_size)?;
        buf.resize(buffer_size, 0);
        let chunk_size = buffer_size.min(MAX_CHUNK);
        let mut scratch = Vec::new();
        scratch.try_reserve_exact(chunk_size)?;
        scratch.resize(chunk_size, 0);

        let shared = Arc::new(Shared {
            ring: Mutex::new(Ring {
                buf,
                read: 0,
                len: 0,
                stopped: false,
            }),
            data_available: Condvar::new(),
            space_available: Condvar::new(),
            consumers: Mutex::new(()),
        });

        let producer_shared = shared.clone();
        let producer = thread::Builder::new()
            .name("random-buffer-agent".to_string())
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    produce(engine, &producer_shared, Zeroizing::new(scratch));
                }));
                if result.is_err() {
                    // consumers would wait forever on a dead producer
                    error!("random buffer agent: producer thread panicked");
                    std::process::abort();
                }
            })
            .map_err(|e| {
                CryptoRandomError::OtherConstructionError(format!(
                    "failed to spawn the random buffer agent thread: {e}"
                ))
            })?;
        debug!("random buffer agent started with a {buffer_size} byte ring");

        Ok(Self {
            shared,
            producer: Some(producer),
            buffer_size,
        })
    }

    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Fill `dest` with the next bytes of the stream, waiting for the
    /// producer if the ring does not hold enough of them.
    pub fn fill_bytes(&self, dest: &mut [u8]) {
        if dest.is_empty() {
            return;
        }
        let _consumer = self
            .shared
            .consumers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut ring = self.shared.lock();
        let mut filled = 0;
        loop {
            let n = ring.pop(&mut dest[filled..]);
            filled += n;
            if n > 0 {
                self.shared.space_available.notify_one();
            }
            if filled == dest.len() {
                return;
            }
            ring = self
                .shared
                .data_available
                .wait(ring)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

fn produce<E: RandomEngine>(mut engine: E, shared: &Shared, mut scratch: Zeroizing<Vec<u8>>) {
    loop {
        let size = {
            let mut ring = shared.lock();
            loop {
                if ring.stopped {
                    return;
                }
                let free = ring.free();
                if free > 0 {
                    break free.min(scratch.len());
                }
                ring = shared
                    .space_available
                    .wait_timeout(ring, STOP_CHECK_INTERVAL)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0;
            }
        };
        trace!("random buffer agent: generating {size} bytes");
        engine.fill_bytes(&mut scratch[..size]);

        // only this thread adds data, so the free space has not shrunk
        let mut ring = shared.lock();
        if ring.stopped {
            return;
        }
        ring.push(&scratch[..size]);
        drop(ring);
        shared.data_available.notify_all();
    }
}

impl RandomEngine for RandomBufferAgent {
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        RandomBufferAgent::fill_bytes(self, dest);
    }
}

impl Drop for RandomBufferAgent {
    fn drop(&mut self) {
        self.shared.lock().stopped = true;
        self.shared.space_available.notify_all();
        if let Some(producer) = self.producer.take() {
            if producer.join().is_err() {
                error!("random buffer agent: producer thread could not be joined");
            }
        }
        debug!("random buffer agent stopped");
    }
}

impl std::fmt::Debug for RandomBufferAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomBufferAgent")
            .field("buffer_size", &self.buffer_size)
            .finish_non_exhaustive()
    }
}
