//! Shared scratch-buffer pool backed by `object-pool`.

use object_pool::Pool;

use crate::ports::BufferPool;

/// A fixed-size buffer pool shared by every exchange on a route.
///
/// Buffers are handed out at full length so the copier can read straight into
/// them. Buffers returned with a different length are dropped instead of being
/// recycled, and the pool never retains more than `capacity` idle buffers.
pub struct SharedBufferPool {
    pool: Pool<Vec<u8>>,
    capacity: usize,
    buffer_size: usize,
}

impl SharedBufferPool {
    pub fn new(capacity: usize, buffer_size: usize) -> Self {
        Self {
            pool: Pool::new(capacity, move || vec![0u8; buffer_size]),
            capacity,
            buffer_size,
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Number of buffers currently idle in the pool
    pub fn idle(&self) -> usize {
        self.pool.len()
    }
}

impl BufferPool for SharedBufferPool {
    fn get(&self) -> Vec<u8> {
        let size = self.buffer_size;
        let (_, buf) = self.pool.pull(|| vec![0u8; size]).detach();
        buf
    }

    fn put(&self, buf: Vec<u8>) {
        if buf.len() != self.buffer_size {
            tracing::debug!(
                "Dropping foreign buffer of {} bytes (pool size {})",
                buf.len(),
                self.buffer_size
            );
            return;
        }
        if self.pool.len() < self.capacity {
            self.pool.attach(buf);
        }
    }
}

impl std::fmt::Debug for SharedBufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedBufferPool")
            .field("capacity", &self.capacity)
            .field("buffer_size", &self.buffer_size)
            .field("idle", &self.pool.len())
            .finish()
    }
}
