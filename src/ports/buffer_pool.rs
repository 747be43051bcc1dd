/// BufferPool defines the port for scratch buffers used by body copies.
///
/// Implementations must be safe for concurrent checkout and return from
/// multiple simultaneous exchanges.
pub trait BufferPool: Send + Sync + 'static {
    /// Check out a buffer. An empty buffer means "let the copier allocate".
    fn get(&self) -> Vec<u8>;

    /// Return a buffer previously obtained from [`BufferPool::get`].
    fn put(&self, buf: Vec<u8>);
}

/// Scoped checkout of a pool buffer, returned to the pool on drop.
pub(crate) struct BufferLease<'a> {
    pool: Option<&'a dyn BufferPool>,
    buf: Vec<u8>,
}

impl<'a> BufferLease<'a> {
    pub(crate) fn acquire(pool: Option<&'a dyn BufferPool>) -> Self {
        let buf = pool.map(|pool| pool.get()).unwrap_or_default();
        Self { pool, buf }
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

impl Drop for BufferLease<'_> {
    fn drop(&mut self) {
        if let Some(pool) = self.pool {
            pool.put(std::mem::take(&mut self.buf));
        }
    }
}
