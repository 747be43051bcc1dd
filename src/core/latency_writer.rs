//! Writer wrapper that bounds how long written bytes may sit unflushed.
//!
//! The destination lives behind a mutex shared with one background task. Each
//! `poll_write` and each timer-driven `poll_flush` holds that mutex for its
//! whole duration, so a flush never observes half of a write.

use std::future::poll_fn;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::AsyncWrite;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

struct Flusher {
    done: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

pub struct MaxLatencyWriter<W> {
    dst: Arc<Mutex<W>>,
    latency: Duration,
    flusher: Option<Flusher>,
}

impl<W> MaxLatencyWriter<W>
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    /// Wrap `dst`, flushing it at least every `latency` until [`stop`](Self::stop).
    ///
    /// A zero `latency` starts no task; writes pass straight through.
    /// Must be called from within a Tokio runtime.
    pub fn new(dst: W, latency: Duration) -> Self {
        let dst = Arc::new(Mutex::new(dst));
        let flusher = (!latency.is_zero()).then(|| {
            let (done, done_rx) = oneshot::channel();
            let handle = tokio::spawn(flush_loop(Arc::clone(&dst), latency, done_rx));
            Flusher { done, handle }
        });

        Self {
            dst,
            latency,
            flusher,
        }
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// Stop the flush task, wait for it to exit and hand back the destination.
    pub async fn stop(mut self) -> io::Result<W> {
        if let Some(Flusher { done, handle }) = self.flusher.take() {
            // The task may already be gone if it panicked; the join reports that.
            let _ = done.send(());
            handle.await.map_err(io::Error::other)?;
        }

        let dst = Arc::try_unwrap(self.dst)
            .map_err(|_| io::Error::other("flush destination is still shared"))?;
        Ok(dst.into_inner().unwrap_or_else(PoisonError::into_inner))
    }

    fn lock(&self) -> MutexGuard<'_, W> {
        self.dst.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn flush_loop<W>(dst: Arc<Mutex<W>>, latency: Duration, mut done: oneshot::Receiver<()>)
where
    W: AsyncWrite + Send + Unpin,
{
    let mut ticker = tokio::time::interval(latency);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; nothing has been written yet.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = &mut done => {
                tracing::trace!("Flush loop stopped");
                return;
            }
            _ = ticker.tick() => {
                let flushed = poll_fn(|cx| {
                    let mut dst = dst.lock().unwrap_or_else(PoisonError::into_inner);
                    Pin::new(&mut *dst).poll_flush(cx)
                })
                .await;
                if let Err(err) = flushed {
                    tracing::warn!("Periodic flush to client failed: {}", err);
                }
            }
        }
    }
}

impl<W> AsyncWrite for MaxLatencyWriter<W>
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let mut dst = self.lock();
        Pin::new(&mut *dst).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let mut dst = self.lock();
        Pin::new(&mut *dst).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let mut dst = self.lock();
        Pin::new(&mut *dst).poll_shutdown(cx)
    }
}
