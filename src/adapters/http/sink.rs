//! Response sink that hands the proxied response to an axum handler.
//!
//! The head travels over a oneshot channel, committed by
//! [`ResponseSink::write_head`]. Body bytes collect in a pending buffer and
//! are sent to the handler as chunks whenever the sink is flushed or the
//! buffer grows past its high-water mark.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::{Bytes, BytesMut};
use hyper::{HeaderMap, StatusCode};
use tokio::io::AsyncWrite;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::PollSender;

use crate::ports::ResponseSink;

/// Pending bytes above which a write pushes a chunk without waiting for a flush
const HIGH_WATER_MARK: usize = 16 * 1024;

/// Status and headers committed by the proxy
#[derive(Debug)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

/// The handler's end of a [`ChannelSink`]
pub struct ChannelResponse {
    pub head: oneshot::Receiver<ResponseHead>,
    pub body: mpsc::Receiver<io::Result<Bytes>>,
}

pub struct ChannelSink {
    headers: HeaderMap,
    head: Option<oneshot::Sender<ResponseHead>>,
    pending: BytesMut,
    body: PollSender<io::Result<Bytes>>,
}

/// Create a sink and its receiving half; `capacity` bounds in-flight body chunks.
pub fn channel(capacity: usize) -> (ChannelSink, ChannelResponse) {
    let (head_tx, head_rx) = oneshot::channel();
    let (body_tx, body_rx) = mpsc::channel(capacity);

    let sink = ChannelSink {
        headers: HeaderMap::new(),
        head: Some(head_tx),
        pending: BytesMut::new(),
        body: PollSender::new(body_tx),
    };
    let response = ChannelResponse {
        head: head_rx,
        body: body_rx,
    };
    (sink, response)
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "client went away")
}

impl ChannelSink {
    fn is_committed(&self) -> bool {
        self.head.is_none()
    }

    /// Send everything pending as one chunk once the channel has room.
    fn poll_drain(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if self.pending.is_empty() {
            return Poll::Ready(Ok(()));
        }
        ready!(self.body.poll_reserve(cx)).map_err(|_| closed())?;
        let chunk = self.pending.split().freeze();
        self.body.send_item(Ok(chunk)).map_err(|_| closed())?;
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for ChannelSink {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if !this.is_committed() {
            return Poll::Ready(Err(io::Error::other("body written before response head")));
        }
        if this.pending.len() >= HIGH_WATER_MARK {
            ready!(this.poll_drain(cx))?;
        }
        this.pending.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().poll_drain(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        this.body.close();
        Poll::Ready(Ok(()))
    }
}

impl ResponseSink for ChannelSink {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_head(&mut self, status: StatusCode) -> io::Result<()> {
        let head = self
            .head
            .take()
            .ok_or_else(|| io::Error::other("response head already written"))?;
        let headers = std::mem::take(&mut self.headers);
        head.send(ResponseHead { status, headers }).map_err(|_| closed())
    }

    fn supports_flush(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::CONTENT_TYPE;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_head_is_committed_once() {
        let (mut sink, response) = channel(4);
        sink.headers_mut()
            .insert(CONTENT_TYPE, "text/plain".parse().unwrap());

        sink.write_head(StatusCode::CREATED).unwrap();
        assert!(sink.write_head(StatusCode::OK).is_err());

        let head = response.head.await.unwrap();
        assert_eq!(head.status, StatusCode::CREATED);
        assert_eq!(head.headers[CONTENT_TYPE], "text/plain");
    }

    #[tokio::test]
    async fn test_body_before_head_is_rejected() {
        let (mut sink, _response) = channel(4);
        assert!(sink.write_all(b"early").await.is_err());
    }

    #[tokio::test]
    async fn test_bytes_wait_for_flush() {
        let (mut sink, mut response) = channel(4);
        sink.write_head(StatusCode::OK).unwrap();

        sink.write_all(b"hel").await.unwrap();
        sink.write_all(b"lo").await.unwrap();
        assert!(response.body.try_recv().is_err());

        sink.flush().await.unwrap();
        let chunk = response.body.recv().await.unwrap().unwrap();
        assert_eq!(&chunk[..], b"hello");
    }

    #[tokio::test]
    async fn test_shutdown_drains_and_ends_body() {
        let (mut sink, mut response) = channel(4);
        sink.write_head(StatusCode::OK).unwrap();
        sink.write_all(b"tail").await.unwrap();
        sink.shutdown().await.unwrap();

        let chunk = response.body.recv().await.unwrap().unwrap();
        assert_eq!(&chunk[..], b"tail");
        assert!(response.body.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_large_writes_stream_without_flush() {
        let (mut sink, mut response) = channel(4);
        sink.write_head(StatusCode::OK).unwrap();

        let block = vec![7u8; HIGH_WATER_MARK];
        sink.write_all(&block).await.unwrap();
        sink.write_all(b"more").await.unwrap();

        let chunk = response.body.recv().await.unwrap().unwrap();
        assert_eq!(chunk.len(), HIGH_WATER_MARK);
    }

    #[tokio::test]
    async fn test_gone_client_is_broken_pipe() {
        let (mut sink, response) = channel(1);
        sink.write_head(StatusCode::OK).unwrap();
        drop(response);

        sink.write_all(b"nobody listens").await.unwrap();
        let err = sink.flush().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
