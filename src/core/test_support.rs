//! Instrumented collaborators shared by the unit tests.

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{HeaderMap, Method, Request, Response, StatusCode, Uri};
use tokio::io::AsyncWrite;
use tokio::time::Instant;

use crate::ports::{BufferPool, ProxyBody, ResponseSink, Transport, TransportError, TransportFuture};

#[derive(Default)]
pub struct SinkState {
    pub headers: HeaderMap,
    pub status: Option<StatusCode>,
    pub head_writes: usize,
    pub body: Vec<u8>,
    pub flushes: Vec<Instant>,
    pub shut_down: bool,
}

/// Sink that records everything written to it; clones of `state()` stay readable
/// after the sink has been moved into the proxy.
pub struct RecordingSink {
    state: Arc<Mutex<SinkState>>,
    headers: HeaderMap,
    flushable: bool,
    panic_on_flush: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SinkState::default())),
            headers: HeaderMap::new(),
            flushable: true,
            panic_on_flush: false,
        }
    }

    pub fn without_flush() -> Self {
        Self {
            flushable: false,
            ..Self::new()
        }
    }

    /// A sink whose flush panics, taking the periodic flush task down with it.
    pub fn panicking_on_flush() -> Self {
        Self {
            panic_on_flush: true,
            ..Self::new()
        }
    }

    pub fn state(&self) -> Arc<Mutex<SinkState>> {
        Arc::clone(&self.state)
    }
}

impl AsyncWrite for RecordingSink {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.state.lock().unwrap().body.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if self.panic_on_flush {
            panic!("flush exploded");
        }
        self.state.lock().unwrap().flushes.push(Instant::now());
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.state.lock().unwrap().shut_down = true;
        Poll::Ready(Ok(()))
    }
}

impl ResponseSink for RecordingSink {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_head(&mut self, status: StatusCode) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.head_writes += 1;
        state.status = Some(status);
        state.headers = self.headers.clone();
        Ok(())
    }

    fn supports_flush(&self) -> bool {
        self.flushable
    }
}

/// Pool that hands out fixed-size buffers and counts checkouts and returns.
#[derive(Default)]
pub struct CountingPool {
    pub gets: AtomicUsize,
    pub puts: AtomicUsize,
}

impl CountingPool {
    pub fn outstanding(&self) -> isize {
        self.gets.load(Ordering::SeqCst) as isize - self.puts.load(Ordering::SeqCst) as isize
    }
}

impl BufferPool for CountingPool {
    fn get(&self) -> Vec<u8> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        vec![0u8; 4]
    }

    fn put(&self, buf: Vec<u8>) {
        assert_eq!(buf.len(), 4);
        self.puts.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
}

type Responder = Box<dyn Fn() -> Result<Response<ProxyBody>, TransportError> + Send + Sync>;

/// Transport that records the outbound request and answers from a closure.
pub struct StubTransport {
    pub seen: Mutex<Option<SeenRequest>>,
    respond: Responder,
}

impl StubTransport {
    pub fn new(
        respond: impl Fn() -> Result<Response<ProxyBody>, TransportError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            seen: Mutex::new(None),
            respond: Box::new(respond),
        }
    }

    pub fn replying(status: StatusCode, headers: &[(&'static str, &'static str)], body: &'static str) -> Self {
        let headers: Vec<(&'static str, &'static str)> = headers.to_vec();
        Self::new(move || {
            let mut builder = Response::builder().status(status);
            for (name, value) in &headers {
                builder = builder.header(*name, *value);
            }
            Ok(builder.body(full_body(body)).unwrap())
        })
    }

    pub fn seen(&self) -> SeenRequest {
        self.seen.lock().unwrap().clone().expect("no request reached the transport")
    }
}

impl Transport for StubTransport {
    fn round_trip<'a>(&'a self, req: Request<ProxyBody>) -> TransportFuture<'a> {
        *self.seen.lock().unwrap() = Some(SeenRequest {
            method: req.method().clone(),
            uri: req.uri().clone(),
            headers: req.headers().clone(),
        });
        let result = (self.respond)();
        Box::pin(async move { result })
    }
}

pub fn full_body(body: impl Into<Bytes>) -> ProxyBody {
    Full::new(body.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}
