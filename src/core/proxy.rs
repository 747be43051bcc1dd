use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::TryStreamExt;
use http_body::Body;
use http_body_util::{BodyDataStream, BodyExt};
use hyper::{Request, Response, StatusCode};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::io::StreamReader;

use crate::core::copier::{CopyError, copy_buffer};
use crate::core::director::Director;
use crate::core::headers::{append_forwarded_for, copy_headers, remove_hop_headers};
use crate::core::latency_writer::MaxLatencyWriter;
use crate::core::target::Target;
use crate::metrics::{self, Outcome};
use crate::ports::buffer_pool::BufferLease;
use crate::ports::{BoxError, BufferPool, ProxyBody, ResponseSink, Transport, TransportError};

/// Hook that may rewrite the backend response before it is copied to the caller.
///
/// Returning an error discards the response and fails the exchange as bad gateway.
pub type ModifyResponse =
    Arc<dyn Fn(&mut Response<ProxyBody>) -> Result<(), BoxError> + Send + Sync>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProxyError {
    #[error("Failed to build outbound request: {0}")]
    InvalidRequest(#[from] hyper::http::Error),

    #[error("Backend unreachable: {0}")]
    Transport(#[from] TransportError),

    #[error("Response rewrite failed: {0}")]
    ModifyResponse(#[source] BoxError),

    #[error("Failed to commit response head: {0}")]
    Commit(#[source] io::Error),

    #[error("Response body truncated: {0}")]
    Copy(#[from] CopyError),

    #[error("Failed to stop periodic flushing: {0}")]
    Teardown(#[source] io::Error),
}

impl ProxyError {
    /// Whether the response head already reached the sink.
    ///
    /// After commit the caller may have seen headers and part of the body;
    /// there is nothing left to report in-band.
    pub fn is_committed(&self) -> bool {
        matches!(self, ProxyError::Copy(_) | ProxyError::Teardown(_))
    }

    /// Status a collaborator should answer with when the head was not committed.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::InvalidRequest(_) | ProxyError::Commit(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

/// A completed exchange: the backend status and the body bytes delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Forwarded {
    pub status: StatusCode,
    pub bytes_copied: u64,
}

/// Forwards requests for one route to its backend.
pub struct ReverseProxy {
    director: Director,
    transport: Arc<dyn Transport>,
    flush_interval: Duration,
    buffer_pool: Option<Arc<dyn BufferPool>>,
    modify_response: Option<ModifyResponse>,
    label: String,
}

impl ReverseProxy {
    pub fn builder(target: Target, transport: Arc<dyn Transport>) -> ReverseProxyBuilder {
        ReverseProxyBuilder {
            target,
            transport,
            flush_interval: Duration::ZERO,
            buffer_pool: None,
            modify_response: None,
        }
    }

    pub fn target(&self) -> &Target {
        self.director.target()
    }

    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    /// Run one exchange: rewrite `req`, dispatch it, and stream the answer into `sink`.
    ///
    /// `sink` receives its head at most once. When this returns an error for
    /// which [`ProxyError::is_committed`] is false, nothing was written to it.
    pub async fn forward<B, S>(
        &self,
        req: Request<B>,
        remote_addr: Option<SocketAddr>,
        mut sink: S,
    ) -> Result<Forwarded, ProxyError>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
        S: ResponseSink,
    {
        let (parts, body) = req.into_parts();
        let mut outbound: Request<ProxyBody> =
            Request::from_parts(parts, body.map_err(Into::into).boxed_unsync());

        if let Err(err) = self.director.direct(&mut outbound) {
            tracing::error!("Failed to rewrite request for {}: {}", self.label, err);
            metrics::record_exchange(&self.label, Outcome::InvalidRequest);
            return Err(err.into());
        }
        remove_hop_headers(outbound.headers_mut());
        if let Some(addr) = remote_addr {
            append_forwarded_for(outbound.headers_mut(), addr.ip());
        }

        tracing::debug!(
            method = %outbound.method(),
            uri = %outbound.uri(),
            "Forwarding request to backend"
        );

        let dispatched_at = Instant::now();
        let mut response = match self.transport.round_trip(outbound).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!("Proxy request to {} failed: {}", self.label, err);
                metrics::record_exchange(&self.label, Outcome::Unreachable);
                return Err(err.into());
            }
        };
        metrics::record_backend_response(
            &self.label,
            response.status().as_u16(),
            dispatched_at.elapsed(),
        );

        if let Some(modify) = &self.modify_response {
            if let Err(err) = modify(&mut response) {
                tracing::error!("Response rewrite for {} failed: {}", self.label, err);
                metrics::record_exchange(&self.label, Outcome::Rejected);
                return Err(ProxyError::ModifyResponse(err));
            }
        }

        let (mut parts, body) = response.into_parts();
        remove_hop_headers(&mut parts.headers);
        copy_headers(sink.headers_mut(), &parts.headers);
        sink.write_head(parts.status).map_err(ProxyError::Commit)?;

        let chunks = TryStreamExt::map_err(BodyDataStream::new(body), io::Error::other);
        let mut reader = StreamReader::new(chunks);

        let (sink, copied) = if !self.flush_interval.is_zero() && sink.supports_flush() {
            let mut writer = MaxLatencyWriter::new(sink, self.flush_interval);
            let copied = self.copy_response(&mut writer, &mut reader).await;
            (writer.stop().await, copied)
        } else {
            let copied = self.copy_response(&mut sink, &mut reader).await;
            (Ok(sink), copied)
        };

        let teardown = match sink {
            Ok(mut sink) => {
                if let Err(err) = sink.shutdown().await {
                    tracing::warn!("Failed to finish response body for {}: {}", self.label, err);
                }
                None
            }
            Err(err) => {
                tracing::error!("Failed to stop periodic flushing for {}: {}", self.label, err);
                Some(err)
            }
        };

        let bytes_copied = match &copied {
            Ok(bytes) => *bytes,
            Err(err) => err.written(),
        };
        metrics::record_streamed_bytes(&self.label, bytes_copied);

        match (copied, teardown) {
            (Ok(bytes_copied), None) => {
                metrics::record_exchange(&self.label, Outcome::Completed);
                Ok(Forwarded {
                    status: parts.status,
                    bytes_copied,
                })
            }
            (Err(err), _) => {
                metrics::record_exchange(&self.label, Outcome::Truncated);
                Err(err.into())
            }
            (Ok(_), Some(err)) => {
                metrics::record_exchange(&self.label, Outcome::Truncated);
                Err(ProxyError::Teardown(err))
            }
        }
    }

    async fn copy_response<R, W>(&self, dst: &mut W, src: &mut R) -> Result<u64, CopyError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lease = BufferLease::acquire(self.buffer_pool.as_deref());
        copy_buffer(dst, src, lease.as_mut_slice()).await
    }
}

/// Builder for [`ReverseProxy`]
pub struct ReverseProxyBuilder {
    target: Target,
    transport: Arc<dyn Transport>,
    flush_interval: Duration,
    buffer_pool: Option<Arc<dyn BufferPool>>,
    modify_response: Option<ModifyResponse>,
}

impl ReverseProxyBuilder {
    /// Flush the caller at least this often while streaming; zero disables.
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn buffer_pool(mut self, pool: Arc<dyn BufferPool>) -> Self {
        self.buffer_pool = Some(pool);
        self
    }

    pub fn modify_response<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Response<ProxyBody>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.modify_response = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> ReverseProxy {
        let label = self.target.authority().to_string();
        ReverseProxy {
            director: Director::new(self.target),
            transport: self.transport,
            flush_interval: self.flush_interval,
            buffer_pool: self.buffer_pool,
            modify_response: self.modify_response,
            label,
        }
    }
}
