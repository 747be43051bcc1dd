use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use anyhow::{Context, anyhow};
use axum::Router;
use axum::body::Body as AxumBody;
use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::response::{IntoResponse, Response as AxumResponse};
use bytes::Bytes;
use futures_util::Stream;
use hyper::StatusCode;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::task::AbortOnDropHandle;
use tower_http::trace::TraceLayer;

use crate::adapters::http::sink::{self, ChannelResponse};
use crate::core::{Forwarded, ProxyError, ReverseProxy};
use crate::ports::http_server::{HttpServer, ServerRunFuture};

/// Body chunks buffered between the proxy task and the client connection
const BODY_CHANNEL_CAPACITY: usize = 16;

/// Serves one route: every request on the listener is forwarded to its backend.
pub struct HyperServer {
    listen_addr: SocketAddr,
    proxy: Arc<ReverseProxy>,
}

impl HyperServer {
    pub fn new(listen_addr: SocketAddr, proxy: Arc<ReverseProxy>) -> Self {
        Self { listen_addr, proxy }
    }

    pub fn build_app(&self) -> Router {
        Router::new()
            .fallback(forward_request)
            .with_state(self.proxy.clone())
            .layer(TraceLayer::new_for_http())
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.build_app();
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| anyhow!("HTTP Server error: {}", e))
    }
}

impl HttpServer for HyperServer {
    fn run<'a>(&'a self) -> ServerRunFuture<'a> {
        Box::pin(async move {
            let listener = TcpListener::bind(self.listen_addr)
                .await
                .with_context(|| format!("Failed to bind to address: {}", self.listen_addr))?;

            tracing::info!(
                "Forwarding {} to {}",
                self.listen_addr,
                self.proxy.target()
            );
            self.serve(listener, shutdown_signal()).await?;

            tracing::info!("Server on {} stopped", self.listen_addr);
            Ok(())
        })
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections");
}

/// Response body that owns the exchange task.
///
/// Dropping it (the client went away) aborts the exchange, which releases the
/// backend connection and the copy buffer.
struct ExchangeBody {
    chunks: mpsc::Receiver<io::Result<Bytes>>,
    _exchange: AbortOnDropHandle<Result<Forwarded, ProxyError>>,
}

impl Stream for ExchangeBody {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().chunks.poll_recv(cx)
    }
}

/// Run the exchange on its own task and answer as soon as the head is committed.
async fn forward_request(
    State(proxy): State<Arc<ReverseProxy>>,
    req: Request<AxumBody>,
) -> AxumResponse {
    let remote_addr = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let (sink, ChannelResponse { head, body }) = sink::channel(BODY_CHANNEL_CAPACITY);

    let exchange = AbortOnDropHandle::new(tokio::spawn(async move {
        let result = proxy.forward(req, remote_addr, sink).await;
        if let Err(err) = &result {
            if err.is_committed() {
                tracing::warn!("Response to {:?} ended early: {}", remote_addr, err);
            }
        }
        result
    }));

    match head.await {
        Ok(head) => {
            let stream = ExchangeBody {
                chunks: body,
                _exchange: exchange,
            };
            let mut response = AxumResponse::new(AxumBody::from_stream(stream));
            *response.status_mut() = head.status;
            *response.headers_mut() = head.headers;
            response
        }
        // The sink was dropped uncommitted, so the exchange failed before the head.
        Err(_) => match exchange.await {
            Ok(Err(err)) => err.status_code().into_response(),
            Ok(Ok(forwarded)) => {
                tracing::error!("Exchange finished without a response head: {:?}", forwarded);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
            Err(err) => {
                tracing::error!("Proxy task failed: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
    }
}
