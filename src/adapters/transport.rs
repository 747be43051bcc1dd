use std::error::Error as StdError;
use std::io;
use std::sync::Arc;

use http_body_util::BodyExt;
use hyper::{Request, Version};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::{Connect, HttpConnector};
use hyper_util::rt::TokioExecutor;

use crate::adapters::tls::TlsConnector;
use crate::config::BackendTrust;
use crate::core::Target;
use crate::ports::{BoxError, ProxyBody, Transport, TransportError, TransportFuture};

/// Pooled HTTP/1.1 client over a plain or TLS connector
pub struct HyperTransport<C> {
    client: Client<C, ProxyBody>,
}

impl HyperTransport<HttpConnector> {
    /// Keep-alive transport for `http` backends
    pub fn plain() -> Self {
        let mut connector = HttpConnector::new();
        connector.set_nodelay(true);
        let client = Client::builder(TokioExecutor::new()).build(connector);

        tracing::info!("Created plain HTTP backend transport");
        Self { client }
    }
}

impl HyperTransport<TlsConnector> {
    /// Transport that dials backends through [`TlsConnector`]
    pub fn tls(trust: BackendTrust) -> Result<Self, TransportError> {
        let connector = TlsConnector::new(trust)?;
        let client = Client::builder(TokioExecutor::new()).build(connector);

        tracing::info!("Created TLS backend transport (trust: {:?})", trust);
        Ok(Self { client })
    }
}

impl<C> Transport for HyperTransport<C>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    fn round_trip<'a>(&'a self, mut req: Request<ProxyBody>) -> TransportFuture<'a> {
        *req.version_mut() = Version::HTTP_11;

        Box::pin(async move {
            let method = req.method().clone();
            let uri = req.uri().clone();
            tracing::debug!("Sending request: {} {}", method, uri);

            match self.client.request(req).await {
                Ok(response) => {
                    tracing::debug!(
                        "Received response from {} {}: status={}",
                        method,
                        uri,
                        response.status()
                    );
                    Ok(response.map(|body| body.map_err(BoxError::from).boxed_unsync()))
                }
                Err(err) => {
                    tracing::error!("Error making request to {} {}: {}", method, uri, err);
                    Err(classify(&uri, err))
                }
            }
        })
    }
}

/// Pick the transport for a target: pooled plain HTTP for `http`, TLS otherwise.
pub fn select_transport(
    target: &Target,
    trust: BackendTrust,
) -> Result<Arc<dyn Transport>, TransportError> {
    if target.is_tls() {
        Ok(Arc::new(HyperTransport::tls(trust)?))
    } else {
        Ok(Arc::new(HyperTransport::plain()))
    }
}

/// Surface the connector's own error for failed dials.
fn classify(uri: &hyper::Uri, err: hyper_util::client::legacy::Error) -> TransportError {
    if !err.is_connect() {
        return TransportError::Request(Box::new(err));
    }

    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(dial) = cause.downcast_ref::<TransportError>() {
            return rebuild(dial);
        }
        source = cause.source();
    }

    TransportError::Connect {
        addr: uri.authority().map(|a| a.to_string()).unwrap_or_default(),
        source: io::Error::other(err),
    }
}

fn rebuild(err: &TransportError) -> TransportError {
    match err {
        TransportError::Connect { addr, source } => TransportError::Connect {
            addr: addr.clone(),
            source: io::Error::new(source.kind(), source.to_string()),
        },
        TransportError::Handshake { host, source } => TransportError::Handshake {
            host: host.clone(),
            source: io::Error::new(source.kind(), source.to_string()),
        },
        TransportError::Untrusted { host, reason } => TransportError::Untrusted {
            host: host.clone(),
            reason: reason.clone(),
        },
        TransportError::InvalidAddress(addr) => TransportError::InvalidAddress(addr.clone()),
        TransportError::Config(message) => TransportError::Config(message.clone()),
        TransportError::Request(source) => TransportError::Request(source.to_string().into()),
    }
}
