//! TLS dialing for HTTPS backends.
//!
//! The connector opens the TCP connection itself, runs the handshake with the
//! host taken from the dialed URI, and then checks the leaf certificate's
//! hostname explicitly before handing the stream to the HTTP client. With
//! [`BackendTrust::LeafHostname`] the certificate chain is not verified at all;
//! only handshake signatures and the leaf hostname are.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use hyper::Uri;
use hyper::rt::{Read, ReadBufCursor, Write};
use hyper_util::client::legacy::connect::{Connected, Connection};
use hyper_util::rt::TokioIo;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, aws_lc_rs};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, ClientConnection, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

use crate::config::BackendTrust;
use crate::ports::TransportError;

const DEFAULT_HTTPS_PORT: u16 = 443;

/// Accepts any certificate chain while still checking handshake signatures.
///
/// Identity is established afterwards by [`verify_leaf_hostname`].
#[derive(Debug)]
struct LeafOnlyVerifier {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for LeafOnlyVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Build the rustls client configuration for a trust policy.
pub fn client_config(trust: BackendTrust) -> Result<Arc<ClientConfig>, TransportError> {
    let provider = Arc::new(aws_lc_rs::default_provider());
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| TransportError::Config(e.to_string()))?;

    let mut config = match trust {
        BackendTrust::LeafHostname => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(LeafOnlyVerifier { provider }))
            .with_no_client_auth(),
        BackendTrust::NativeRoots => {
            let mut roots = RootCertStore::empty();
            let certs = rustls_native_certs::load_native_certs().map_err(|e| {
                TransportError::Config(format!("Failed to load native root certificates: {}", e))
            })?;
            let (added, ignored) = roots.add_parsable_certificates(certs);
            tracing::info!(
                "Loaded {} native root certificates ({} ignored)",
                added,
                ignored
            );
            builder.with_root_certificates(roots).with_no_client_auth()
        }
    };
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

/// Check that the peer's leaf certificate is valid for `server_name`.
fn verify_leaf_hostname(conn: &ClientConnection, server_name: &ServerName<'_>) -> Result<(), String> {
    let leaf = conn
        .peer_certificates()
        .and_then(|chain| chain.first())
        .ok_or_else(|| "backend presented no certificate".to_string())?;
    let cert = webpki::EndEntityCert::try_from(leaf)
        .map_err(|e| format!("unparseable leaf certificate: {}", e))?;
    cert.verify_is_valid_for_subject_name(server_name)
        .map_err(|e| format!("leaf certificate is not valid for {}: {}", server_name.to_str(), e))
}

/// Connector handed to the HTTP client for TLS backends.
#[derive(Clone)]
pub struct TlsConnector {
    connector: tokio_rustls::TlsConnector,
}

impl TlsConnector {
    pub fn new(trust: BackendTrust) -> Result<Self, TransportError> {
        Ok(Self::from_config(client_config(trust)?))
    }

    pub fn from_config(config: Arc<ClientConfig>) -> Self {
        Self {
            connector: tokio_rustls::TlsConnector::from(config),
        }
    }

    /// Open a TCP connection, negotiate TLS and verify the leaf hostname.
    pub async fn dial(&self, uri: &Uri) -> Result<BackendStream, TransportError> {
        let host = uri
            .host()
            .map(|host| host.trim_start_matches('[').trim_end_matches(']'))
            .filter(|host| !host.is_empty())
            .ok_or_else(|| TransportError::InvalidAddress(uri.to_string()))?;
        let port = uri.port_u16().unwrap_or(DEFAULT_HTTPS_PORT);
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| TransportError::InvalidAddress(host.to_string()))?;

        let tcp = TcpStream::connect((host, port))
            .await
            .map_err(|source| TransportError::Connect {
                addr: format!("{}:{}", host, port),
                source,
            })?;
        if let Err(err) = tcp.set_nodelay(true) {
            tracing::debug!("Failed to set TCP_NODELAY for {}: {}", host, err);
        }

        let mut tls = self
            .connector
            .connect(server_name.clone(), tcp)
            .await
            .map_err(|source| TransportError::Handshake {
                host: host.to_string(),
                source,
            })?;

        let (_, session) = tls.get_ref();
        if let Err(reason) = verify_leaf_hostname(session, &server_name) {
            tracing::warn!("Rejecting backend {}: {}", host, reason);
            if let Err(err) = tls.shutdown().await {
                tracing::debug!("Failed to close rejected connection to {}: {}", host, err);
            }
            return Err(TransportError::Untrusted {
                host: host.to_string(),
                reason,
            });
        }

        tracing::debug!("TLS session established with {}:{}", host, port);
        Ok(BackendStream(TokioIo::new(tls)))
    }
}

impl tower::Service<Uri> for TlsConnector {
    type Response = BackendStream;
    type Error = TransportError;
    type Future = Pin<Box<dyn Future<Output = Result<BackendStream, TransportError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let connector = self.clone();
        Box::pin(async move { connector.dial(&dst).await })
    }
}

/// A verified TLS connection to a backend.
pub struct BackendStream(TokioIo<TlsStream<TcpStream>>);

impl Connection for BackendStream {
    fn connected(&self) -> Connected {
        let (tcp, _) = self.0.inner().get_ref();
        tcp.connected()
    }
}

impl Read for BackendStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_read(cx, buf)
    }
}

impl Write for BackendStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.0).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_shutdown(cx)
    }

    fn is_write_vectored(&self) -> bool {
        self.0.is_write_vectored()
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.0).poll_write_vectored(cx, bufs)
    }
}
