use anyhow::Result;
use std::future::Future;
use std::pin::Pin;

/// Type alias for HTTP server run futures
pub type ServerRunFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// HttpServer defines the port (interface) for accepting callers and handing them to the proxy
pub trait HttpServer: Send + Sync + 'static {
    /// Run the HTTP server
    ///
    /// # Returns
    /// A future that resolves when the server shuts down or encounters an error
    fn run<'a>(&'a self) -> ServerRunFuture<'a>;
}
