pub mod buffer_pool;
pub mod http_server;
pub mod response_sink;
pub mod transport;

pub use buffer_pool::BufferPool;
pub use http_server::{HttpServer, ServerRunFuture};
pub use response_sink::ResponseSink;
pub use transport::{BoxError, ProxyBody, Transport, TransportError, TransportFuture, TransportResult};
