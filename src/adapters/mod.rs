pub mod buffer_pool;
pub mod http;
pub mod route;
pub mod tls;
pub mod transport;

pub use buffer_pool::SharedBufferPool;
pub use http::HyperServer;
pub use route::{RouteError, build_proxy};
pub use tls::TlsConnector;
pub use transport::{HyperTransport, select_transport};
