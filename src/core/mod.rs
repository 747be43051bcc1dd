pub mod copier;
pub mod director;
pub mod headers;
pub mod latency_writer;
pub mod proxy;
pub mod target;

#[cfg(test)]
pub(crate) mod test_support;

pub use copier::{CopyError, DEFAULT_BUFFER_SIZE, copy_buffer};
pub use director::Director;
pub use latency_writer::MaxLatencyWriter;
pub use proxy::{Forwarded, ModifyResponse, ProxyError, ReverseProxy, ReverseProxyBuilder};
pub use target::{Target, TargetError};
