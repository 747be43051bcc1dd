use hyper::{HeaderMap, StatusCode};
use tokio::io::AsyncWrite;

/// ResponseSink defines the port through which the proxy answers the original caller.
///
/// The head (headers, then status) is committed exactly once through
/// [`ResponseSink::write_head`]; body bytes are written through [`AsyncWrite`]
/// afterwards.
pub trait ResponseSink: AsyncWrite + Send + Unpin + 'static {
    /// Headers that will be sent with the response head
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Commit the status code and the current headers.
    ///
    /// Calling this a second time is an error.
    fn write_head(&mut self, status: StatusCode) -> std::io::Result<()>;

    /// Whether `poll_flush` pushes buffered bytes to the caller.
    ///
    /// Periodic flushing is only arranged for sinks that report `true`.
    fn supports_flush(&self) -> bool {
        false
    }
}
