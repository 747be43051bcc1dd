use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Buffer size used when the caller supplies no buffer of its own.
pub const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

/// Terminal condition of a body copy that did not reach end-of-stream.
///
/// Every variant carries the number of bytes already delivered to the writer;
/// those bytes are never rolled back.
#[derive(Error, Debug)]
pub enum CopyError {
    #[error("Short write after {written} bytes")]
    ShortWrite { written: u64 },

    #[error("Write failed after {written} bytes: {source}")]
    Write {
        written: u64,
        #[source]
        source: io::Error,
    },

    #[error("Read failed after {written} bytes: {source}")]
    Read {
        written: u64,
        #[source]
        source: io::Error,
    },
}

impl CopyError {
    pub fn written(&self) -> u64 {
        match self {
            CopyError::ShortWrite { written }
            | CopyError::Write { written, .. }
            | CopyError::Read { written, .. } => *written,
        }
    }
}

/// Copy `src` into `dst` until end-of-stream through `buf`.
///
/// An empty `buf` is replaced by a fresh [`DEFAULT_BUFFER_SIZE`] buffer.
/// Returns the number of bytes written once the reader is exhausted.
pub async fn copy_buffer<R, W>(dst: &mut W, src: &mut R, buf: &mut [u8]) -> Result<u64, CopyError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut fallback;
    let buf = if buf.is_empty() {
        fallback = vec![0u8; DEFAULT_BUFFER_SIZE];
        fallback.as_mut_slice()
    } else {
        buf
    };

    let mut written: u64 = 0;
    loop {
        let nr = match src.read(buf).await {
            Ok(0) => return Ok(written),
            Ok(n) => n,
            Err(source) => {
                tracing::error!(
                    written,
                    "Reverse proxy read error during body copy: {}",
                    source
                );
                return Err(CopyError::Read { written, source });
            }
        };

        let nw = dst
            .write(&buf[..nr])
            .await
            .map_err(|source| CopyError::Write { written, source })?;
        written += nw as u64;
        if nw != nr {
            return Err(CopyError::ShortWrite { written });
        }
    }
}
