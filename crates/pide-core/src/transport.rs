//! Transport layer - Content-Length framed JSON-RPC over a byte stream
//!
//! Reader and writer halves are separate so the connection can drive them
//! from independent tasks.

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};

/// Content-Length header prefix
const CONTENT_LENGTH: &str = "Content-Length: ";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("server closed connection")]
    Closed,
    #[error("invalid Content-Length header: {0}")]
    InvalidLength(String),
    #[error("message body is not UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    #[error("child process has no {0} pipe")]
    MissingPipe(&'static str),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Reading half: yields one message body per frame
pub struct FrameReader<R> {
    inner: BufReader<R>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            inner: BufReader::new(reader),
        }
    }

    /// Receive the next message body
    pub async fn receive(&mut self) -> Result<String, TransportError> {
        // Read headers until we find Content-Length, skipping non-protocol
        // output. The prover prints banner lines on stdout during startup.
        let mut content_length: Option<usize> = None;
        loop {
            let mut header = String::new();
            let bytes_read = self.inner.read_line(&mut header).await?;
            if bytes_read == 0 {
                return Err(TransportError::Closed);
            }

            let header = header.trim();

            if header.is_empty() {
                if content_length.is_some() {
                    // Empty line after Content-Length means end of headers
                    break;
                }
                continue;
            }

            if let Some(len_str) = header.strip_prefix(CONTENT_LENGTH) {
                let len = len_str
                    .parse()
                    .map_err(|_| TransportError::InvalidLength(len_str.to_string()))?;
                content_length = Some(len);
            } else if header.starts_with("Content-") {
                // Content-Type and friends
                continue;
            } else if content_length.is_none() {
                tracing::trace!(line = %header, "Skipping non-protocol output");
                continue;
            }
        }

        let length = content_length.unwrap_or_default();
        let mut body = vec![0u8; length];
        self.inner.read_exact(&mut body).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                TransportError::Closed
            } else {
                TransportError::Io(e)
            }
        })?;

        Ok(String::from_utf8(body)?)
    }
}

/// Writing half: frames and flushes one message per call
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { inner: writer }
    }

    /// Send a JSON-RPC message
    pub async fn send(&mut self, message: &str) -> Result<(), TransportError> {
        let header = format!("{}{}\r\n\r\n", CONTENT_LENGTH, message.len());
        self.inner.write_all(header.as_bytes()).await?;
        self.inner.write_all(message.as_bytes()).await?;
        self.inner.flush().await?;
        Ok(())
    }
}

/// Split a spawned server process into framed halves.
///
/// The child must be spawned with `tokio::process::Command` and piped stdio.
pub fn from_tokio_child(
    child: &mut Child,
) -> Result<(FrameReader<ChildStdout>, FrameWriter<ChildStdin>), TransportError> {
    let stdin = child.stdin.take().ok_or(TransportError::MissingPipe("stdin"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or(TransportError::MissingPipe("stdout"))?;

    Ok((FrameReader::new(stdout), FrameWriter::new(stdin)))
}
