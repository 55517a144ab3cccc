//! Trait abstraction for radio port operations to enable testing

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Trait for radio bridge I/O operations
#[async_trait]
pub trait RadioPort: Send {
    /// Write all data to the port
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush the output buffer
    async fn flush(&mut self) -> io::Result<()>;

    /// Read available bytes into `buf`, returning 0 at end of stream
    ///
    /// Must be cancel-safe: dropping the future loses no data.
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Adapter exposing any tokio byte stream as a [`RadioPort`]
///
/// Wraps `tokio_serial::SerialStream` in production and in-memory mock
/// streams in tests.
pub struct StreamPort<S> {
    stream: S,
}

impl<S> StreamPort<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }
}

/// Serial port backed radio bridge
pub type TokioSerialPort = StreamPort<tokio_serial::SerialStream>;

#[async_trait]
impl<S> RadioPort for StreamPort<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.stream.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.stream.flush().await
    }

    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf).await
    }
}
