//! # Serial Line Transport
//!
//! The radio module talks CRLF-terminated text lines over a serial byte
//! stream. The stream is split once: the reader half is owned by whoever
//! runs the receive loop, the writer half is shared (behind an async mutex)
//! between command issuing and the background transmitter.

use crate::error::BrouteError;
use log::{debug, info};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio_serial::SerialPortBuilderExt;

/// Byte stream the radio module is reachable through.
pub trait SerialPort: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> SerialPort for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// Open the radio module's serial device, 8N1.
pub fn open_serial(device: &str, baudrate: u32) -> Result<tokio_serial::SerialStream, BrouteError> {
    info!("Opening serial port {device} at {baudrate} baud");
    let port = tokio_serial::new(device, baudrate)
        .data_bits(tokio_serial::DataBits::Eight)
        .stop_bits(tokio_serial::StopBits::One)
        .parity(tokio_serial::Parity::None)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()?;
    Ok(port)
}

/// Shareable writing half.
pub struct LineWriter<P> {
    inner: Arc<Mutex<WriteHalf<P>>>,
}

impl<P> Clone for LineWriter<P> {
    fn clone(&self) -> Self {
        LineWriter {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: SerialPort> LineWriter<P> {
    /// Write `bytes` as one unit and flush.
    pub async fn write(&self, bytes: &[u8]) -> Result<(), BrouteError> {
        let mut port = self.inner.lock().await;
        port.write_all(bytes).await?;
        port.flush().await?;
        Ok(())
    }
}

/// Exclusively owned reading half.
pub struct LineReader<P> {
    inner: BufReader<ReadHalf<P>>,
    buf: Vec<u8>,
}

impl<P: SerialPort> LineReader<P> {
    /// Read one line with its CRLF stripped. End of stream is
    /// [`BrouteError::ConnectionClosed`].
    pub async fn read_line(&mut self) -> Result<String, BrouteError> {
        self.buf.clear();
        let n = self.inner.read_until(b'\n', &mut self.buf).await?;
        if n == 0 {
            return Err(BrouteError::ConnectionClosed);
        }
        let line = String::from_utf8_lossy(&self.buf)
            .trim_end_matches(|c| c == '\r' || c == '\n')
            .to_string();
        debug!("<< {line}");
        Ok(line)
    }
}

/// Both halves of one radio module connection.
pub struct SkTransport<P> {
    reader: LineReader<P>,
    writer: LineWriter<P>,
}

impl<P: SerialPort> SkTransport<P> {
    pub fn new(port: P) -> Self {
        let (read_half, write_half) = tokio::io::split(port);
        SkTransport {
            reader: LineReader {
                inner: BufReader::new(read_half),
                buf: Vec::with_capacity(256),
            },
            writer: LineWriter {
                inner: Arc::new(Mutex::new(write_half)),
            },
        }
    }

    pub async fn write(&self, bytes: &[u8]) -> Result<(), BrouteError> {
        self.writer.write(bytes).await
    }

    pub async fn read_line(&mut self) -> Result<String, BrouteError> {
        self.reader.read_line().await
    }

    /// Handle for a concurrent writer.
    pub fn writer(&self) -> LineWriter<P> {
        self.writer.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skstack::mock::MockSerialPort;

    #[tokio::test]
    async fn test_read_lines_strip_crlf() {
        let port = MockSerialPort::new();
        port.queue_rx_data(b"OK\r\nEVENT 22 FE80:0000:0000:0000:0000:0000:0000:0001 0\r\n\r\n");
        let mut transport = SkTransport::new(port);

        assert_eq!(transport.read_line().await.unwrap(), "OK");
        assert!(transport.read_line().await.unwrap().starts_with("EVENT 22"));
        assert_eq!(transport.read_line().await.unwrap(), "");
        assert!(matches!(transport.read_line().await, Err(BrouteError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_shared_writer() {
        let port = MockSerialPort::new();
        let transport = SkTransport::new(port.clone());
        let writer = transport.writer();

        transport.write(b"SKINFO\r\n").await.unwrap();
        writer.write(b"SKVER\r\n").await.unwrap();
        assert_eq!(port.get_tx_data(), b"SKINFO\r\nSKVER\r\n");
    }

    #[tokio::test]
    async fn test_write_error() {
        let port = MockSerialPort::new();
        port.set_next_error(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "unplugged"));
        let transport = SkTransport::new(port);
        let err = transport.write(b"SKINFO\r\n").await.unwrap_err();
        assert!(err.is_transport());
    }
}
