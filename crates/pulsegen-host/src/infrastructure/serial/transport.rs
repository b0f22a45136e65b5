//! Byte-level transport abstraction over the serial port.
//!
//! The session is written against the [`Transport`] trait rather than the
//! `serialport` crate directly so integration tests can drive it with a
//! scripted in-memory transport.  Production code uses [`open_port`], which
//! yields a pair of handles to the same physical port: one moves into the
//! reader thread, the other stays with the session for sends.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// How long a blocking read waits before returning `TimedOut`.  Short, so
/// the reader thread notices session shutdown promptly.
pub(crate) const READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Errors surfaced by the serial channel.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The port could not be claimed: already in use, missing, or
    /// permission denied.
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    /// Available ports could not be enumerated.
    #[error("failed to enumerate serial ports: {source}")]
    Enumerate {
        #[source]
        source: serialport::Error,
    },

    /// A send was attempted while no channel is open.
    #[error("serial channel is not open")]
    NotOpen,

    /// The underlying transport rejected a write.
    #[error("write to {port} failed: {source}")]
    Write {
        port: String,
        #[source]
        source: io::Error,
    },
}

/// A raw byte channel the session runs over.
pub trait Transport: Send {
    /// Reads whatever bytes are available, blocking for at most the
    /// transport's read timeout.  A timeout is reported as an
    /// `io::ErrorKind::TimedOut` error, not as `Ok(0)`.
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes all of `data` to the channel.
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;
}

impl Transport for Box<dyn serialport::SerialPort> {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(self, buf)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        io::Write::write_all(self, data)?;
        io::Write::flush(self)
    }
}

/// Opens `port_name` at `baud` and returns a (reader, writer) handle pair
/// to the same physical port.
///
/// # Errors
///
/// Returns [`TransportError::Open`] when the port cannot be claimed or the
/// second handle cannot be cloned.
pub fn open_port(
    port_name: &str,
    baud: u32,
) -> Result<(Box<dyn Transport>, Box<dyn Transport>), TransportError> {
    let reader = serialport::new(port_name, baud)
        .timeout(READ_TIMEOUT)
        .open()
        .map_err(|source| TransportError::Open {
            port: port_name.to_string(),
            source,
        })?;

    let writer = reader.try_clone().map_err(|source| TransportError::Open {
        port: port_name.to_string(),
        source,
    })?;

    Ok((Box::new(reader), Box::new(writer)))
}
