//! SerialSession: exclusive owner of one open serial channel.
//!
//! # Concurrency model
//!
//! Exactly one asynchronous boundary exists in the protocol: bytes arriving
//! from the device.  A dedicated reader thread blocks on the transport with
//! a short timeout and appends decoded text to the receive buffer; the
//! handshake/polling side extracts frames from the same buffer.  The
//! `Mutex<String>` around the buffer is the only structure shared between
//! the two contexts.
//!
//! Read errors on the receive path are logged and swallowed; a transient
//! glitch on the wire must not tear down the session.  Transport errors on
//! the *send* path are surfaced to the caller, who is expected to close.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use pulsegen_core::extract_frame;

use super::transport::{self, Transport, TransportError};

/// Upper bound on the receive buffer.  A connected device free-runs its
/// chatter with nobody extracting frames, so the buffer drops its oldest
/// bytes once this is exceeded; any protocol reply fits in a tiny fraction
/// of it.
const MAX_BUFFER_LEN: usize = 64 * 1024;

/// An open serial channel plus its receive buffer and reader thread.
///
/// Closing is idempotent and total: [`close`](Self::close) never fails, and
/// dropping the session closes it.  At most one physical channel is owned
/// at any instant; opening a new session for a different port is the
/// caller's cue to close this one first.
pub struct SerialSession {
    port_name: String,
    /// Receive buffer: appended by the reader thread (which also enforces
    /// [`MAX_BUFFER_LEN`]), trimmed by frame extraction.
    buffer: Arc<Mutex<String>>,
    /// Cleared on close; the reader thread exits when it sees this drop.
    open: Arc<AtomicBool>,
    /// Writer half of the transport.  Taking the lock serializes sends
    /// against teardown; `close` empties the slot after the lock is won, so
    /// an in-flight send completes before the channel goes away.
    writer: Mutex<Option<Box<dyn Transport>>>,
    reader: Option<JoinHandle<()>>,
}

impl SerialSession {
    /// Opens `port_name` at `baud` and starts the reader thread.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Open`] when the channel cannot be claimed
    /// (already in use, does not exist, permission denied).
    pub fn open(port_name: &str, baud: u32) -> Result<Self, TransportError> {
        let (reader, writer) = transport::open_port(port_name, baud)?;
        debug!(port = port_name, baud, "serial channel opened");
        Ok(Self::over(port_name, reader, writer))
    }

    /// Builds a session over an already-open transport pair.  Tests use
    /// this with an in-memory transport; [`open`](Self::open) is the
    /// production path.
    pub fn over(
        port_name: &str,
        reader: Box<dyn Transport>,
        writer: Box<dyn Transport>,
    ) -> Self {
        let buffer = Arc::new(Mutex::new(String::new()));
        let open = Arc::new(AtomicBool::new(true));

        let handle = spawn_reader(port_name.to_string(), reader, Arc::clone(&buffer), Arc::clone(&open));

        Self {
            port_name: port_name.to_string(),
            buffer,
            open,
            writer: Mutex::new(Some(writer)),
            reader: Some(handle),
        }
    }

    /// Name of the channel this session owns.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Whether the channel is still open.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Writes `text` to the channel exactly as given; no framing is added
    /// beyond what the caller supplied.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotOpen`] after close, or
    /// [`TransportError::Write`] when the transport rejects the write.
    pub fn send(&self, text: &str) -> Result<(), TransportError> {
        let mut slot = lock(&self.writer);
        let writer = slot.as_mut().ok_or(TransportError::NotOpen)?;
        writer
            .write_all(text.as_bytes())
            .map_err(|source| TransportError::Write {
                port: self.port_name.clone(),
                source,
            })
    }

    /// Discards any buffered receive data.  Called at handshake start so a
    /// stale partial frame from a previous exchange cannot answer the query.
    pub fn clear_buffer(&self) {
        lock(&self.buffer).clear();
    }

    /// Pulls the next complete `<...>` frame out of the receive buffer, if
    /// one has arrived.  Safe to call on any cadence.
    pub fn extract_frame(&self) -> Option<String> {
        extract_frame(&mut lock(&self.buffer))
    }

    /// Closes the channel.  Idempotent; never fails.
    ///
    /// Waits for any in-flight send (via the writer lock), drops the writer
    /// handle, signals the reader thread, and joins it.
    pub fn close(&mut self) {
        if self.open.swap(false, Ordering::AcqRel) {
            debug!(port = %self.port_name, "closing serial channel");
        }

        // Win the writer lock so an in-flight send finishes first, then
        // invalidate the slot for all future sends.
        lock(&self.writer).take();

        if let Some(handle) = self.reader.take() {
            if handle.join().is_err() {
                warn!(port = %self.port_name, "serial reader thread panicked");
            }
        }
    }
}

impl Drop for SerialSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn spawn_reader(
    port_name: String,
    mut reader: Box<dyn Transport>,
    buffer: Arc<Mutex<String>>,
    open: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut chunk = [0u8; 256];
        while open.load(Ordering::Acquire) {
            match reader.read_chunk(&mut chunk) {
                Ok(0) => {}
                Ok(n) => {
                    // The protocol is ASCII; lossy decoding turns any noise
                    // bytes into U+FFFD, which never matches a delimiter.
                    let text = String::from_utf8_lossy(&chunk[..n]);
                    let mut buf = lock(&buffer);
                    buf.push_str(&text);
                    if buf.len() > MAX_BUFFER_LEN {
                        // Drop the oldest bytes, rounding the cut up to a
                        // char boundary (U+FFFD is multi-byte).
                        let mut cut = buf.len() - MAX_BUFFER_LEN;
                        while !buf.is_char_boundary(cut) {
                            cut += 1;
                        }
                        buf.drain(..cut);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => {
                    // Swallowed on purpose: one bad read must not kill the
                    // session.  Back off so a persistently failing device
                    // does not spin this thread.
                    warn!(port = %port_name, error = %e, "serial read failed; ignoring");
                    thread::sleep(Duration::from_millis(10));
                }
            }
        }
        debug!(port = %port_name, "serial reader thread exiting");
    })
}

/// Locks a mutex, recovering the data if a previous holder panicked.  The
/// buffer and writer are plain data; there is no invariant a panic could
/// have broken mid-update that matters more than staying alive.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
