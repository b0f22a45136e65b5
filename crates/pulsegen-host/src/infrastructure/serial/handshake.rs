//! Version handshake: the exchange that gates whether control commands may
//! be sent.
//!
//! After a port is opened the firmware is asked `<VERSION?>`.  Only a frame
//! prefixed `VERSION:` answers the question; anything else the device emits
//! while booting is consumed and ignored.  The reply's version string must
//! equal the expected one *exactly*; there is no range negotiation, and a
//! firmware built from a different sketch revision is simply not trusted
//! with waveform commands.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use pulsegen_core::{parse_version_reply, VERSION_QUERY_WIRE};

use super::session::SerialSession;
use super::transport::TransportError;

/// Total time the firmware has to answer the version query.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);

/// Cadence at which the receive buffer is polled for a reply frame.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Result of one handshake attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
    /// The reply matched the expected version string exactly.
    Connected,
    /// A version reply arrived but did not match.  The caller decides
    /// whether to close the channel; the handshake itself does not.
    SketchMismatch { received: String },
    /// No version reply within the timeout, or the session was closed
    /// while waiting.  The caller should close and report "no response".
    NoResponse,
}

/// Runs one version handshake against an open session.
///
/// Clears any stale buffer content, sends the version query, then polls the
/// frame extractor every `poll_interval` until a version reply arrives or
/// `timeout` elapses.  Closing the session from elsewhere unblocks the wait
/// and resolves to [`HandshakeOutcome::NoResponse`].
///
/// The caller is responsible for running at most one handshake per session
/// at a time; a retry must supersede the previous attempt before sending a
/// second query.
///
/// # Errors
///
/// Returns [`TransportError`] only when the query itself cannot be written.
pub async fn perform_handshake(
    session: &SerialSession,
    expected_version: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<HandshakeOutcome, TransportError> {
    session.clear_buffer();

    session.send(VERSION_QUERY_WIRE)?;
    debug!(expected = expected_version, "version query sent");

    let deadline = Instant::now() + timeout;
    loop {
        while let Some(frame) = session.extract_frame() {
            let Some(received) = parse_version_reply(&frame) else {
                // Not an answer; consumed and dropped, never re-buffered.
                debug!(%frame, "ignoring non-version frame during handshake");
                continue;
            };

            return Ok(if received == expected_version {
                info!(version = received, "firmware version matched");
                HandshakeOutcome::Connected
            } else {
                info!(
                    received,
                    expected = expected_version,
                    "firmware version mismatch"
                );
                HandshakeOutcome::SketchMismatch {
                    received: received.to_string(),
                }
            });
        }

        if !session.is_open() || Instant::now() >= deadline {
            debug!("handshake ended without a version reply");
            return Ok(HandshakeOutcome::NoResponse);
        }

        sleep(poll_interval).await;
    }
}
