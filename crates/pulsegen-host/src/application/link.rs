//! LinkController: the operator's view of the generator connection.
//!
//! Owns at most one [`SerialSession`] plus the current [`LinkState`], and
//! is the single place where handshake outcomes are mapped to state
//! transitions and operator-facing errors.  No ambient globals: whichever
//! surface (CLI today) wants to talk to the generator holds this
//! controller and passes it around explicitly.

use std::time::Duration;

use thiserror::Error;
use tracing::info;

use pulsegen_core::{
    encode, Command, EncodeError, LinkState, Mode, SineWave, SinglePulse, TrainPulse,
};

use crate::infrastructure::serial::handshake::{perform_handshake, HandshakeOutcome};
use crate::infrastructure::serial::session::SerialSession;
use crate::infrastructure::serial::transport::TransportError;
use crate::infrastructure::storage::config::SerialSettings;

/// Errors surfaced to the operator by link operations.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The firmware never answered the version query.
    #[error("no response from the generator; upload the correct sketch and retry")]
    NoResponse,

    /// The firmware answered with a different version string.
    #[error("sketch version mismatch: expected {expected}, device reports {received}")]
    VersionMismatch { expected: String, received: String },

    /// A command was attempted while the link is not connected.
    #[error("link is not connected (state: {state})")]
    NotConnected { state: LinkState },

    /// The serial channel failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A waveform field failed validation; nothing was sent.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Controller for the single serial link to the generator.
pub struct LinkController {
    settings: SerialSettings,
    session: Option<SerialSession>,
    state: LinkState,
}

impl LinkController {
    pub fn new(settings: SerialSettings) -> Self {
        Self {
            settings,
            session: None,
            state: LinkState::Disconnected,
        }
    }

    /// Current link state.
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Name of the currently open port, if any.
    pub fn port(&self) -> Option<&str> {
        self.session.as_ref().map(SerialSession::port_name)
    }

    /// Opens `port` and runs the version handshake.
    ///
    /// Any previously open channel is closed first, which also unblocks an
    /// in-flight handshake on it; only the newest attempt's result is ever
    /// observed, and exactly one physical channel is owned afterwards.
    ///
    /// Outcome mapping:
    /// - exact version match → `Connected`, session kept open;
    /// - version mismatch → `SketchMismatch`, channel closed (caller
    ///   policy, the handshake itself does not close);
    /// - no reply within the timeout → `Disconnected`, channel closed.
    ///
    /// # Errors
    ///
    /// Returns the mismatch / no-response / transport failure; in every
    /// error case no channel remains open.
    pub async fn connect(&mut self, port: &str) -> Result<LinkState, LinkError> {
        self.disconnect();

        let session = SerialSession::open(port, self.settings.baud_rate)?;
        let outcome = self.handshake(&session).await?;

        match outcome {
            HandshakeOutcome::Connected => {
                info!(port, "link established");
                self.session = Some(session);
                self.state = LinkState::Connected;
                Ok(self.state)
            }
            HandshakeOutcome::SketchMismatch { received } => {
                drop(session);
                self.state = LinkState::SketchMismatch;
                Err(LinkError::VersionMismatch {
                    expected: self.settings.expected_version.clone(),
                    received,
                })
            }
            HandshakeOutcome::NoResponse => {
                drop(session);
                self.state = LinkState::Disconnected;
                Err(LinkError::NoResponse)
            }
        }
    }

    /// Runs the handshake against `session` using an already-open session.
    ///
    /// Exposed separately so tests can drive the controller over a mock
    /// transport; [`connect`](Self::connect) is the production path.
    pub async fn attach(&mut self, session: SerialSession) -> Result<LinkState, LinkError> {
        self.disconnect();

        let outcome = self.handshake(&session).await?;
        match outcome {
            HandshakeOutcome::Connected => {
                self.session = Some(session);
                self.state = LinkState::Connected;
                Ok(self.state)
            }
            HandshakeOutcome::SketchMismatch { received } => {
                self.state = LinkState::SketchMismatch;
                Err(LinkError::VersionMismatch {
                    expected: self.settings.expected_version.clone(),
                    received,
                })
            }
            HandshakeOutcome::NoResponse => {
                self.state = LinkState::Disconnected;
                Err(LinkError::NoResponse)
            }
        }
    }

    async fn handshake(&self, session: &SerialSession) -> Result<HandshakeOutcome, TransportError> {
        perform_handshake(
            session,
            &self.settings.expected_version,
            Duration::from_millis(self.settings.handshake_timeout_ms),
            Duration::from_millis(self.settings.poll_interval_ms),
        )
        .await
    }

    /// Closes the channel, if open.  Idempotent; the state always ends up
    /// `Disconnected`.
    pub fn disconnect(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
        self.state = LinkState::Disconnected;
    }

    /// Selects the generator's operating mode.
    pub fn select_mode(&mut self, mode: Mode) -> Result<(), LinkError> {
        self.send_command(&Command::SelectMode(mode))
    }

    /// Toggles output inversion.
    pub fn set_invert(&mut self, on: bool) -> Result<(), LinkError> {
        self.send_command(&Command::Invert(on))
    }

    /// Sends single-pulse parameters (mode A).
    pub fn send_single(&mut self, pulse: SinglePulse) -> Result<(), LinkError> {
        self.send_command(&Command::Single(pulse))
    }

    /// Sends pulse-train parameters (mode B).
    pub fn send_train(&mut self, pulses: Vec<TrainPulse>) -> Result<(), LinkError> {
        self.send_command(&Command::Train(pulses))
    }

    /// Sends sine parameters (mode C).
    pub fn send_sine(&mut self, wave: SineWave) -> Result<(), LinkError> {
        self.send_command(&Command::Sine(wave))
    }

    /// Encodes and transmits one command.
    ///
    /// Refused unless the link is `Connected`.  An encode failure sends
    /// nothing and leaves the link untouched; a transport failure forces
    /// the session closed and the state to `Disconnected`.
    pub fn send_command(&mut self, cmd: &Command) -> Result<(), LinkError> {
        if !self.state.is_connected() {
            return Err(LinkError::NotConnected { state: self.state });
        }

        let wire = encode(cmd)?;

        let session = self
            .session
            .as_ref()
            .ok_or(LinkError::NotConnected { state: self.state })?;

        if let Err(e) = session.send(&wire) {
            self.disconnect();
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::serial::mock::mock_pair;

    fn settings() -> SerialSettings {
        SerialSettings {
            baud_rate: 9600,
            expected_version: "1.1.0".into(),
            handshake_timeout_ms: 300,
            poll_interval_ms: 10,
        }
    }

    #[test]
    fn test_initial_state_is_disconnected() {
        let ctl = LinkController::new(settings());
        assert_eq!(ctl.state(), LinkState::Disconnected);
        assert_eq!(ctl.port(), None);
    }

    #[test]
    fn test_send_refused_while_disconnected() {
        let mut ctl = LinkController::new(settings());
        let err = ctl.select_mode(Mode::Single).unwrap_err();
        assert!(matches!(err, LinkError::NotConnected { .. }));
    }

    #[tokio::test]
    async fn test_attach_with_matching_version_connects() {
        let mut ctl = LinkController::new(settings());
        let (reader, writer, handle) = mock_pair();
        handle.push_reply("<VERSION:1.1.0>\n");

        let session = SerialSession::over("mock0", reader, writer);
        let state = ctl.attach(session).await.expect("handshake");

        assert_eq!(state, LinkState::Connected);
        assert_eq!(ctl.port(), Some("mock0"));
        assert!(handle.written().starts_with("<VERSION?>"));
    }

    #[tokio::test]
    async fn test_attach_with_wrong_version_is_sketch_mismatch() {
        let mut ctl = LinkController::new(settings());
        let (reader, writer, handle) = mock_pair();
        handle.push_reply("<VERSION:1.0.9>\n");

        let session = SerialSession::over("mock0", reader, writer);
        let err = ctl.attach(session).await.unwrap_err();

        assert!(matches!(
            err,
            LinkError::VersionMismatch { ref received, .. } if received == "1.0.9"
        ));
        assert_eq!(ctl.state(), LinkState::SketchMismatch);
        // The mismatched channel must not be kept.
        assert_eq!(ctl.port(), None);
    }

    #[tokio::test]
    async fn test_attach_with_silent_device_is_no_response() {
        let mut ctl = LinkController::new(settings());
        let (reader, writer, _handle) = mock_pair();

        let session = SerialSession::over("mock0", reader, writer);
        let err = ctl.attach(session).await.unwrap_err();

        assert!(matches!(err, LinkError::NoResponse));
        assert_eq!(ctl.state(), LinkState::Disconnected);
    }

    #[tokio::test]
    async fn test_connected_link_sends_encoded_commands() {
        let mut ctl = LinkController::new(settings());
        let (reader, writer, handle) = mock_pair();
        handle.push_reply("<VERSION:1.1.0>\n");

        let session = SerialSession::over("mock0", reader, writer);
        ctl.attach(session).await.expect("handshake");

        ctl.select_mode(Mode::Train).expect("mode");
        ctl.send_single(SinglePulse {
            amplitude: "2".into(),
            frequency: "20".into(),
            duty_percent: "40".into(),
        })
        .expect("single");

        let written = handle.written();
        assert!(written.contains("<@B>\n"));
        assert!(written.ends_with("<2.000,20.000,40.000>\n"));
    }

    #[tokio::test]
    async fn test_encode_failure_sends_nothing_and_keeps_link() {
        let mut ctl = LinkController::new(settings());
        let (reader, writer, handle) = mock_pair();
        handle.push_reply("<VERSION:1.1.0>\n");

        let session = SerialSession::over("mock0", reader, writer);
        ctl.attach(session).await.expect("handshake");
        let written_before = handle.written();

        let err = ctl
            .send_single(SinglePulse {
                amplitude: "abc".into(),
                frequency: "20".into(),
                duty_percent: "40".into(),
            })
            .unwrap_err();

        assert!(matches!(err, LinkError::Encode(_)));
        assert_eq!(handle.written(), written_before, "nothing extra on the wire");
        assert_eq!(ctl.state(), LinkState::Connected);
    }

    #[tokio::test]
    async fn test_write_failure_forces_disconnect() {
        let mut ctl = LinkController::new(settings());
        let (reader, writer, handle) = mock_pair();
        handle.push_reply("<VERSION:1.1.0>\n");

        let session = SerialSession::over("mock0", reader, writer);
        ctl.attach(session).await.expect("handshake");

        handle.fail_writes(true);
        let err = ctl.select_mode(Mode::Sine).unwrap_err();

        assert!(matches!(err, LinkError::Transport(_)));
        assert_eq!(ctl.state(), LinkState::Disconnected);
        assert_eq!(ctl.port(), None);
    }

    #[tokio::test]
    async fn test_reattach_supersedes_previous_channel() {
        let mut ctl = LinkController::new(settings());

        let (reader_a, writer_a, handle_a) = mock_pair();
        handle_a.push_reply("<VERSION:1.1.0>\n");
        ctl.attach(SerialSession::over("mock_a", reader_a, writer_a))
            .await
            .expect("first handshake");
        let a_written = handle_a.written();

        let (reader_b, writer_b, handle_b) = mock_pair();
        handle_b.push_reply("<VERSION:1.1.0>\n");
        ctl.attach(SerialSession::over("mock_b", reader_b, writer_b))
            .await
            .expect("second handshake");

        // Exactly one channel remains; commands go to it alone.
        assert_eq!(ctl.port(), Some("mock_b"));
        ctl.select_mode(Mode::Single).expect("mode");
        assert_eq!(handle_a.written(), a_written, "old channel sees nothing new");
        assert!(handle_b.written().ends_with("<@A>\n"));
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let mut ctl = LinkController::new(settings());
        ctl.disconnect();
        ctl.disconnect();
        assert_eq!(ctl.state(), LinkState::Disconnected);
    }
}
