//! Link state exposed to the operator.

use std::fmt;

/// Tri-state connection status of the serial link to the generator.
///
/// State transitions happen only through handshake outcomes or an explicit
/// disconnect:
///
/// ```text
///                 version reply matches
/// Disconnected ──────────────────────────► Connected
///      │  ▲          version reply differs      │
///      │  └──────────── close ──────────────────┘
///      └───────────────────────────────► SketchMismatch
/// ```
///
/// - `Disconnected` is the initial state and the state after any failure or
///   close (including a handshake that times out with no reply at all).
/// - `SketchMismatch` is reached only when the firmware answered the version
///   query with a version string that does not equal the expected one.  It
///   persists until the operator retries with corrected firmware.
/// - `Connected` is reached only after an exact version match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Disconnected,
    SketchMismatch,
    Connected,
}

impl LinkState {
    /// Whether waveform commands may be sent in this state.
    pub fn is_connected(self) -> bool {
        matches!(self, LinkState::Connected)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LinkState::Disconnected => "disconnected",
            LinkState::SketchMismatch => "sketch mismatch",
            LinkState::Connected => "connected",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_disconnected() {
        assert_eq!(LinkState::default(), LinkState::Disconnected);
    }

    #[test]
    fn test_only_connected_allows_sending() {
        assert!(LinkState::Connected.is_connected());
        assert!(!LinkState::Disconnected.is_connected());
        assert!(!LinkState::SketchMismatch.is_connected());
    }

    #[test]
    fn test_display_labels() {
        assert_eq!(LinkState::SketchMismatch.to_string(), "sketch mismatch");
        assert_eq!(LinkState::Connected.to_string(), "connected");
    }
}
