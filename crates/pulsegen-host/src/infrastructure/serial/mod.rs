//! Serial channel infrastructure.
//!
//! The session owns exactly one open channel at a time and is the only
//! component that touches the physical transport.  The handshake controller
//! drives it to resolve the link state after a port is opened.

pub mod handshake;
pub mod mock;
pub mod ports;
pub mod session;
pub mod transport;

pub use handshake::{perform_handshake, HandshakeOutcome};
pub use session::SerialSession;
pub use transport::{Transport, TransportError};
