//! # pulsegen-core
//!
//! Shared library for the pulse generator host containing the serial wire
//! protocol: frame extraction, waveform command encoding, version-reply
//! parsing, and the link state machine.
//!
//! This crate is used by the host application and by anything that needs to
//! speak the generator's protocol.  It has zero dependencies on OS APIs,
//! serial ports, or UI frameworks.
//!
//! # Protocol overview
//!
//! The generator firmware speaks a human-readable ASCII protocol.  Every
//! message travels inside angle brackets, one message per line:
//!
//! ```text
//! host → device    <VERSION?>            firmware version query
//! device → host    <VERSION:1.1.0>       firmware version reply
//! host → device    <@A> / <@B> / <@C>    mode select (single / train / sine)
//! host → device    <2.000,20.000,40.000> single-pulse parameters
//! host → device    <a,f,d,l,c;...>       pulse-train parameters, ';'-grouped
//! host → device    <Invert:ON|OFF>       output inversion toggle
//! ```
//!
//! This crate defines:
//!
//! - **`protocol::frame`** – incremental extraction of complete `<...>`
//!   frames from a growing receive buffer.
//! - **`protocol::command`** – validation and encoding of operator-entered
//!   waveform parameters into the wire format.
//! - **`protocol::version`** – the version query/reply vocabulary used by
//!   the connection handshake.
//! - **`link`** – the tri-state connection status shown to the operator.

pub mod link;
pub mod protocol;

// Re-export the most-used items at the crate root so callers can write
// `pulsegen_core::extract_frame` instead of the full module path.
pub use link::LinkState;
pub use protocol::command::{encode, Command, EncodeError, Mode, SineWave, SinglePulse, TrainPulse};
pub use protocol::frame::extract_frame;
pub use protocol::version::{parse_version_reply, VERSION_PREFIX, VERSION_QUERY, VERSION_QUERY_WIRE};
