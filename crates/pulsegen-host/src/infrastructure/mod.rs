//! Infrastructure layer: everything that touches the operating system.
//!
//! - `serial` – the physical serial channel: transport, session, handshake,
//!   and port enumeration.
//! - `flash` – invocation of the external firmware build-and-upload tool.
//! - `storage` – TOML configuration persistence.

pub mod flash;
pub mod serial;
pub mod storage;
