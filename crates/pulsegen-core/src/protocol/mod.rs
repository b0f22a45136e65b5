//! Protocol module containing frame extraction, command encoding, and the
//! version handshake vocabulary.

pub mod command;
pub mod frame;
pub mod version;

pub use command::{encode, Command, EncodeError, Mode};
pub use frame::extract_frame;
pub use version::{parse_version_reply, VERSION_PREFIX, VERSION_QUERY, VERSION_QUERY_WIRE};
