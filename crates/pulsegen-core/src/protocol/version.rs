//! Version query/reply vocabulary used by the connection handshake.

/// Payload of the version query the host sends after opening a port.
pub const VERSION_QUERY: &str = "VERSION?";

/// Prefix carried by the firmware's version reply frame.
pub const VERSION_PREFIX: &str = "VERSION:";

/// Complete wire form of the version query.  The query carries no numeric
/// fields, so its bytes are fixed; the handshake sends this constant
/// rather than invoking the encoder for a value that cannot vary.
pub const VERSION_QUERY_WIRE: &str = "<VERSION?>\n";

/// Interprets a frame payload as a version reply.
///
/// Returns the version string (trimmed of surrounding whitespace) when the
/// payload starts with [`VERSION_PREFIX`], or `None` for any other frame;
/// the handshake discards those and keeps waiting.
pub fn parse_version_reply(payload: &str) -> Option<&str> {
    payload.strip_prefix(VERSION_PREFIX).map(str::trim)
}
