//! Enumeration of serial ports offered to the operator.

use super::transport::TransportError;

/// Returns the names of all serial ports the OS reports, sorted ascending
/// for a stable presentation order.
///
/// # Errors
///
/// Returns [`TransportError::Enumerate`] when the OS query fails.
pub fn list_ports() -> Result<Vec<String>, TransportError> {
    let mut names: Vec<String> = serialport::available_ports()
        .map_err(|source| TransportError::Enumerate { source })?
        .into_iter()
        .map(|p| p.port_name)
        .collect();
    names.sort();
    Ok(names)
}
