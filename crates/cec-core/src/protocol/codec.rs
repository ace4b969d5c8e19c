//! Binary codec for bus frames and their payload fields.
//!
//! Wire format:
//! ```text
//! [src nibble | dst nibble : 1 byte][opcode : 1 byte][params : 0-14 bytes]
//! ```
//! Multi-byte payload fields are big-endian: physical addresses are 2 bytes,
//! vendor ids 3 bytes.  Display names are raw bytes intended as US-ASCII.

use thiserror::Error;
use tracing::debug;

use crate::domain::address::{DeviceType, LogicalAddress, PhysicalAddress};
use crate::protocol::frame::{CecFrame, MAX_PARAMS};
use crate::protocol::opcode::Opcode;

/// Errors that can occur while encoding or decoding a frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The byte slice holds no header byte at all.
    #[error("empty frame")]
    Empty,

    /// The frame has a header byte but no opcode.
    #[error("frame has no opcode byte")]
    MissingOpcode,

    /// The opcode byte is not in the engine's opcode table.
    #[error("unknown opcode: 0x{0:02X}")]
    UnknownOpcode(u8),

    /// The parameter block exceeds the 14-byte frame limit.
    #[error("parameter block too long: {0} bytes (max {MAX_PARAMS})")]
    ParamsTooLong(usize),

    /// A payload field is the wrong shape (too short, undecodable text, ...).
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

// ── Frame encode / decode ─────────────────────────────────────────────────────

/// Encodes a frame into its wire bytes.
pub fn encode_frame(frame: &CecFrame) -> Vec<u8> {
    let mut buf = Vec::with_capacity(2 + frame.params().len());
    buf.push((frame.source().raw() << 4) | frame.destination().raw());
    buf.push(frame.opcode() as u8);
    buf.extend_from_slice(frame.params());
    buf
}

/// Decodes one frame from `bytes`.
///
/// # Errors
///
/// Returns [`FrameError`] for an empty slice, a missing opcode byte, an
/// opcode outside the table, or an over-long parameter block.
pub fn decode_frame(bytes: &[u8]) -> Result<CecFrame, FrameError> {
    let header = *bytes.first().ok_or(FrameError::Empty)?;
    let opcode_byte = *bytes.get(1).ok_or(FrameError::MissingOpcode)?;

    // Both nibbles are 4-bit by construction, so these cannot fail.
    let source = LogicalAddress::new(header >> 4)
        .map_err(|e| FrameError::MalformedPayload(e.to_string()))?;
    let destination = LogicalAddress::new(header & 0x0F)
        .map_err(|e| FrameError::MalformedPayload(e.to_string()))?;

    let opcode = Opcode::try_from(opcode_byte).map_err(FrameError::UnknownOpcode)?;
    CecFrame::new(source, destination, opcode, bytes[2..].to_vec())
}

// ── Payload field readers ─────────────────────────────────────────────────────

/// Reads a physical-address report payload: 2 bytes big-endian address plus
/// 1 byte device type.
///
/// # Errors
///
/// Returns [`FrameError::MalformedPayload`] when the payload is short or the
/// device-type byte is not in the table.
pub fn read_physical_address(params: &[u8]) -> Result<(PhysicalAddress, DeviceType), FrameError> {
    if params.len() < 3 {
        return Err(FrameError::MalformedPayload(format!(
            "physical address report needs 3 bytes, got {}",
            params.len()
        )));
    }
    let address = PhysicalAddress::from_be_bytes([params[0], params[1]]);
    let device_type = DeviceType::try_from(params[2])
        .map_err(|e| FrameError::MalformedPayload(e.to_string()))?;
    Ok((address, device_type))
}

/// Reads a 3-byte big-endian vendor id.
///
/// # Errors
///
/// Returns [`FrameError::MalformedPayload`] when fewer than 3 bytes are present.
pub fn read_vendor_id(params: &[u8]) -> Result<u32, FrameError> {
    if params.len() < 3 {
        return Err(FrameError::MalformedPayload(format!(
            "vendor id needs 3 bytes, got {}",
            params.len()
        )));
    }
    Ok(u32::from_be_bytes([0, params[0], params[1], params[2]]))
}

/// Reads a display-name payload as US-ASCII text.
///
/// # Errors
///
/// Returns [`FrameError::MalformedPayload`] for an empty payload or any
/// non-ASCII / control byte; the caller substitutes its fallback name.
pub fn read_osd_name(params: &[u8]) -> Result<String, FrameError> {
    if params.is_empty() {
        return Err(FrameError::MalformedPayload("empty display name".to_string()));
    }
    if !params.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        debug!("display name payload is not printable ASCII: {params:02X?}");
        return Err(FrameError::MalformedPayload(
            "display name is not printable ASCII".to_string(),
        ));
    }
    // Safe: all bytes verified ASCII above.
    Ok(String::from_utf8_lossy(params).into_owned())
}
