//! Opcode table for the subset of bus operations the engine speaks.

use serde::{Deserialize, Serialize};

/// All opcodes the engine can send or interpret.
///
/// Values are the standard CEC operation codes.  Frames carrying opcodes
/// outside this table fail to decode; the dispatch layer reports them as
/// unhandled rather than crashing a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    /// Explicit refusal of a specific request opcode; a negotiated outcome,
    /// not a transport error.
    FeatureAbort = 0x00,
    GiveOsdName = 0x46,
    SetOsdName = 0x47,
    RoutingChange = 0x80,
    ActiveSource = 0x82,
    GivePhysicalAddress = 0x83,
    ReportPhysicalAddress = 0x84,
    SetStreamPath = 0x86,
    DeviceVendorId = 0x87,
    GiveDeviceVendorId = 0x8C,
    ReportShortAudioDescriptor = 0xA3,
    RequestShortAudioDescriptor = 0xA4,
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0x00 => Ok(Opcode::FeatureAbort),
            0x46 => Ok(Opcode::GiveOsdName),
            0x47 => Ok(Opcode::SetOsdName),
            0x80 => Ok(Opcode::RoutingChange),
            0x82 => Ok(Opcode::ActiveSource),
            0x83 => Ok(Opcode::GivePhysicalAddress),
            0x84 => Ok(Opcode::ReportPhysicalAddress),
            0x86 => Ok(Opcode::SetStreamPath),
            0x87 => Ok(Opcode::DeviceVendorId),
            0x8C => Ok(Opcode::GiveDeviceVendorId),
            0xA3 => Ok(Opcode::ReportShortAudioDescriptor),
            0xA4 => Ok(Opcode::RequestShortAudioDescriptor),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_try_from_roundtrips_known_values() {
        for op in [
            Opcode::FeatureAbort,
            Opcode::GiveOsdName,
            Opcode::SetOsdName,
            Opcode::RoutingChange,
            Opcode::ActiveSource,
            Opcode::GivePhysicalAddress,
            Opcode::ReportPhysicalAddress,
            Opcode::SetStreamPath,
            Opcode::DeviceVendorId,
            Opcode::GiveDeviceVendorId,
            Opcode::ReportShortAudioDescriptor,
            Opcode::RequestShortAudioDescriptor,
        ] {
            assert_eq!(Opcode::try_from(op as u8), Ok(op));
        }
    }

    #[test]
    fn test_opcode_try_from_rejects_unknown_value() {
        assert_eq!(Opcode::try_from(0x99), Err(0x99));
    }
}
