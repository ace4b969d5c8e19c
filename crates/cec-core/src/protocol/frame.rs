//! The bus frame value type and constructors for every operation the
//! engine exchanges.
//!
//! A frame is immutable once built: fields are private and only readable.
//! Constructors that take caller-supplied payload bytes validate the 14-byte
//! parameter limit; fixed-shape constructors are infallible.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::address::{DeviceType, LogicalAddress, PhysicalAddress};
use crate::protocol::audio::AudioFormat;
use crate::protocol::codec::FrameError;
use crate::protocol::opcode::Opcode;

/// Maximum number of parameter bytes a frame may carry.
pub const MAX_PARAMS: usize = 14;

/// Reason byte accompanying a [`Opcode::FeatureAbort`] reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum AbortReason {
    UnrecognizedOpcode = 0,
    NotInCorrectMode = 1,
    CannotProvideSource = 2,
    InvalidOperand = 3,
    Refused = 4,
}

/// One frame on the shared bus: source, destination, opcode, parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CecFrame {
    source: LogicalAddress,
    destination: LogicalAddress,
    opcode: Opcode,
    params: Vec<u8>,
}

impl CecFrame {
    /// Builds a frame from raw parts.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::ParamsTooLong`] when `params` exceeds
    /// [`MAX_PARAMS`] bytes.
    pub fn new(
        source: LogicalAddress,
        destination: LogicalAddress,
        opcode: Opcode,
        params: Vec<u8>,
    ) -> Result<Self, FrameError> {
        if params.len() > MAX_PARAMS {
            return Err(FrameError::ParamsTooLong(params.len()));
        }
        Ok(CecFrame {
            source,
            destination,
            opcode,
            params,
        })
    }

    // Internal constructor for fixed-shape frames whose payload is known to fit.
    fn build(
        source: LogicalAddress,
        destination: LogicalAddress,
        opcode: Opcode,
        params: Vec<u8>,
    ) -> Self {
        debug_assert!(params.len() <= MAX_PARAMS);
        CecFrame {
            source,
            destination,
            opcode,
            params,
        }
    }

    pub const fn source(&self) -> LogicalAddress {
        self.source
    }

    pub const fn destination(&self) -> LogicalAddress {
        self.destination
    }

    pub const fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn params(&self) -> &[u8] {
        &self.params
    }

    /// Returns `true` when this frame is a feature-abort declining `request`.
    pub fn is_feature_abort_for(&self, request: Opcode) -> bool {
        self.opcode == Opcode::FeatureAbort
            && self.params.first().copied() == Some(request as u8)
    }

    // ── Discovery operations ──────────────────────────────────────────────────

    /// Query for the peer's physical address and device type.
    pub fn give_physical_address(source: LogicalAddress, destination: LogicalAddress) -> Self {
        Self::build(source, destination, Opcode::GivePhysicalAddress, Vec::new())
    }

    /// Broadcast report of own physical address and device type.
    pub fn report_physical_address(
        source: LogicalAddress,
        physical_address: PhysicalAddress,
        device_type: DeviceType,
    ) -> Self {
        let pa = physical_address.to_be_bytes();
        Self::build(
            source,
            LogicalAddress::BROADCAST,
            Opcode::ReportPhysicalAddress,
            vec![pa[0], pa[1], device_type as u8],
        )
    }

    /// Query for the peer's display name.
    pub fn give_osd_name(source: LogicalAddress, destination: LogicalAddress) -> Self {
        Self::build(source, destination, Opcode::GiveOsdName, Vec::new())
    }

    /// Directly-addressed display-name report.  The name is carried as raw
    /// US-ASCII bytes.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::ParamsTooLong`] for names over [`MAX_PARAMS`] bytes.
    pub fn set_osd_name(
        source: LogicalAddress,
        destination: LogicalAddress,
        name: &str,
    ) -> Result<Self, FrameError> {
        Self::new(source, destination, Opcode::SetOsdName, name.as_bytes().to_vec())
    }

    /// Query for the peer's vendor id.
    pub fn give_device_vendor_id(source: LogicalAddress, destination: LogicalAddress) -> Self {
        Self::build(source, destination, Opcode::GiveDeviceVendorId, Vec::new())
    }

    /// Broadcast vendor-id report (3 bytes big-endian; upper byte of the
    /// `u32` is discarded).
    pub fn device_vendor_id(source: LogicalAddress, vendor_id: u32) -> Self {
        let b = vendor_id.to_be_bytes();
        Self::build(
            source,
            LogicalAddress::BROADCAST,
            Opcode::DeviceVendorId,
            vec![b[1], b[2], b[3]],
        )
    }

    /// Explicit refusal of `rejected`, with a reason byte.
    pub fn feature_abort(
        source: LogicalAddress,
        destination: LogicalAddress,
        rejected: Opcode,
        reason: AbortReason,
    ) -> Self {
        Self::build(
            source,
            destination,
            Opcode::FeatureAbort,
            vec![rejected as u8, reason as u8],
        )
    }

    // ── Audio capability negotiation ──────────────────────────────────────────

    /// Capability request carrying the candidate format codes in priority
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::ParamsTooLong`] when more candidates are supplied
    /// than fit in one frame.
    pub fn request_short_audio_descriptor(
        source: LogicalAddress,
        destination: LogicalAddress,
        candidates: &[AudioFormat],
    ) -> Result<Self, FrameError> {
        let params: Vec<u8> = candidates.iter().map(|f| *f as u8).collect();
        Self::new(source, destination, Opcode::RequestShortAudioDescriptor, params)
    }

    /// Capability reply carrying raw 3-byte short audio descriptors.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::ParamsTooLong`] when the descriptor block exceeds
    /// one frame.
    pub fn report_short_audio_descriptor(
        source: LogicalAddress,
        destination: LogicalAddress,
        descriptors: Vec<u8>,
    ) -> Result<Self, FrameError> {
        Self::new(source, destination, Opcode::ReportShortAudioDescriptor, descriptors)
    }
}

impl fmt::Display for CecFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{} {:?}", self.source, self.destination, self.opcode)?;
        if !self.params.is_empty() {
            write!(f, " [")?;
            for (i, b) in self.params.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{b:02X}")?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}
