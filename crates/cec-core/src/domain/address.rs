//! Logical and physical addressing for the shared control bus.
//!
//! Every device on the bus owns a *logical address*, a 4-bit integer that
//! identifies its role (TV, playback device, audio system, ...).  Logical
//! address 15 is reserved for broadcast.  Independently, each device carries a
//! *physical address*: a 16-bit nibble path describing where it sits in the
//! port topology (e.g. `1.2.0.0` = port 2 of the device on port 1 of the
//! root).  Which input port a physical address maps to is decided by the
//! topology collaborator, not by this crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Identifier of an input port on the owning device.
pub type PortId = u8;

/// Sentinel meaning "vendor id not reported / not known" (3-byte field, all ones).
pub const VENDOR_ID_UNKNOWN: u32 = 0xFF_FFFF;

/// Error type for address construction and device-type parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    /// The raw value does not fit in the 4-bit logical address space.
    #[error("logical address out of range: {0} (valid: 0-15)")]
    LogicalOutOfRange(u8),
    /// The raw byte is not a known device type.
    #[error("unknown device type: {0}")]
    UnknownDeviceType(u8),
}

// ── Logical address ───────────────────────────────────────────────────────────

/// A 4-bit bus address.  0-14 identify devices; 15 is broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8")]
pub struct LogicalAddress(u8);

impl LogicalAddress {
    /// The reserved broadcast destination.
    pub const BROADCAST: LogicalAddress = LogicalAddress(0xF);
    /// Well-known address of the display device.
    pub const TV: LogicalAddress = LogicalAddress(0);
    /// Well-known address of the audio system (AVR / soundbar).
    pub const AUDIO_SYSTEM: LogicalAddress = LogicalAddress(5);

    /// Creates a logical address, rejecting values outside the 4-bit range.
    pub fn new(raw: u8) -> Result<Self, AddressError> {
        if raw > 0xF {
            return Err(AddressError::LogicalOutOfRange(raw));
        }
        Ok(LogicalAddress(raw))
    }

    /// Returns the raw nibble value.
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Returns `true` for the reserved broadcast address.
    pub const fn is_broadcast(self) -> bool {
        self.0 == 0xF
    }

    /// Returns `true` for an address that can belong to a device (0-14).
    pub const fn is_device(self) -> bool {
        self.0 < 0xF
    }

    /// All addressable device addresses (0-14), in ascending order.
    ///
    /// The iterator is double-ended so callers can poll in reverse.
    pub fn device_range() -> impl DoubleEndedIterator<Item = LogicalAddress> {
        (0u8..=14).map(LogicalAddress)
    }
}

// Deserialisation funnels through the same range check as `new`.
impl TryFrom<u8> for LogicalAddress {
    type Error = AddressError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        LogicalAddress::new(value)
    }
}

impl fmt::Display for LogicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0)
    }
}

// ── Physical address ──────────────────────────────────────────────────────────

/// A 16-bit topology position, 2 bytes big-endian on the wire.
///
/// `0xFFFF` is the "unknown / not yet reported" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhysicalAddress(u16);

impl PhysicalAddress {
    /// Sentinel for an address that has not been reported yet.
    pub const INVALID: PhysicalAddress = PhysicalAddress(0xFFFF);
    /// The root of the topology (the display device itself).
    pub const ROOT: PhysicalAddress = PhysicalAddress(0x0000);

    /// Wraps a raw 16-bit value.  All values are representable; `0xFFFF`
    /// compares equal to [`PhysicalAddress::INVALID`].
    pub const fn new(raw: u16) -> Self {
        PhysicalAddress(raw)
    }

    /// Returns the raw 16-bit value.
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Returns `true` unless this is the unknown sentinel.
    pub const fn is_valid(self) -> bool {
        self.0 != 0xFFFF
    }

    /// Big-endian wire representation.
    pub const fn to_be_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    /// Parses the big-endian wire representation.
    pub const fn from_be_bytes(bytes: [u8; 2]) -> Self {
        PhysicalAddress(u16::from_be_bytes(bytes))
    }
}

impl fmt::Display for PhysicalAddress {
    /// Formats as the conventional dotted nibble path, e.g. `1.2.0.0`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            (self.0 >> 12) & 0xF,
            (self.0 >> 8) & 0xF,
            (self.0 >> 4) & 0xF,
            self.0 & 0xF
        )
    }
}

// ── Device type ───────────────────────────────────────────────────────────────

/// Device type codes carried in the physical-address report payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DeviceType {
    Tv = 0,
    Recorder = 1,
    Tuner = 3,
    Playback = 4,
    AudioSystem = 5,
    Switch = 6,
}

impl DeviceType {
    /// Display-name fallback used when a peer rejects or garbles the
    /// name query: a readable label derived from the type alone.
    pub const fn default_osd_name(self) -> &'static str {
        match self {
            DeviceType::Tv => "TV",
            DeviceType::Recorder => "Recorder",
            DeviceType::Tuner => "Tuner",
            DeviceType::Playback => "Playback",
            DeviceType::AudioSystem => "Audio System",
            DeviceType::Switch => "Switch",
        }
    }
}

impl TryFrom<u8> for DeviceType {
    type Error = AddressError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DeviceType::Tv),
            1 => Ok(DeviceType::Recorder),
            3 => Ok(DeviceType::Tuner),
            4 => Ok(DeviceType::Playback),
            5 => Ok(DeviceType::AudioSystem),
            6 => Ok(DeviceType::Switch),
            other => Err(AddressError::UnknownDeviceType(other)),
        }
    }
}
