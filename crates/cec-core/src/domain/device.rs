//! Immutable snapshot of a fully discovered peer device.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::address::{DeviceType, LogicalAddress, PhysicalAddress, PortId};

/// Everything the engine learned about one peer during a discovery run.
///
/// Exported exactly once per peer, when its per-device negotiation reaches the
/// terminal stage.  Fields that a peer rejected or garbled hold their
/// documented fallbacks (`PhysicalAddress::INVALID`, `VENDOR_ID_UNKNOWN`, a
/// type-derived display name) rather than being absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    /// The peer's bus address; unique within one discovery run.
    pub logical_address: LogicalAddress,
    /// Reported topology position, or [`PhysicalAddress::INVALID`].
    pub physical_address: PhysicalAddress,
    /// Input port derived from the physical address via the topology
    /// collaborator, when one matches.
    pub port_id: Option<PortId>,
    /// Device type from the physical-address report, if that stage yielded
    /// a well-formed payload.
    pub device_type: Option<DeviceType>,
    /// 24-bit vendor id, or [`crate::domain::address::VENDOR_ID_UNKNOWN`].
    pub vendor_id: u32,
    /// Display name; never empty (falls back to a type-derived default).
    pub osd_name: String,
}

impl fmt::Display for DeviceSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @{} (pa {}, vendor {:06X})",
            self.osd_name, self.logical_address, self.physical_address, self.vendor_id
        )
    }
}
