//! Pure domain types for the control bus: addressing and the discovered-device
//! snapshot entity.  No I/O, no protocol bytes.

pub mod address;
pub mod device;

pub use address::{
    AddressError, DeviceType, LogicalAddress, PhysicalAddress, PortId, VENDOR_ID_UNKNOWN,
};
pub use device::DeviceSnapshot;
