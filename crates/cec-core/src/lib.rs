//! # cec-core
//!
//! Shared library for the CEC bus negotiation engine containing the wire
//! codec, opcode table, and bus domain types.
//!
//! This crate is used by the engine and by anything that needs to speak the
//! frame format (test harnesses, scripted peers).  It has zero dependencies
//! on sockets, timers, or async runtimes.
//!
//! - **`protocol`** – How bytes travel on the shared bus.  A frame is one
//!   header byte (source nibble, destination nibble), one opcode byte, and
//!   up to 14 parameter bytes.  Payload fields are big-endian.
//!
//! - **`domain`** – Pure addressing and entity types: 4-bit logical
//!   addresses, 16-bit physical (topology) addresses, device types, and the
//!   immutable snapshot exported for each discovered device.

pub mod domain;
pub mod protocol;

pub use domain::address::{
    AddressError, DeviceType, LogicalAddress, PhysicalAddress, PortId, VENDOR_ID_UNKNOWN,
};
pub use domain::device::DeviceSnapshot;
pub use protocol::audio::{
    encode_descriptor, AudioFormat, CodecSupport, ShortAudioDescriptor, CANDIDATE_FORMATS,
};
pub use protocol::codec::{decode_frame, encode_frame, FrameError};
pub use protocol::frame::{AbortReason, CecFrame, MAX_PARAMS};
pub use protocol::opcode::Opcode;
