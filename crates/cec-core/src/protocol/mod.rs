//! Wire protocol: frame value type, opcode table, binary codec, and audio
//! capability descriptors.

pub mod audio;
pub mod codec;
pub mod frame;
pub mod opcode;

pub use codec::{decode_frame, encode_frame, FrameError};
pub use frame::{AbortReason, CecFrame, MAX_PARAMS};
pub use opcode::Opcode;
