//! Audio capability descriptors exchanged during format negotiation.
//!
//! A capability reply carries zero or more *short audio descriptors* (SADs),
//! the 3-byte records defined by EDID:
//!
//! ```text
//! byte 0: bit 7 reserved | bits 6..3 format code | bits 2..0 max channels - 1
//! byte 1: sample-rate mask (bit 0 = 32 kHz, bit 1 = 44.1 kHz, bit 2 = 48 kHz, ...)
//! byte 2: bit-rate / bit-depth byte (format dependent; bit 0 = 16-bit for LPCM)
//! ```

use serde::{Deserialize, Serialize};

/// Audio format codes the engine negotiates for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AudioFormat {
    /// Linear PCM: the reserved always-available baseline candidate.
    Lpcm = 1,
    Ac3 = 2,
    Aac = 6,
    Dts = 7,
}

/// The fixed candidate list sent in a capability request, priority order.
/// LPCM first: it is the baseline that survives a rejected negotiation.
pub const CANDIDATE_FORMATS: [AudioFormat; 4] = [
    AudioFormat::Lpcm,
    AudioFormat::Ac3,
    AudioFormat::Dts,
    AudioFormat::Aac,
];

/// One parsed 3-byte short audio descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortAudioDescriptor {
    /// Raw 4-bit format code (not necessarily one of [`AudioFormat`]).
    pub format_code: u8,
    pub max_channels: u8,
    pub sample_rate_mask: u8,
    pub bitrate_byte: u8,
}

impl ShortAudioDescriptor {
    /// Parses one descriptor from its wire bytes.
    pub fn parse(bytes: [u8; 3]) -> Self {
        ShortAudioDescriptor {
            format_code: (bytes[0] >> 3) & 0x0F,
            max_channels: (bytes[0] & 0x07) + 1,
            sample_rate_mask: bytes[1],
            bitrate_byte: bytes[2],
        }
    }

    /// Scans a raw descriptor block in 3-byte strides for the first entry
    /// matching `format`.  A trailing partial descriptor is ignored.
    pub fn find_for_format(payload: &[u8], format: AudioFormat) -> Option<ShortAudioDescriptor> {
        payload
            .chunks_exact(3)
            .map(|c| ShortAudioDescriptor::parse([c[0], c[1], c[2]]))
            .find(|sad| sad.format_code == format as u8)
    }
}

/// Synthesized per-candidate support record applied to the audio-routing
/// consumer after a negotiation finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecSupport {
    pub format: AudioFormat,
    pub supported: bool,
    pub max_channels: u8,
    pub sample_rate_mask: u8,
    pub bitrate_byte: u8,
}

impl CodecSupport {
    /// The minimal LPCM profile assumed when no capability payload exists:
    /// 2 channels, 32/44.1/48 kHz, 16-bit.
    pub const fn baseline_lpcm() -> Self {
        CodecSupport {
            format: AudioFormat::Lpcm,
            supported: true,
            max_channels: 2,
            sample_rate_mask: 0x07,
            bitrate_byte: 0x01,
        }
    }

    /// An unsupported record for `format`.
    pub const fn unsupported(format: AudioFormat) -> Self {
        CodecSupport {
            format,
            supported: false,
            max_channels: 0,
            sample_rate_mask: 0,
            bitrate_byte: 0,
        }
    }

    /// A supported record populated from a parsed descriptor.
    pub const fn from_descriptor(format: AudioFormat, sad: ShortAudioDescriptor) -> Self {
        CodecSupport {
            format,
            supported: true,
            max_channels: sad.max_channels,
            sample_rate_mask: sad.sample_rate_mask,
            bitrate_byte: sad.bitrate_byte,
        }
    }
}

/// Builds the raw wire bytes of a descriptor, for tests and scripted peers.
pub fn encode_descriptor(
    format: AudioFormat,
    max_channels: u8,
    sample_rate_mask: u8,
    bitrate_byte: u8,
) -> [u8; 3] {
    [
        ((format as u8) << 3) | ((max_channels.saturating_sub(1)) & 0x07),
        sample_rate_mask,
        bitrate_byte,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extracts_format_channels_and_masks() {
        // LPCM, 2 channels, 32/44.1/48 kHz, 16-bit
        let sad = ShortAudioDescriptor::parse([0x09, 0x07, 0x01]);
        assert_eq!(sad.format_code, AudioFormat::Lpcm as u8);
        assert_eq!(sad.max_channels, 2);
        assert_eq!(sad.sample_rate_mask, 0x07);
        assert_eq!(sad.bitrate_byte, 0x01);
    }

    #[test]
    fn test_encode_descriptor_roundtrips_through_parse() {
        let bytes = encode_descriptor(AudioFormat::Dts, 6, 0x7F, 0x4A);
        let sad = ShortAudioDescriptor::parse(bytes);
        assert_eq!(sad.format_code, AudioFormat::Dts as u8);
        assert_eq!(sad.max_channels, 6);
        assert_eq!(sad.sample_rate_mask, 0x7F);
        assert_eq!(sad.bitrate_byte, 0x4A);
    }

    #[test]
    fn test_find_for_format_scans_in_three_byte_strides() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&encode_descriptor(AudioFormat::Ac3, 6, 0x07, 0x50));
        payload.extend_from_slice(&encode_descriptor(AudioFormat::Lpcm, 2, 0x07, 0x01));

        let found = ShortAudioDescriptor::find_for_format(&payload, AudioFormat::Lpcm)
            .expect("LPCM descriptor present");
        assert_eq!(found.max_channels, 2);
        assert!(ShortAudioDescriptor::find_for_format(&payload, AudioFormat::Dts).is_none());
    }

    #[test]
    fn test_find_for_format_ignores_trailing_partial_descriptor() {
        let mut payload = encode_descriptor(AudioFormat::Ac3, 6, 0x07, 0x50).to_vec();
        payload.push(0x09); // dangling first byte of an LPCM descriptor
        assert!(ShortAudioDescriptor::find_for_format(&payload, AudioFormat::Lpcm).is_none());
    }

    #[test]
    fn test_baseline_lpcm_is_minimal_supported_profile() {
        let baseline = CodecSupport::baseline_lpcm();
        assert!(baseline.supported);
        assert_eq!(baseline.format, AudioFormat::Lpcm);
        assert_eq!(baseline.max_channels, 2);
        assert_eq!(baseline.sample_rate_mask, 0x07);
        assert_eq!(baseline.bitrate_byte, 0x01);
    }

    #[test]
    fn test_candidate_list_starts_with_the_baseline() {
        assert_eq!(CANDIDATE_FORMATS[0], AudioFormat::Lpcm);
        assert_eq!(CANDIDATE_FORMATS.len(), 4);
    }
}
