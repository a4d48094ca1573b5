//! Keyframe detection
//!
//! Decoding can only start on a unit that carries its own reference state.
//! The gate inspects the codec-specific marker of a payload without decoding
//! it; the decoder stage consults it only until the first keyframe arrives.

use super::types::SampleType;

/// Decides whether a payload of the configured kind is a keyframe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyframeGate {
    kind: SampleType,
}

impl KeyframeGate {
    pub fn new(kind: SampleType) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> SampleType {
        self.kind
    }

    pub fn is_keyframe(&self, payload: &[u8]) -> bool {
        is_keyframe(self.kind, payload)
    }
}

/// Return true if `payload` is a keyframe for `kind`.
///
/// Empty payloads and non-video kinds are never keyframes.
pub fn is_keyframe(kind: SampleType, payload: &[u8]) -> bool {
    match kind {
        SampleType::Vp8 => vp8_is_keyframe(payload),
        SampleType::Vp9 => vp9_is_keyframe(payload),
        SampleType::H264 => au_contains_idr_or_sps(payload),
        SampleType::Opus => false,
    }
}

/// VP8 frame tag: bit 0 of the first byte is 0 for key frames.
fn vp8_is_keyframe(payload: &[u8]) -> bool {
    payload.first().is_some_and(|b| b & 0x1 == 0)
}

/// VP9 uncompressed header: frame_marker(2) profile(2) [reserved(1) if
/// profile 3] show_existing_frame(1) frame_type(1), MSB first.
fn vp9_is_keyframe(payload: &[u8]) -> bool {
    let Some(&b) = payload.first() else {
        return false;
    };
    let bit = |n: u8| (b >> (7 - n)) & 1;

    if b >> 6 != 0b10 {
        return false;
    }
    let profile = bit(2) | (bit(3) << 1);
    let next = if profile == 3 { 5 } else { 4 };

    let show_existing_frame = bit(next);
    let frame_type = bit(next + 1);
    show_existing_frame == 0 && frame_type == 0
}

/// Return true if the H.264 access unit contains an IDR (nal type 5) or SPS/PPS (7/8).
fn au_contains_idr_or_sps(au: &[u8]) -> bool {
    const START_CODE: [u8; 3] = [0, 0, 1];
    let mut i = 0usize;
    while i + 3 <= au.len() {
        // Accept both 3 and 4 byte start codes
        if au[i..i + 3] == START_CODE {
            let nal_start = i + 3;
            if nal_start >= au.len() {
                break;
            }
            let nal_type = au[nal_start] & 0x1F;
            if nal_type == 5 || nal_type == 7 || nal_type == 8 {
                return true;
            }
            i = nal_start;
        } else {
            i += 1;
        }
    }
    false
}
