//! Video decoding module
//!
//! Defines the codec context seam the decoder stage drives, the decoded frame
//! representations, and (with the `ffmpeg` feature) an FFmpeg-backed context.

mod convert;
mod frame;

#[cfg(feature = "ffmpeg")]
mod ffmpeg;

pub use convert::{ycbcr_to_rgb, ycbcr_to_rgba};
pub use frame::{DecodedFrame, RgbaImage, YCbCrImage, chroma_dims};

#[cfg(feature = "ffmpeg")]
pub use ffmpeg::FfmpegContext;

/// Opaque decoding state for a single compressed video stream.
///
/// The decoder stage owns exactly one context and only touches it while
/// holding its exclusion lock, so implementations need not be `Sync`.
/// `initialize` is called at most once, before the first `decode`.
pub trait CodecContext: Send {
    /// Prepare the context for decoding
    fn initialize(&mut self) -> anyhow::Result<()>;

    fn is_initialized(&self) -> bool;

    /// Feed one encoded access unit to the codec
    fn decode(&mut self, payload: &[u8]) -> anyhow::Result<()>;

    /// Take the next decoded frame, if one is ready
    fn next_frame(&mut self) -> Option<YCbCrImage>;
}

impl<C: CodecContext + ?Sized> CodecContext for Box<C> {
    fn initialize(&mut self) -> anyhow::Result<()> {
        (**self).initialize()
    }

    fn is_initialized(&self) -> bool {
        (**self).is_initialized()
    }

    fn decode(&mut self, payload: &[u8]) -> anyhow::Result<()> {
        (**self).decode(payload)
    }

    fn next_frame(&mut self) -> Option<YCbCrImage> {
        (**self).next_frame()
    }
}
