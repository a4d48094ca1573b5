use ac_ffmpeg::codec::Decoder;
use ac_ffmpeg::codec::video::{VideoDecoder, VideoFrame};
use ac_ffmpeg::packet::PacketMut;
use ac_ffmpeg::time::{TimeBase, Timestamp};
use ac_ffmpeg::codec::CodecError;
use anyhow::{Context, anyhow, bail};
use log::{debug, warn};

use super::{CodecContext, YCbCrImage, chroma_dims};
use crate::pipeline::SampleType;

/// Codec context backed by an FFmpeg video decoder.
///
/// The FFmpeg decoder is only built in `initialize`, so constructing a
/// context is cheap and cannot fail. Output is expected in a 4:2:0 planar
/// layout, which is what the VP8/VP9/H.264 software decoders produce.
///
/// Encoded units are never dropped. When the decoder's output queue is full
/// the undelivered frames are taken out, the newest is kept for
/// `next_frame`, and the unit is pushed again.
pub struct FfmpegContext {
    kind: SampleType,
    decoder: Option<VideoDecoder>,
    pending: Option<YCbCrImage>,
    frame_count: i64,
}

unsafe impl Send for FfmpegContext {}

impl FfmpegContext {
    pub fn new(kind: SampleType) -> Self {
        Self {
            kind,
            decoder: None,
            pending: None,
            frame_count: 0,
        }
    }

    #[inline]
    fn next_pts(&mut self) -> Timestamp {
        self.frame_count += 1;
        Timestamp::new(self.frame_count, TimeBase::new(1, 90_000))
    }
}

impl CodecContext for FfmpegContext {
    fn initialize(&mut self) -> anyhow::Result<()> {
        if !self.kind.is_video() {
            bail!("{} is not a video codec", self.kind);
        }
        let decoder = VideoDecoder::builder(self.kind.codec_name())
            .with_context(|| format!("no FFmpeg decoder for {}", self.kind))?
            .time_base(TimeBase::new(1, 90_000))
            .build()
            .with_context(|| format!("failed to open {} decoder", self.kind))?;
        self.decoder = Some(decoder);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.decoder.is_some()
    }

    fn decode(&mut self, payload: &[u8]) -> anyhow::Result<()> {
        let pts = self.next_pts();
        let frame_count = self.frame_count;
        let Some(decoder) = self.decoder.as_mut() else {
            bail!("decoder used before initialization");
        };
        let pending = &mut self.pending;
        let mut replaced = 0u64;

        push_or_drain(
            decoder,
            |d: &mut VideoDecoder| d.try_push(PacketMut::from(payload).with_pts(pts).freeze()),
            CodecError::is_again,
            |d: &mut VideoDecoder| {
                while let Some(img) = take_image(d) {
                    if pending.replace(img).is_some() {
                        replaced += 1;
                    }
                }
            },
        )
        .map_err(|e| anyhow!("decoder refused packet {}: {}", frame_count, e))?;

        if replaced > 0 {
            debug!(
                "FfmpegContext: output queue full, replaced {} undelivered frames",
                replaced
            );
        }
        Ok(())
    }

    fn next_frame(&mut self) -> Option<YCbCrImage> {
        if let Some(img) = self.pending.take() {
            return Some(img);
        }
        take_image(self.decoder.as_mut()?)
    }
}

/// Push into a decoder, making room and retrying once if it asks to be drained
fn push_or_drain<D, E>(
    decoder: &mut D,
    mut push: impl FnMut(&mut D) -> Result<(), E>,
    is_again: impl Fn(&E) -> bool,
    mut drain: impl FnMut(&mut D),
) -> Result<(), E> {
    match push(decoder) {
        Err(e) if is_again(&e) => {
            drain(decoder);
            push(decoder)
        }
        result => result,
    }
}

/// Take the next decoded frame, skipping frames that cannot be represented
fn take_image(decoder: &mut VideoDecoder) -> Option<YCbCrImage> {
    loop {
        match decoder.take() {
            Ok(Some(frame)) => match to_image(&frame) {
                Ok(img) => return Some(img),
                Err(e) => warn!("FfmpegContext: dropping frame: {:#}", e),
            },
            Ok(None) => return None,
            Err(e) => {
                warn!("FfmpegContext: take() error: {}", e);
                return None;
            }
        }
    }
}

/// Copy the planes of a decoded frame into a tightly packed image
fn to_image(frame: &VideoFrame) -> anyhow::Result<YCbCrImage> {
    let (w, h) = (frame.width(), frame.height());
    let planes = frame.planes();
    if planes.len() < 3 {
        bail!("expected 3 planes, got {}", planes.len());
    }
    let (cw, ch) = chroma_dims(w as u32, h as u32);

    let mut y = vec![0u8; w * h];
    let mut cb = vec![0u8; cw * ch];
    let mut cr = vec![0u8; cw * ch];
    extract_plane(&mut y, planes[0].data(), planes[0].line_size(), w, h);
    extract_plane(&mut cb, planes[1].data(), planes[1].line_size(), cw, ch);
    extract_plane(&mut cr, planes[2].data(), planes[2].line_size(), cw, ch);

    YCbCrImage::from_planes(w as u32, h as u32, y, w, cb, cr, cw)
        .context("decoded frame has inconsistent planes")
}

/// Extract a plane from padded source to contiguous destination.
///
/// - Fast path: No padding -> single memcpy
/// - Fallback: Row-by-row copy
#[inline]
fn extract_plane(dst: &mut [u8], src: &[u8], stride: usize, width: usize, height: usize) {
    let total_src = height * stride;

    if stride == width && src.len() >= total_src {
        dst.copy_from_slice(&src[..width * height]);
        return;
    }

    for r in 0..height {
        let src_start = r * stride;
        let dst_start = r * width;
        if src_start + width > src.len() || dst_start + width > dst.len() {
            break;
        }
        dst[dst_start..dst_start + width].copy_from_slice(&src[src_start..src_start + width]);
    }
}
