//! Minimal IVF container reader
//!
//! IVF is the raw VP8/VP9 container written by libvpx tools: a 32 byte file
//! header followed by frames, each prefixed with a 12 byte header holding the
//! payload length and presentation timestamp. All integers are little endian.

use anyhow::{Context, bail};
use std::io::{ErrorKind, Read};
use std::time::Duration;

use crate::pipeline::{EncodedUnit, SampleType};

const SIGNATURE: &[u8; 4] = b"DKIF";
const HEADER_LEN: usize = 32;
const FRAME_HEADER_LEN: usize = 12;
/// Upper bound on a single frame, guards against corrupt length fields
const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// File-level information from the IVF header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IvfHeader {
    pub fourcc: [u8; 4],
    pub width: u16,
    pub height: u16,
    /// Time base denominator
    pub rate: u32,
    /// Time base numerator
    pub scale: u32,
    pub frame_count: u32,
}

impl IvfHeader {
    fn parse(buf: &[u8; HEADER_LEN]) -> anyhow::Result<Self> {
        if &buf[0..4] != SIGNATURE {
            bail!("not an IVF file (bad signature)");
        }
        let header_len = u16::from_le_bytes([buf[6], buf[7]]) as usize;
        if header_len != HEADER_LEN {
            bail!("unsupported IVF header length {}", header_len);
        }

        Ok(Self {
            fourcc: [buf[8], buf[9], buf[10], buf[11]],
            width: u16::from_le_bytes([buf[12], buf[13]]),
            height: u16::from_le_bytes([buf[14], buf[15]]),
            rate: u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]),
            scale: u32::from_le_bytes([buf[20], buf[21], buf[22], buf[23]]),
            frame_count: u32::from_le_bytes([buf[24], buf[25], buf[26], buf[27]]),
        })
    }

    /// Codec named by the fourcc, if supported
    pub fn sample_type(&self) -> Option<SampleType> {
        match &self.fourcc {
            b"VP80" => Some(SampleType::Vp8),
            b"VP90" => Some(SampleType::Vp9),
            b"H264" | b"AVC1" => Some(SampleType::H264),
            _ => None,
        }
    }

    pub fn fourcc_str(&self) -> String {
        String::from_utf8_lossy(&self.fourcc).into_owned()
    }

    /// Nominal frame rate, when the header carries a usable time base
    pub fn frame_rate(&self) -> Option<f32> {
        if self.rate == 0 || self.scale == 0 {
            return None;
        }
        Some(self.rate as f32 / self.scale as f32)
    }

    /// Nominal distance between two frames, `None` when it rounds to zero
    pub fn frame_interval(&self) -> Option<Duration> {
        self.frame_rate()
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .map(|fps| Duration::from_secs_f32(1.0 / fps))
            .filter(|interval| !interval.is_zero())
    }
}

/// One compressed frame read from an IVF stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IvfFrame {
    pub pts: u64,
    pub data: Vec<u8>,
}

impl IvfFrame {
    pub fn into_unit(self, kind: SampleType) -> EncodedUnit {
        EncodedUnit::new(kind, self.data)
    }
}

/// Sequential reader over an IVF stream
pub struct IvfReader<R: Read> {
    inner: R,
    header: IvfHeader,
    frames_read: u64,
}

impl<R: Read> IvfReader<R> {
    /// Read and validate the file header
    pub fn new(mut inner: R) -> anyhow::Result<Self> {
        let mut buf = [0u8; HEADER_LEN];
        inner
            .read_exact(&mut buf)
            .context("failed to read IVF header")?;
        let header = IvfHeader::parse(&buf)?;

        Ok(Self {
            inner,
            header,
            frames_read: 0,
        })
    }

    pub fn header(&self) -> &IvfHeader {
        &self.header
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Read the next frame, `None` at a clean end of stream
    pub fn next_frame(&mut self) -> anyhow::Result<Option<IvfFrame>> {
        let mut frame_header = [0u8; FRAME_HEADER_LEN];
        match self.inner.read_exact(&mut frame_header) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e).context("failed to read IVF frame header"),
        }

        let len = u32::from_le_bytes([
            frame_header[0],
            frame_header[1],
            frame_header[2],
            frame_header[3],
        ]) as usize;
        let mut pts_bytes = [0u8; 8];
        pts_bytes.copy_from_slice(&frame_header[4..12]);
        let pts = u64::from_le_bytes(pts_bytes);

        if len > MAX_FRAME_LEN {
            bail!("IVF frame {} too large ({} bytes)", self.frames_read, len);
        }

        let mut data = vec![0u8; len];
        self.inner
            .read_exact(&mut data)
            .with_context(|| format!("truncated IVF frame {}", self.frames_read))?;
        self.frames_read += 1;

        Ok(Some(IvfFrame { pts, data }))
    }
}

impl<R: Read> Iterator for IvfReader<R> {
    type Item = anyhow::Result<IvfFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}
