//! Decoded raster images

use crate::error::{Error, Result};
use crate::pipeline::OutputKind;

use super::convert;

/// Planar 4:2:0 YCbCr image.
///
/// Chroma planes are subsampled by two in both directions, rounding up, so a
/// 5x3 image carries 3x2 chroma samples. Rows may be padded: `y_stride` and
/// `c_stride` give the distance in bytes between the starts of two rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YCbCrImage {
    width: u32,
    height: u32,
    y: Vec<u8>,
    cb: Vec<u8>,
    cr: Vec<u8>,
    y_stride: usize,
    c_stride: usize,
}

impl YCbCrImage {
    /// Create a tightly packed image filled with a single colour
    pub fn filled(width: u32, height: u32, y: u8, cb: u8, cr: u8) -> Self {
        let (w, h) = (width as usize, height as usize);
        let (cw, ch) = chroma_dims(width, height);
        Self {
            width,
            height,
            y: vec![y; w * h],
            cb: vec![cb; cw * ch],
            cr: vec![cr; cw * ch],
            y_stride: w,
            c_stride: cw,
        }
    }

    /// Build an image from existing planes, validating their sizes
    pub fn from_planes(
        width: u32,
        height: u32,
        y: Vec<u8>,
        y_stride: usize,
        cb: Vec<u8>,
        cr: Vec<u8>,
        c_stride: usize,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidFrame(format!(
                "empty dimensions {width}x{height}"
            )));
        }
        let (cw, ch) = chroma_dims(width, height);
        check_plane("Y", &y, y_stride, width as usize, height as usize)?;
        check_plane("Cb", &cb, c_stride, cw, ch)?;
        check_plane("Cr", &cr, c_stride, cw, ch)?;

        Ok(Self {
            width,
            height,
            y,
            cb,
            cr,
            y_stride,
            c_stride,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn y(&self) -> &[u8] {
        &self.y
    }

    pub fn cb(&self) -> &[u8] {
        &self.cb
    }

    pub fn cr(&self) -> &[u8] {
        &self.cr
    }

    pub fn y_stride(&self) -> usize {
        self.y_stride
    }

    pub fn c_stride(&self) -> usize {
        self.c_stride
    }

    /// Sample the (Y, Cb, Cr) triple covering pixel (x, y)
    pub fn sample(&self, x: u32, y: u32) -> (u8, u8, u8) {
        let (x, y) = (x as usize, y as usize);
        let yi = y * self.y_stride + x;
        let ci = (y / 2) * self.c_stride + x / 2;
        (self.y[yi], self.cb[ci], self.cr[ci])
    }

    /// Total bytes held by the three planes
    pub fn size(&self) -> usize {
        self.y.len() + self.cb.len() + self.cr.len()
    }

    pub fn to_rgba(&self) -> RgbaImage {
        convert::ycbcr_to_rgba(self)
    }
}

/// Packed 8-bit RGBA image, rows stored back to back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RgbaImage {
    /// Image without pixels, for zero-area frames
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: Vec::new(),
        }
    }

    pub fn from_pixels(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(Error::InvalidFrame(format!(
                "expected {expected} RGBA bytes for {width}x{height}, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.width as usize * 4
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = y as usize * self.stride() + x as usize * 4;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    pub fn size(&self) -> usize {
        self.pixels.len()
    }
}

/// A decoded frame in one of the supported output representations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedFrame {
    YCbCr(YCbCrImage),
    Rgba(RgbaImage),
}

impl DecodedFrame {
    /// Represent a freshly decoded image as the requested output kind
    pub fn from_image(image: YCbCrImage, kind: OutputKind) -> Self {
        match kind {
            OutputKind::YCbCr => DecodedFrame::YCbCr(image),
            OutputKind::Rgba => DecodedFrame::Rgba(image.to_rgba()),
        }
    }

    pub fn kind(&self) -> OutputKind {
        match self {
            DecodedFrame::YCbCr(_) => OutputKind::YCbCr,
            DecodedFrame::Rgba(_) => OutputKind::Rgba,
        }
    }

    pub fn width(&self) -> u32 {
        match self {
            DecodedFrame::YCbCr(img) => img.width(),
            DecodedFrame::Rgba(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            DecodedFrame::YCbCr(img) => img.height(),
            DecodedFrame::Rgba(img) => img.height(),
        }
    }

    pub fn size(&self) -> usize {
        match self {
            DecodedFrame::YCbCr(img) => img.size(),
            DecodedFrame::Rgba(img) => img.size(),
        }
    }
}

/// Chroma plane dimensions for a 4:2:0 image
pub fn chroma_dims(width: u32, height: u32) -> (usize, usize) {
    (width.div_ceil(2) as usize, height.div_ceil(2) as usize)
}

fn check_plane(name: &str, data: &[u8], stride: usize, width: usize, height: usize) -> Result<()> {
    if stride < width {
        return Err(Error::InvalidFrame(format!(
            "{name} stride {stride} shorter than row width {width}"
        )));
    }
    let needed = stride * (height - 1) + width;
    if data.len() < needed {
        return Err(Error::InvalidFrame(format!(
            "{name} plane holds {} bytes, need {needed}",
            data.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_odd_dimensions_round_chroma_up() {
        let img = YCbCrImage::filled(5, 3, 16, 128, 128);
        assert_eq!(img.y().len(), 15);
        assert_eq!(img.cb().len(), 6);
        assert_eq!(img.c_stride(), 3);
        assert_eq!(img.size(), 27);
    }

    #[test]
    fn test_from_planes_validation() {
        // Padded rows are accepted
        let ok = YCbCrImage::from_planes(2, 2, vec![0; 8], 4, vec![0; 1], vec![0; 1], 1);
        assert!(ok.is_ok());

        // Stride shorter than width
        let err = YCbCrImage::from_planes(4, 2, vec![0; 8], 3, vec![0; 2], vec![0; 2], 2);
        assert!(matches!(err, Err(Error::InvalidFrame(_))));

        // Chroma plane too small
        let err = YCbCrImage::from_planes(4, 4, vec![0; 16], 4, vec![0; 3], vec![0; 4], 2);
        assert!(matches!(err, Err(Error::InvalidFrame(_))));

        // Zero size
        let err = YCbCrImage::from_planes(0, 4, vec![], 0, vec![], vec![], 0);
        assert!(matches!(err, Err(Error::InvalidFrame(_))));
    }

    #[test]
    fn test_sample_uses_shared_chroma() {
        let mut cb = vec![0u8; 4];
        cb[3] = 200;
        let img =
            YCbCrImage::from_planes(4, 4, (0..16).collect(), 4, cb, vec![128; 4], 2).unwrap();
        assert_eq!(img.sample(3, 3), (15, 200, 128));
        assert_eq!(img.sample(2, 2), (10, 200, 128));
        assert_eq!(img.sample(1, 1), (5, 0, 128));
    }

    #[test]
    fn test_decoded_frame_tagging() {
        let img = YCbCrImage::filled(4, 2, 128, 128, 128);
        let ycbcr = DecodedFrame::from_image(img.clone(), OutputKind::YCbCr);
        assert_eq!(ycbcr.kind(), OutputKind::YCbCr);
        assert_eq!(ycbcr.size(), 12);

        let rgba = DecodedFrame::from_image(img, OutputKind::Rgba);
        assert_eq!(rgba.kind(), OutputKind::Rgba);
        assert_eq!((rgba.width(), rgba.height()), (4, 2));
        assert_eq!(rgba.size(), 32);
    }

    #[test]
    fn test_rgba_from_pixels_length_check() {
        assert!(RgbaImage::from_pixels(2, 2, vec![0; 16]).is_ok());
        assert!(RgbaImage::from_pixels(2, 2, vec![0; 15]).is_err());
    }
}
