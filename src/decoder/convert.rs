//! Colour space conversion for decoded frames
//!
//! Decoders hand out full-range (JFIF) BT.601 YCbCr. Conversion uses 16.16
//! fixed point so the output is identical on every platform.

use super::frame::{RgbaImage, YCbCrImage};

const FIX_CR_R: i32 = 91_881; // 1.402
const FIX_CB_G: i32 = 22_554; // 0.344136
const FIX_CR_G: i32 = 46_802; // 0.714136
const FIX_CB_B: i32 = 116_130; // 1.772
const HALF: i32 = 1 << 15;

/// Convert a single YCbCr triple to RGB
#[inline]
pub fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> [u8; 3] {
    let luma = (i32::from(y) << 16) + HALF;
    let cb = i32::from(cb) - 128;
    let cr = i32::from(cr) - 128;

    let r = luma + FIX_CR_R * cr;
    let g = luma - FIX_CB_G * cb - FIX_CR_G * cr;
    let b = luma + FIX_CB_B * cb;

    [clamp(r), clamp(g), clamp(b)]
}

#[inline]
fn clamp(v: i32) -> u8 {
    (v >> 16).clamp(0, 255) as u8
}

/// Convert a 4:2:0 image into packed RGBA with opaque alpha
pub fn ycbcr_to_rgba(img: &YCbCrImage) -> RgbaImage {
    let (w, h) = (img.width() as usize, img.height() as usize);
    if w == 0 || h == 0 {
        return RgbaImage::empty(img.width(), img.height());
    }
    let mut pixels = vec![0u8; w * h * 4];

    for (row, out_row) in pixels.chunks_exact_mut(w * 4).enumerate() {
        let y_row = &img.y()[row * img.y_stride()..row * img.y_stride() + w];
        let c_start = (row / 2) * img.c_stride();
        let cb_row = &img.cb()[c_start..];
        let cr_row = &img.cr()[c_start..];

        for (col, px) in out_row.chunks_exact_mut(4).enumerate() {
            let [r, g, b] = ycbcr_to_rgb(y_row[col], cb_row[col / 2], cr_row[col / 2]);
            px.copy_from_slice(&[r, g, b, 255]);
        }
    }

    // Dimensions always match the buffer allocated above
    RgbaImage::from_pixels(img.width(), img.height(), pixels)
        .unwrap_or_else(|_| unreachable!("RGBA buffer sized from image dimensions"))
}
