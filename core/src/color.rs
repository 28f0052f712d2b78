//! BT.601 colour conversions and ARGB packing

use crate::OPAQUE_BLACK;

#[inline]
pub fn clamp_u8(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

#[inline]
pub fn unpack_rgb(pixel: u32) -> (u8, u8, u8) {
    (
        ((pixel >> 16) & 0xFF) as u8,
        ((pixel >> 8) & 0xFF) as u8,
        (pixel & 0xFF) as u8,
    )
}

#[inline]
pub fn pack_argb(r: u8, g: u8, b: u8) -> u32 {
    OPAQUE_BLACK | ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    clamp_u8((0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32) as i32)
}

/// Blue-difference chroma, `y` being the already-quantised luma of the pixel
pub fn chroma_blue(b: u8, y: u8) -> u8 {
    clamp_u8((128.0 + 0.564 * (b as f32 - y as f32)) as i32)
}

/// Red-difference chroma, `y` being the already-quantised luma of the pixel
pub fn chroma_red(r: u8, y: u8) -> u8 {
    clamp_u8((128.0 + 0.713 * (r as f32 - y as f32)) as i32)
}

/// Inverse transform back to a packed, opaque ARGB pixel
pub fn ycbcr_to_argb(y: u8, cb: u8, cr: u8) -> u32 {
    let y = y as f32;
    let cb = cb as f32 - 128.0;
    let cr = cr as f32 - 128.0;

    let r = y + 1.403 * cr;
    let g = y - 0.714 * cr - 0.344 * cb;
    let b = y + 1.773 * cb;

    pack_argb(clamp_u8(r as i32), clamp_u8(g as i32), clamp_u8(b as i32))
}
