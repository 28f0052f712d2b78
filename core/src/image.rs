use crate::error::{Result, SstvError};
use crate::{IMAGE_HEIGHT, IMAGE_WIDTH, OPAQUE_BLACK};

/// Borrowed source image for the encoder
///
/// Pixels are packed `0xAARRGGBB` (alpha ignored), row-major, row length = width.
#[derive(Debug, Clone, Copy)]
pub struct RasterImage<'a> {
    width: usize,
    height: usize,
    pixels: &'a [u32],
}

impl<'a> RasterImage<'a> {
    pub fn new(width: usize, height: usize, pixels: &'a [u32]) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(SstvError::InvalidImage(format!(
                "dimensions must be non-zero, got {}x{}",
                width, height
            )));
        }
        let needed = width
            .checked_mul(height)
            .ok_or_else(|| SstvError::InvalidImage("dimensions overflow".into()))?;
        if pixels.len() < needed {
            return Err(SstvError::InvalidImage(format!(
                "{}x{} image needs {} pixels, got {}",
                width,
                height,
                needed,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn row(&self, y: usize) -> &'a [u32] {
        let start = y * self.width;
        &self.pixels[start..start + self.width]
    }
}

/// Fixed 320x240 ARGB frame owned by the decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    pixels: Vec<u32>,
}

impl ImageBuffer {
    /// A frame filled with opaque black
    pub fn new() -> Self {
        Self {
            pixels: vec![OPAQUE_BLACK; IMAGE_WIDTH * IMAGE_HEIGHT],
        }
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn row(&self, y: usize) -> &[u32] {
        &self.pixels[y * IMAGE_WIDTH..(y + 1) * IMAGE_WIDTH]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [u32] {
        &mut self.pixels[y * IMAGE_WIDTH..(y + 1) * IMAGE_WIDTH]
    }
}

impl Default for ImageBuffer {
    fn default() -> Self {
        Self::new()
    }
}
