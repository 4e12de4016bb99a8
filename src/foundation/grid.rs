use std::path::Path;

use anyhow::Context;

use crate::foundation::error::{DepthError, DepthResult};

/// Number of interleaved channels stored per pixel.
pub const CHANNELS: usize = 4;

/// An immutable RGBA8 raster, row-major and tightly packed.
///
/// Used for normal maps, gradient fields and depth maps alike.
/// Invariant: `data.len() == width * height * 4`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelGrid {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelGrid {
    /// Wrap an RGBA8 buffer, validating its length against the dimensions.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> DepthResult<Self> {
        let expected = byte_len(width, height)?;
        if data.len() != expected {
            return Err(DepthError::validation(format!(
                "pixel buffer has {} bytes, expected {expected} for {width}x{height} rgba8",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A grid filled with one RGBA value.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> DepthResult<Self> {
        let len = byte_len(width, height)?;
        let mut data = Vec::with_capacity(len);
        for _ in 0..len / CHANNELS {
            data.extend_from_slice(&rgba);
        }
        Self::new(width, height, data)
    }

    /// Build a grid by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(
        width: u32,
        height: u32,
        mut f: impl FnMut(u32, u32) -> [u8; 4],
    ) -> DepthResult<Self> {
        let mut data = Vec::with_capacity(byte_len(width, height)?);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&f(x, y));
            }
        }
        Self::new(width, height, data)
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// `true` when the grid holds no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Raw RGBA8 bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the grid and return its RGBA8 bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// RGBA value at `(x, y)`, or `None` outside the grid.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * CHANNELS;
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }

    /// `true` when `other` has the same dimensions.
    pub fn same_size(&self, other: &PixelGrid) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Decode an image file (any format the `image` crate reads) as straight RGBA8.
    pub fn open(path: impl AsRef<Path>) -> DepthResult<Self> {
        let path = path.as_ref();
        let img = image::open(path)
            .with_context(|| format!("decode image '{}'", path.display()))?
            .to_rgba8();
        let (width, height) = img.dimensions();
        Self::new(width, height, img.into_raw())
    }

    /// Decode encoded image bytes as straight RGBA8.
    pub fn decode(bytes: &[u8]) -> DepthResult<Self> {
        let img = image::load_from_memory(bytes)
            .context("decode image from memory")?
            .to_rgba8();
        let (width, height) = img.dimensions();
        Self::new(width, height, img.into_raw())
    }

    /// Write the grid as a PNG file.
    pub fn save_png(&self, path: impl AsRef<Path>) -> DepthResult<()> {
        let path = path.as_ref();
        image::save_buffer_with_format(
            path,
            &self.data,
            self.width,
            self.height,
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .with_context(|| format!("write png '{}'", path.display()))?;
        Ok(())
    }
}

fn byte_len(width: u32, height: u32) -> DepthResult<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(CHANNELS))
        .ok_or_else(|| DepthError::validation("pixel grid dimensions overflow"))
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/grid.rs"]
mod tests;
