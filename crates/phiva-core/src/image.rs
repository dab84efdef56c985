//! Normalized image tensor for vision prefill.
//!
//! The engine consumes images as a planar 3xHxW float buffer with values
//! normalized to `[-0.5, 0.5]` (`channel / 255 - 0.5`). This module owns
//! the conversion from packed RGB8 into that layout; decoding and scaling
//! source images is the caller's concern.

use crate::error::{PhivaError, Result};

/// Side length expected by the engine's vision prefill (3x336x336).
pub const DEFAULT_IMAGE_SIDE: u32 = 336;

/// A decoded image in the engine's input layout.
///
/// Data is plane-major: all red values first, then green, then blue,
/// each plane in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Vec<f32>,
    width: u32,
    height: u32,
}

impl ImageTensor {
    /// Builds a tensor from packed RGB8 pixel data (`[r, g, b, r, g, b, ..]`,
    /// row-major).
    ///
    /// # Errors
    ///
    /// Returns an error if `rgb.len()` does not match `3 * width * height`.
    pub fn from_rgb8(rgb: &[u8], width: u32, height: u32) -> Result<Self> {
        let pixel_count = (width as usize) * (height as usize);
        if rgb.len() != pixel_count * 3 {
            return Err(PhivaError::image(format!(
                "expected {} bytes for {}x{} RGB8, got {}",
                pixel_count * 3,
                width,
                height,
                rgb.len()
            )));
        }

        let mut data = vec![0.0f32; pixel_count * 3];
        for i in 0..pixel_count {
            data[i] = f32::from(rgb[i * 3]) / 255.0 - 0.5;
            data[pixel_count + i] = f32::from(rgb[i * 3 + 1]) / 255.0 - 0.5;
            data[2 * pixel_count + i] = f32::from(rgb[i * 3 + 2]) / 255.0 - 0.5;
        }

        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The normalized plane-major buffer.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Tensor shape as `[channels, height, width]`.
    pub fn shape(&self) -> [usize; 3] {
        [3, self.height as usize, self.width as usize]
    }

    /// Value at `(channel, y, x)`. Panics on out-of-range indices.
    pub fn at(&self, channel: usize, y: u32, x: u32) -> f32 {
        assert!(channel < 3 && y < self.height && x < self.width);
        let plane = (self.width as usize) * (self.height as usize);
        self.data[channel * plane + (y as usize) * (self.width as usize) + x as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rgb8_normalization() {
        // 1x1 image, pure white
        let tensor = ImageTensor::from_rgb8(&[255, 255, 255], 1, 1).unwrap();
        assert_eq!(tensor.data(), &[0.5, 0.5, 0.5]);

        // 1x1 image, pure black
        let tensor = ImageTensor::from_rgb8(&[0, 0, 0], 1, 1).unwrap();
        assert_eq!(tensor.data(), &[-0.5, -0.5, -0.5]);
    }

    #[test]
    fn test_planar_layout() {
        // 2x1 image: first pixel red, second pixel blue
        let tensor = ImageTensor::from_rgb8(&[255, 0, 0, 0, 0, 255], 2, 1).unwrap();
        assert_eq!(tensor.shape(), [3, 1, 2]);
        // Red plane
        assert_eq!(tensor.at(0, 0, 0), 0.5);
        assert_eq!(tensor.at(0, 0, 1), -0.5);
        // Blue plane
        assert_eq!(tensor.at(2, 0, 0), -0.5);
        assert_eq!(tensor.at(2, 0, 1), 0.5);
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let err = ImageTensor::from_rgb8(&[0, 0, 0], 2, 2).unwrap_err();
        assert!(matches!(err, PhivaError::Image(_)));
    }
}
