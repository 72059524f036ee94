//! Stride-aware grayscale image view.

use crate::error::{Result, TagPoseError};

/// A borrowed 8-bit grayscale image with explicit row pitch.
///
/// The caller owns the pixels; the pipeline only reads them for the duration of one
/// `process_image` call.
#[derive(Clone, Copy, Debug)]
pub struct ImageView<'a> {
    /// Row-major pixel data.
    pub data: &'a [u8],
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// Bytes per row (`stride >= width`).
    pub stride: usize,
}

impl<'a> ImageView<'a> {
    /// Create a view over a possibly padded buffer.
    ///
    /// Fails with [`TagPoseError::InvalidImageBuffer`] when `stride < width` or when the buffer
    /// is too short for `height` rows. The last row does not need trailing padding.
    pub fn new(data: &'a [u8], width: usize, height: usize, stride: usize) -> Result<Self> {
        let required = if height > 0 {
            (height - 1)
                .checked_mul(stride)
                .and_then(|n| n.checked_add(width))
        } else {
            Some(0)
        };
        match required {
            Some(required) if stride >= width && data.len() >= required => {}
            _ => {
                return Err(TagPoseError::InvalidImageBuffer {
                    width,
                    height,
                    stride,
                    len: data.len(),
                    required: required.unwrap_or(usize::MAX),
                });
            }
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
        })
    }

    /// Create a view over a tightly packed buffer; `data.len()` must equal `width * height`.
    ///
    /// Geometry whose size does not fit in `usize` is rejected like any other mismatch.
    pub fn packed(data: &'a [u8], width: usize, height: usize) -> Result<Self> {
        let required = width.checked_mul(height);
        if required != Some(data.len()) {
            return Err(TagPoseError::InvalidImageBuffer {
                width,
                height,
                stride: width,
                len: data.len(),
                required: required.unwrap_or(usize::MAX),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            stride: width,
        })
    }

    /// Whether rows are stored without padding.
    #[must_use]
    pub fn is_packed(&self) -> bool {
        self.stride == self.width
    }

    /// The `width` pixels of row `y`, without stride padding.
    ///
    /// # Panics
    /// If `y >= height`.
    #[inline]
    #[must_use]
    pub fn get_row(&self, y: usize) -> &[u8] {
        assert!(y < self.height, "Row index {} out of bounds", y);
        let start = y * self.stride;
        &self.data[start..start + self.width]
    }

    /// Copy the visible pixels into a tightly packed buffer.
    #[must_use]
    pub fn to_packed(&self) -> Vec<u8> {
        (0..self.height).flat_map(|y| self.get_row(y)).copied().collect()
    }
}
