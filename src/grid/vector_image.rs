use super::{Pixel, PixelSource};
use ndarray::{s, Array3, ArrayView1, ShapeError};

/// Multi-channel image stored as an `(height, width, channels)` array
///
/// The channel count is fixed when the image is created, whatever the
/// source encoding was.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorImage {
    pixels: Array3<f32>,
}

impl VectorImage {
    /// Build an image from interleaved row-major samples
    pub fn from_vec(
        width: u32,
        height: u32,
        channels: usize,
        data: Vec<f32>,
    ) -> Result<Self, ShapeError> {
        let pixels = Array3::from_shape_vec((height as usize, width as usize, channels), data)?;
        Ok(Self { pixels })
    }

    /// Single-channel image from row-major values
    pub fn from_gray(width: u32, height: u32, data: &[f32]) -> Result<Self, ShapeError> {
        Self::from_vec(width, height, 1, data.to_vec())
    }

    pub fn as_array(&self) -> &Array3<f32> {
        &self.pixels
    }
}

impl PixelSource for VectorImage {
    fn dimensions(&self) -> (u32, u32) {
        let (height, width, _) = self.pixels.dim();
        (width as u32, height as u32)
    }

    fn channels(&self) -> usize {
        self.pixels.dim().2
    }

    fn color(&self, pixel: Pixel) -> ArrayView1<'_, f32> {
        self.pixels
            .slice(s![pixel.y as usize, pixel.x as usize, ..])
    }

    fn channel_range(&self, channel: usize) -> Option<(f32, f32)> {
        let lane = self.pixels.slice(s![.., .., channel]);
        lane.iter().fold(None, |range, &v| match range {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}
