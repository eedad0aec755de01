use super::VectorImage;
use anyhow::{Context, Result};
use image::DynamicImage;
use std::path::Path;

/// Read an image file, returning the decoded image alongside its
/// `VectorImage`
///
/// The channel count is decided here, once, from the decoded layout. The
/// decoded image is kept for compositing the result.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<(DynamicImage, VectorImage)> {
    let path = path.as_ref();
    let decoded = image::open(path)
        .with_context(|| format!("Failed to read image {}", path.display()))?;

    let image = VectorImage::try_from(&decoded)
        .with_context(|| format!("Unexpected sample layout in {}", path.display()))?;
    tracing::debug!(
        "Decoded {} as {:?} with {} channels",
        path.display(),
        decoded.color(),
        image.as_array().dim().2
    );

    Ok((decoded, image))
}

fn samples<T: Copy + Into<f32>>(raw: &[T]) -> Vec<f32> {
    raw.iter().map(|&v| v.into()).collect()
}

impl TryFrom<&DynamicImage> for VectorImage {
    type Error = ndarray::ShapeError;

    fn try_from(decoded: &DynamicImage) -> std::result::Result<Self, Self::Error> {
        let (width, height) = (decoded.width(), decoded.height());

        let (channels, data) = match decoded {
            DynamicImage::ImageLuma8(buf) => (1, samples(buf.as_raw().as_slice())),
            DynamicImage::ImageLumaA8(buf) => (2, samples(buf.as_raw().as_slice())),
            DynamicImage::ImageRgb8(buf) => (3, samples(buf.as_raw().as_slice())),
            DynamicImage::ImageRgba8(buf) => (4, samples(buf.as_raw().as_slice())),
            DynamicImage::ImageLuma16(buf) => (1, samples(buf.as_raw().as_slice())),
            DynamicImage::ImageLumaA16(buf) => (2, samples(buf.as_raw().as_slice())),
            DynamicImage::ImageRgb16(buf) => (3, samples(buf.as_raw().as_slice())),
            DynamicImage::ImageRgba16(buf) => (4, samples(buf.as_raw().as_slice())),
            DynamicImage::ImageRgb32F(buf) => (3, buf.as_raw().clone()),
            DynamicImage::ImageRgba32F(buf) => (4, buf.as_raw().clone()),
            other => (4, samples(other.to_rgba8().as_raw().as_slice())),
        };

        VectorImage::from_vec(width, height, channels, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Pixel, PixelSource};
    use image::{GrayImage, Luma, Rgb, RgbImage};

    #[test]
    fn gray_decodes_to_one_channel() {
        let gray = GrayImage::from_fn(3, 2, |x, y| Luma([(x + 10 * y) as u8]));
        let image = VectorImage::try_from(&DynamicImage::ImageLuma8(gray)).expect("valid layout");

        assert_eq!(image.channels(), 1);
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.color(Pixel::new(2, 1))[0], 12.0);
    }

    #[test]
    fn rgb_keeps_channel_order() {
        let rgb = RgbImage::from_pixel(2, 2, Rgb([1, 2, 3]));
        let image = VectorImage::try_from(&DynamicImage::ImageRgb8(rgb)).expect("valid layout");

        assert_eq!(image.channels(), 3);
        assert_eq!(image.color(Pixel::new(1, 1)).to_vec(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn loaded_file_keeps_decoded_image() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("gray.png");
        GrayImage::from_pixel(2, 3, Luma([9])).save(&path).expect("save");

        let (decoded, image) = load_image(&path).expect("load");
        assert_eq!((decoded.width(), decoded.height()), (2, 3));
        assert_eq!(image.dimensions(), (2, 3));
        assert_eq!(image.color(Pixel::new(1, 2))[0], 9.0);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_image("/nonexistent/seedcut.png").expect_err("missing file");
        assert!(err.to_string().contains("/nonexistent/seedcut.png"));
    }
}
