use crate::grid::Pixel;
use crate::segmentation::{Label, LabelMap, SeedSet};
use anyhow::{bail, Context, Result};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgba};
use std::path::Path;

/// Every non-zero pixel of a seed mask becomes a seed
pub fn seeds_from_mask(mask: &GrayImage) -> SeedSet {
    mask.enumerate_pixels()
        .filter(|(_, _, value)| value[0] != 0)
        .map(|(x, y, _)| Pixel::new(x, y))
        .collect()
}

/// Split one mask holding both seed classes; other values are unlabeled
pub fn seeds_from_label_mask(
    mask: &GrayImage,
    foreground_value: u8,
    background_value: u8,
) -> (SeedSet, SeedSet) {
    let mut foreground = SeedSet::new();
    let mut background = SeedSet::new();
    for (x, y, value) in mask.enumerate_pixels() {
        if value[0] == foreground_value {
            foreground.insert(Pixel::new(x, y));
        } else if value[0] == background_value {
            background.insert(Pixel::new(x, y));
        }
    }
    (foreground, background)
}

/// Read a seed mask image (white where seeds are, black elsewhere)
pub fn load_seed_mask<P: AsRef<Path>>(path: P) -> Result<SeedSet> {
    let path = path.as_ref();
    let mask = image::open(path)
        .with_context(|| format!("Failed to read seed mask {}", path.display()))?
        .to_luma8();
    Ok(seeds_from_mask(&mask))
}

/// Render a labeling as a single-channel mask
pub fn label_map_to_mask(labels: &LabelMap, foreground_value: u8, background_value: u8) -> GrayImage {
    let (width, height) = labels.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        if labels.is_foreground(Pixel::new(x, y)) {
            Luma([foreground_value])
        } else {
            Luma([background_value])
        }
    })
}

fn blank_background<P>(buffer: &mut ImageBuffer<P, Vec<P::Subpixel>>, labels: &LabelMap, fill: P)
where
    P: image::Pixel,
{
    for (x, y, pixel) in buffer.enumerate_pixels_mut() {
        if labels.get(Pixel::new(x, y)) == Some(Label::Background) {
            *pixel = fill;
        }
    }
}

/// Copy of `image` with every background pixel replaced by `background`
///
/// 8-bit gray, RGB and RGBA images keep their layout; anything else comes
/// back as RGBA.
pub fn apply_to_image(
    image: &DynamicImage,
    labels: &LabelMap,
    background: Rgba<u8>,
) -> Result<DynamicImage> {
    if (image.width(), image.height()) != labels.dimensions() {
        bail!(
            "Mask is {}x{} but image is {}x{}",
            labels.dimensions().0,
            labels.dimensions().1,
            image.width(),
            image.height()
        );
    }

    let [r, g, b, a] = background.0;
    let out = match image {
        DynamicImage::ImageLuma8(buf) => {
            let mut buf = buf.clone();
            let luma = (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).round() as u8;
            blank_background(&mut buf, labels, Luma([luma]));
            DynamicImage::ImageLuma8(buf)
        }
        DynamicImage::ImageRgb8(buf) => {
            let mut buf = buf.clone();
            blank_background(&mut buf, labels, image::Rgb([r, g, b]));
            DynamicImage::ImageRgb8(buf)
        }
        other => {
            let mut buf = other.to_rgba8();
            blank_background(&mut buf, labels, Rgba([r, g, b, a]));
            DynamicImage::ImageRgba8(buf)
        }
    };
    Ok(out)
}
