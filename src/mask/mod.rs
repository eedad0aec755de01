mod convert;
mod fbmask;
mod sinks;

pub use convert::{apply_to_image, label_map_to_mask, load_seed_mask, seeds_from_label_mask, seeds_from_mask};
pub use fbmask::{parse_fbmask, read_fbmask, write_fbmask, FbMaskHeader};
pub use sinks::{CompositeSink, FbMaskSink, MaskImageSink};

use crate::segmentation::LabelMap;
use anyhow::Result;
use image::DynamicImage;

/// Value written for foreground pixels in result masks
pub const FOREGROUND_VALUE: u8 = 0;

/// Value written for background pixels in result masks
pub const BACKGROUND_VALUE: u8 = 255;

/// Trait for destinations of a finished segmentation
pub trait ResultSink {
    /// Persist the labeling of `image`
    fn write_result(&mut self, image: &DynamicImage, labels: &LabelMap) -> Result<()>;

    /// Where the result goes, for logging
    fn destination(&self) -> String;
}
