//! Interactive foreground/background segmentation by graph cuts.
//!
//! Seed pixels for both labels train a color histogram per label; those
//! likelihoods and a contrast-sensitive smoothness term are encoded in a
//! flow network whose minimum cut is the globally optimal labeling.

pub mod error;
pub mod grid;
pub mod mask;
pub mod segmentation;

pub use error::{SegmentationError, SeedKind};
pub use grid::{Connectivity, Pixel, PixelSource, VectorImage};
pub use segmentation::{
    Label, LabelMap, SeedSet, Segmentation, SegmentationConfig, SegmentationEngine, Segmenter,
};
