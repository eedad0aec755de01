use crate::error::{Result, SegmentationError};
use crate::grid::{Connectivity, Pixel, PixelSource};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Binary label assigned to every pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Foreground,
    Background,
}

/// Pixels whose label is fixed by the caller
///
/// Ordered so that graph construction visits seeds in a reproducible order.
pub type SeedSet = BTreeSet<Pixel>;

/// Per-pixel labeling, row-major, matching the segmented image's dimensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    width: u32,
    height: u32,
    labels: Vec<Label>,
}

impl LabelMap {
    pub fn new(width: u32, height: u32, labels: Vec<Label>) -> Option<Self> {
        if labels.len() != width as usize * height as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            labels,
        })
    }

    /// Label every pixel with `f`, visiting them in row-major order
    pub fn from_fn<F: FnMut(Pixel) -> Label>(width: u32, height: u32, mut f: F) -> Self {
        let labels = (0..height)
            .flat_map(|y| (0..width).map(move |x| Pixel::new(x, y)))
            .map(&mut f)
            .collect();
        Self {
            width,
            height,
            labels,
        }
    }

    pub fn filled(width: u32, height: u32, label: Label) -> Self {
        Self {
            width,
            height,
            labels: vec![label; width as usize * height as usize],
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn get(&self, pixel: Pixel) -> Option<Label> {
        if pixel.x >= self.width || pixel.y >= self.height {
            return None;
        }
        self.labels
            .get(pixel.y as usize * self.width as usize + pixel.x as usize)
            .copied()
    }

    pub fn is_foreground(&self, pixel: Pixel) -> bool {
        self.get(pixel) == Some(Label::Foreground)
    }

    pub fn is_background(&self, pixel: Pixel) -> bool {
        self.get(pixel) == Some(Label::Background)
    }

    pub fn count_foreground(&self) -> usize {
        self.labels.iter().filter(|&&l| l == Label::Foreground).count()
    }

    pub fn count_background(&self) -> usize {
        self.labels.len() - self.count_foreground()
    }

    /// Pixels carrying `label`, in row-major order
    pub fn pixels_with(&self, label: Label) -> Vec<Pixel> {
        let width = self.width as usize;
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, &l)| l == label)
            .map(|(i, _)| Pixel::new((i % width) as u32, (i / width) as u32))
            .collect()
    }

    pub fn foreground_pixels(&self) -> Vec<Pixel> {
        self.pixels_with(Label::Foreground)
    }

    pub fn background_pixels(&self) -> Vec<Pixel> {
        self.pixels_with(Label::Background)
    }
}

/// Where histogram bins are laid out along each channel
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum ValueRange {
    /// Span each channel's smallest to largest value in the image
    #[default]
    Observed,
    /// Same fixed span for every channel, e.g. 0..=255 for 8-bit images
    Fixed { min: f32, max: f32 },
}

/// Tunables recognized by the segmentation engine
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationConfig {
    /// Histogram resolution per channel; memory grows as `bins^channels`
    pub bins: usize,
    /// Weight of the smoothness term; 0 disables spatial coherence
    pub lambda: f64,
    pub connectivity: Connectivity,
    pub value_range: ValueRange,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            bins: 20,
            lambda: 0.5,
            connectivity: Connectivity::Four,
            value_range: ValueRange::Observed,
        }
    }
}

impl SegmentationConfig {
    pub fn with_bins(mut self, bins: usize) -> Self {
        self.bins = bins;
        self
    }

    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }

    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }

    pub fn with_value_range(mut self, value_range: ValueRange) -> Self {
        self.value_range = value_range;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.bins < 1 {
            return Err(SegmentationError::InvalidConfiguration(format!(
                "bins must be at least 1, got {}",
                self.bins
            )));
        }
        if !self.lambda.is_finite() || self.lambda < 0.0 {
            return Err(SegmentationError::InvalidConfiguration(format!(
                "lambda must be a finite non-negative number, got {}",
                self.lambda
            )));
        }
        if let ValueRange::Fixed { min, max } = self.value_range {
            if !(min.is_finite() && max.is_finite() && min < max) {
                return Err(SegmentationError::InvalidConfiguration(format!(
                    "value range must satisfy min < max, got {min}..{max}"
                )));
            }
        }
        Ok(())
    }
}

/// Shared flag for aborting a running segmentation from another thread
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Output of one segmentation request
#[derive(Debug, Clone, PartialEq)]
pub struct Segmentation {
    pub labels: LabelMap,
    /// Maximum flow value, equal to the energy of `labels`
    pub flow: f64,
}

/// Trait for seeded foreground/background segmenters
pub trait Segmenter {
    /// Label every pixel of `image` given the two seed sets
    ///
    /// # Returns
    /// * Labeling that agrees with every seed
    fn segment<I: PixelSource>(
        &self,
        image: &I,
        foreground: &SeedSet,
        background: &SeedSet,
    ) -> Result<Segmentation>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SegmentationConfig::default();
        assert_eq!(config.bins, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_bad_configuration() {
        let zero_bins = SegmentationConfig::default().with_bins(0);
        assert!(matches!(
            zero_bins.validate(),
            Err(SegmentationError::InvalidConfiguration(_))
        ));

        let negative = SegmentationConfig::default().with_lambda(-0.1);
        assert!(negative.validate().is_err());

        let nan = SegmentationConfig::default().with_lambda(f64::NAN);
        assert!(nan.validate().is_err());

        let inverted = SegmentationConfig::default()
            .with_value_range(ValueRange::Fixed { min: 5.0, max: 5.0 });
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn lambda_zero_is_allowed() {
        assert!(SegmentationConfig::default()
            .with_lambda(0.0)
            .validate()
            .is_ok());
    }

    #[test]
    fn label_map_counts_and_lookups() {
        let map = LabelMap::new(
            2,
            2,
            vec![
                Label::Foreground,
                Label::Background,
                Label::Background,
                Label::Foreground,
            ],
        )
        .expect("matching size");

        assert_eq!(map.count_foreground(), 2);
        assert_eq!(map.count_background(), 2);
        assert!(map.is_foreground(Pixel::new(1, 1)));
        assert!(map.is_background(Pixel::new(0, 1)));
        assert_eq!(map.get(Pixel::new(2, 0)), None);
        assert_eq!(
            map.foreground_pixels(),
            vec![Pixel::new(0, 0), Pixel::new(1, 1)]
        );
    }

    #[test]
    fn label_map_rejects_wrong_length() {
        assert!(LabelMap::new(2, 2, vec![Label::Foreground; 3]).is_none());
    }

    #[test]
    fn label_map_from_fn_is_row_major() {
        let map = LabelMap::from_fn(3, 2, |p| {
            if p.y == 1 && p.x > 0 {
                Label::Foreground
            } else {
                Label::Background
            }
        });

        assert_eq!(map.dimensions(), (3, 2));
        assert_eq!(map.foreground_pixels(), vec![Pixel::new(1, 1), Pixel::new(2, 1)]);
        assert_eq!(map.labels()[4], Label::Foreground);
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        assert!(clone.is_cancelled());
    }
}
