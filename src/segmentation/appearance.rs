use super::graph::check_seeds;
use super::types::{Label, SeedSet, ValueRange};
use crate::error::{Result, SegmentationError, SeedKind};
use crate::grid::{Pixel, PixelSource};
use ndarray::{ArrayD, ArrayView1, IxDyn};
use rayon::prelude::*;

/// Smallest probability any histogram cell may report
///
/// Keeps `-ln p` finite for colors no seed ever produced.
pub const PROBABILITY_FLOOR: f64 = 1e-6;

/// Upper bound on `bins^channels` accepted for one histogram
pub const MAX_HISTOGRAM_CELLS: usize = 1 << 24;

/// Equal-width binning of every channel
#[derive(Debug, Clone, PartialEq)]
pub struct BinLayout {
    bins: usize,
    ranges: Vec<(f32, f32)>,
}

impl BinLayout {
    pub fn new(bins: usize, ranges: Vec<(f32, f32)>) -> Result<Self> {
        if bins < 1 {
            return Err(SegmentationError::InvalidConfiguration(
                "bins must be at least 1".to_string(),
            ));
        }

        let cells = u32::try_from(ranges.len())
            .ok()
            .and_then(|channels| bins.checked_pow(channels))
            .filter(|&cells| cells <= MAX_HISTOGRAM_CELLS);
        if cells.is_none() {
            return Err(SegmentationError::InvalidConfiguration(format!(
                "{bins} bins over {} channels exceeds {MAX_HISTOGRAM_CELLS} histogram cells",
                ranges.len()
            )));
        }

        Ok(Self { bins, ranges })
    }

    /// Layout covering `image`, shared by both appearance models
    pub fn for_image<I: PixelSource>(image: &I, bins: usize, value_range: ValueRange) -> Result<Self> {
        let channels = image.channels();
        let ranges = match value_range {
            ValueRange::Fixed { min, max } => vec![(min, max); channels],
            ValueRange::Observed => (0..channels)
                .map(|channel| image.channel_range(channel).unwrap_or((0.0, 0.0)))
                .collect(),
        };
        Self::new(bins, ranges)
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn channels(&self) -> usize {
        self.ranges.len()
    }

    pub fn shape(&self) -> Vec<usize> {
        vec![self.bins; self.ranges.len()]
    }

    /// Bucket of one channel value, clamped into `0..bins`
    pub fn bin_of(&self, channel: usize, value: f32) -> usize {
        let (lo, hi) = self.ranges[channel];
        if !(hi > lo) || !value.is_finite() {
            return 0;
        }
        let t = (value - lo) / (hi - lo);
        let bin = (t * self.bins as f32).floor();
        if bin <= 0.0 {
            0
        } else {
            (bin as usize).min(self.bins - 1)
        }
    }

    /// Joint histogram cell of a color vector
    pub fn cell_of(&self, color: ArrayView1<'_, f32>) -> IxDyn {
        let index: Vec<usize> = color
            .iter()
            .enumerate()
            .map(|(channel, &v)| self.bin_of(channel, v))
            .collect();
        IxDyn(&index)
    }
}

/// Color distribution of one label, estimated from its seed pixels
#[derive(Debug, Clone)]
pub struct AppearanceModel {
    label: Label,
    layout: BinLayout,
    probabilities: ArrayD<f64>,
    seed_count: usize,
}

impl AppearanceModel {
    /// Accumulate a histogram over `seeds` and normalize it
    ///
    /// Seeds are scattered into per-thread partial histograms that are
    /// summed afterwards; counts are integers so the result does not
    /// depend on scheduling.
    pub fn build<I: PixelSource>(
        label: Label,
        seeds: &SeedSet,
        image: &I,
        layout: &BinLayout,
    ) -> Result<Self> {
        let _span = tracing::debug_span!("appearance_model", ?label).entered();

        let kind = match label {
            Label::Foreground => SeedKind::Foreground,
            Label::Background => SeedKind::Background,
        };
        check_seeds(image, seeds, kind)?;
        if layout.channels() != image.channels() {
            return Err(SegmentationError::InvalidConfiguration(format!(
                "bin layout has {} channels, image has {}",
                layout.channels(),
                image.channels()
            )));
        }

        let shape = layout.shape();
        let seed_list: Vec<Pixel> = seeds.iter().copied().collect();
        let counts = seed_list
            .par_iter()
            .fold(
                || ArrayD::<u64>::zeros(IxDyn(&shape)),
                |mut partial, &pixel| {
                    partial[layout.cell_of(image.color(pixel))] += 1;
                    partial
                },
            )
            .reduce(
                || ArrayD::<u64>::zeros(IxDyn(&shape)),
                |mut merged, partial| {
                    merged += &partial;
                    merged
                },
            );

        let occupied = counts.iter().filter(|&&c| c > 0).count();
        tracing::debug!(
            "{:?} histogram: {} seeds in {} of {} cells",
            label,
            seed_list.len(),
            occupied,
            counts.len()
        );

        Ok(Self {
            label,
            layout: layout.clone(),
            probabilities: normalize(&counts, seed_list.len()),
            seed_count: seed_list.len(),
        })
    }

    pub fn label(&self) -> Label {
        self.label
    }

    pub fn seed_count(&self) -> usize {
        self.seed_count
    }

    pub fn layout(&self) -> &BinLayout {
        &self.layout
    }

    /// Normalized, floor-clamped mass of the cell holding `color`
    pub fn probability(&self, color: ArrayView1<'_, f32>) -> f64 {
        self.probabilities[self.layout.cell_of(color)]
    }

    /// Negative log-likelihood of `color` under this model
    pub fn cost(&self, color: ArrayView1<'_, f32>) -> f64 {
        -self.probability(color).ln()
    }

    pub fn probabilities(&self) -> &ArrayD<f64> {
        &self.probabilities
    }
}

/// Counts to probabilities: clamp every cell up to the floor, then rescale
/// so the total mass is exactly one again
fn normalize(counts: &ArrayD<u64>, total: usize) -> ArrayD<f64> {
    let total = total as f64;
    let mut probabilities = counts.mapv(|c| (c as f64 / total).max(PROBABILITY_FLOOR));
    let mass = probabilities.sum();
    probabilities.mapv_inplace(|p| p / mass);
    probabilities
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::VectorImage;

    fn strip() -> VectorImage {
        VectorImage::from_gray(3, 1, &[10.0, 10.0, 200.0]).expect("valid shape")
    }

    #[test]
    fn bins_split_observed_range_evenly() {
        let layout = BinLayout::for_image(&strip(), 4, ValueRange::Observed).expect("layout");

        assert_eq!(layout.bin_of(0, 10.0), 0);
        assert_eq!(layout.bin_of(0, 57.4), 0);
        assert_eq!(layout.bin_of(0, 57.6), 1);
        assert_eq!(layout.bin_of(0, 200.0), 3);
        assert_eq!(layout.bin_of(0, 1000.0), 3);
        assert_eq!(layout.bin_of(0, -5.0), 0);
    }

    #[test]
    fn flat_channel_lands_in_first_bin() {
        let layout = BinLayout::new(5, vec![(3.0, 3.0)]).expect("layout");
        assert_eq!(layout.bin_of(0, 3.0), 0);
    }

    #[test]
    fn oversized_histogram_is_rejected() {
        let err = BinLayout::new(256, vec![(0.0, 255.0); 4]).expect_err("too many cells");
        assert!(matches!(err, SegmentationError::InvalidConfiguration(_)));
    }

    #[test]
    fn probabilities_sum_to_one_and_stay_positive() {
        let image = strip();
        let layout = BinLayout::for_image(&image, 4, ValueRange::Observed).expect("layout");
        let seeds = SeedSet::from([Pixel::new(0, 0), Pixel::new(1, 0)]);
        let model =
            AppearanceModel::build(Label::Foreground, &seeds, &image, &layout).expect("model");

        let mass: f64 = model.probabilities().sum();
        assert!((mass - 1.0).abs() < 1e-12);
        assert!(model.probabilities().iter().all(|&p| p > 0.0));
        assert_eq!(model.seed_count(), 2);
    }

    #[test]
    fn cost_is_low_for_seed_colors_and_finite_elsewhere() {
        let image = strip();
        let layout = BinLayout::for_image(&image, 4, ValueRange::Observed).expect("layout");
        let seeds = SeedSet::from([Pixel::new(0, 0)]);
        let model =
            AppearanceModel::build(Label::Foreground, &seeds, &image, &layout).expect("model");

        let seen = model.cost(image.color(Pixel::new(1, 0)));
        let unseen = model.cost(image.color(Pixel::new(2, 0)));
        assert!(seen >= 0.0 && seen < 1e-4);
        assert!(unseen.is_finite());
        assert!(unseen > 10.0);
    }

    #[test]
    fn multi_channel_cells_are_joint() {
        let image = VectorImage::from_vec(2, 1, 2, vec![0.0, 1.0, 1.0, 0.0]).expect("valid shape");
        let layout = BinLayout::for_image(&image, 2, ValueRange::Observed).expect("layout");
        let seeds = SeedSet::from([Pixel::new(0, 0)]);
        let model =
            AppearanceModel::build(Label::Background, &seeds, &image, &layout).expect("model");

        assert_eq!(model.probabilities().shape(), &[2, 2]);
        assert!(model.probability(image.color(Pixel::new(0, 0))) > 0.99);
        assert!(model.probability(image.color(Pixel::new(1, 0))) < 1e-5);
    }

    #[test]
    fn empty_seed_set_is_rejected() {
        let image = strip();
        let layout = BinLayout::for_image(&image, 4, ValueRange::Observed).expect("layout");
        let err = AppearanceModel::build(Label::Background, &SeedSet::new(), &image, &layout)
            .expect_err("empty seeds");

        assert!(matches!(
            err,
            SegmentationError::InvalidSeedSet {
                kind: SeedKind::Background,
                ..
            }
        ));
    }

    #[test]
    fn out_of_bounds_seed_is_rejected() {
        let image = strip();
        let layout = BinLayout::for_image(&image, 4, ValueRange::Observed).expect("layout");
        let seeds = SeedSet::from([Pixel::new(3, 0)]);

        assert!(AppearanceModel::build(Label::Foreground, &seeds, &image, &layout).is_err());
    }
}
