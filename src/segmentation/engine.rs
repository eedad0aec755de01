use super::appearance::{AppearanceModel, BinLayout};
use super::cost::{CostFunction, EnergyFunction};
use super::graph::{check_seed_sets, GraphBuilder};
use super::maxflow::MinCutSolver;
use super::types::{
    CancellationToken, Label, LabelMap, SeedSet, Segmentation, SegmentationConfig, Segmenter,
};
use crate::error::{Result, SegmentationError};
use crate::grid::PixelSource;

/// Seeded graph-cut segmentation
///
/// Every call builds its own appearance models and network from scratch;
/// nothing carries over between requests.
#[derive(Debug, Clone, Default)]
pub struct SegmentationEngine {
    config: SegmentationConfig,
    cancel: Option<CancellationToken>,
}

impl SegmentationEngine {
    pub fn new(config: SegmentationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: None,
        })
    }

    /// Abort the max-flow search once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// Input checks that must pass before any model or graph work
    fn validate_request<I: PixelSource>(
        &self,
        image: &I,
        foreground: &SeedSet,
        background: &SeedSet,
    ) -> Result<()> {
        self.config.validate()?;
        if image.pixel_count() == 0 {
            return Err(SegmentationError::EmptyImage);
        }
        check_seed_sets(image, foreground, background)
    }

    /// Segment and also report the labeling energy, for callers that want
    /// to compare it with the flow value
    pub fn segment_with_energy<I: PixelSource>(
        &self,
        image: &I,
        foreground: &SeedSet,
        background: &SeedSet,
    ) -> Result<(Segmentation, f64)> {
        self.run(image, foreground, background, true)
            .map(|(segmentation, energy)| (segmentation, energy.unwrap_or(f64::NAN)))
    }

    fn run<I: PixelSource>(
        &self,
        image: &I,
        foreground: &SeedSet,
        background: &SeedSet,
        with_energy: bool,
    ) -> Result<(Segmentation, Option<f64>)> {
        let _span = tracing::debug_span!("segment").entered();
        self.validate_request(image, foreground, background)?;

        let (width, height) = image.dimensions();
        tracing::info!(
            "Segmenting {}x{} image ({} channels) with {} foreground and {} background seeds",
            width,
            height,
            image.channels(),
            foreground.len(),
            background.len()
        );

        let layout = BinLayout::for_image(image, self.config.bins, self.config.value_range)?;
        let fg_model = AppearanceModel::build(Label::Foreground, foreground, image, &layout)?;
        let bg_model = AppearanceModel::build(Label::Background, background, image, &layout)?;

        let costs = CostFunction::new(
            image,
            &fg_model,
            &bg_model,
            self.config.lambda,
            self.config.connectivity,
        );
        let network = GraphBuilder::new(self.config.connectivity)
            .build_with_costs(&costs, foreground, background)?;

        let mut solver = MinCutSolver::new(&network);
        if let Some(token) = &self.cancel {
            solver = solver.with_cancellation(token.clone());
        }
        let cut = solver.solve()?;

        let labels = LabelMap::from_fn(width, height, |pixel| {
            if cut.is_source_side(image.index_of(pixel)) {
                Label::Foreground
            } else {
                Label::Background
            }
        });

        tracing::info!(
            "Segmentation done: {} foreground, {} background, flow {:.4}",
            labels.count_foreground(),
            labels.count_background(),
            cut.flow()
        );

        let energy = with_energy.then(|| {
            EnergyFunction::new(&costs, self.config.connectivity, foreground, background)
                .energy(&labels)
        });

        Ok((
            Segmentation {
                labels,
                flow: cut.flow(),
            },
            energy,
        ))
    }
}

impl Segmenter for SegmentationEngine {
    fn segment<I: PixelSource>(
        &self,
        image: &I,
        foreground: &SeedSet,
        background: &SeedSet,
    ) -> Result<Segmentation> {
        self.run(image, foreground, background, false)
            .map(|(segmentation, _)| segmentation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SeedKind;
    use crate::grid::{Pixel, VectorImage};

    fn strip() -> VectorImage {
        VectorImage::from_gray(3, 1, &[10.0, 10.0, 200.0]).expect("valid shape")
    }

    fn engine(bins: usize, lambda: f64) -> SegmentationEngine {
        SegmentationEngine::new(
            SegmentationConfig::default()
                .with_bins(bins)
                .with_lambda(lambda),
        )
        .expect("valid config")
    }

    #[test]
    fn strip_without_smoothness() {
        let fg = SeedSet::from([Pixel::new(0, 0)]);
        let bg = SeedSet::from([Pixel::new(2, 0)]);

        let result = engine(4, 0.0).segment(&strip(), &fg, &bg).expect("segment");
        assert_eq!(
            result.labels.labels(),
            &[Label::Foreground, Label::Foreground, Label::Background]
        );
    }

    #[test]
    fn strip_with_heavy_smoothness_cuts_at_the_edge() {
        let fg = SeedSet::from([Pixel::new(0, 0)]);
        let bg = SeedSet::from([Pixel::new(2, 0)]);

        let result = engine(4, 1e6).segment(&strip(), &fg, &bg).expect("segment");
        assert_eq!(
            result.labels.labels(),
            &[Label::Foreground, Label::Foreground, Label::Background]
        );
    }

    #[test]
    fn flow_matches_energy_of_result() {
        let image = VectorImage::from_gray(
            4,
            3,
            &[
                10.0, 12.0, 80.0, 200.0, //
                11.0, 90.0, 190.0, 210.0, //
                9.0, 15.0, 180.0, 205.0,
            ],
        )
        .expect("valid shape");
        let fg = SeedSet::from([Pixel::new(0, 0), Pixel::new(0, 2)]);
        let bg = SeedSet::from([Pixel::new(3, 0), Pixel::new(3, 2)]);

        let (result, energy) = engine(8, 2.0)
            .segment_with_energy(&image, &fg, &bg)
            .expect("segment");
        assert!((result.flow - energy).abs() < 1e-9 * energy.max(1.0));
    }

    #[test]
    fn single_pixel_without_background_seed() {
        let image = VectorImage::from_gray(1, 1, &[42.0]).expect("valid shape");
        let fg = SeedSet::from([Pixel::new(0, 0)]);

        let err = engine(20, 0.5)
            .segment(&image, &fg, &SeedSet::new())
            .expect_err("missing background seeds");
        assert!(matches!(
            err,
            SegmentationError::InvalidSeedSet {
                kind: SeedKind::Background,
                ..
            }
        ));
    }

    #[test]
    fn empty_image_is_rejected_first() {
        let image = VectorImage::from_gray(0, 0, &[]).expect("valid shape");
        let err = engine(20, 0.5)
            .segment(&image, &SeedSet::new(), &SeedSet::new())
            .expect_err("empty image");
        assert_eq!(err, SegmentationError::EmptyImage);
    }

    #[test]
    fn conflicting_seed_is_rejected() {
        let seeds = SeedSet::from([Pixel::new(1, 0)]);
        let err = engine(4, 0.5)
            .segment(&strip(), &seeds, &seeds)
            .expect_err("conflict");
        assert_eq!(
            err,
            SegmentationError::ConflictingSeed {
                pixel: Pixel::new(1, 0)
            }
        );
    }

    #[test]
    fn first_conflict_is_reported_in_row_major_order() {
        let image = VectorImage::from_gray(2, 2, &[0.0, 1.0, 2.0, 3.0]).expect("valid shape");
        let seeds = SeedSet::from([Pixel::new(0, 1), Pixel::new(1, 0)]);

        let err = engine(4, 0.5)
            .segment(&image, &seeds, &seeds)
            .expect_err("conflict");
        assert_eq!(
            err,
            SegmentationError::ConflictingSeed {
                pixel: Pixel::new(1, 0)
            }
        );
    }

    #[test]
    fn out_of_bounds_seed_names_the_image_size() {
        let fg = SeedSet::from([Pixel::new(0, 0)]);
        let bg = SeedSet::from([Pixel::new(3, 0)]);

        let err = engine(4, 0.5).segment(&strip(), &fg, &bg).expect_err("outside");
        match err {
            SegmentationError::InvalidSeedSet { kind, reason } => {
                assert_eq!(kind, SeedKind::Background);
                assert!(reason.contains("3x1"), "{reason}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = SegmentationEngine::new(SegmentationConfig::default().with_bins(0))
            .expect_err("zero bins");
        assert!(matches!(err, SegmentationError::InvalidConfiguration(_)));
    }

    #[test]
    fn cancelled_request_returns_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let fg = SeedSet::from([Pixel::new(0, 0)]);
        let bg = SeedSet::from([Pixel::new(2, 0)]);

        let err = engine(4, 0.5)
            .with_cancellation(token)
            .segment(&strip(), &fg, &bg)
            .expect_err("cancelled");
        assert_eq!(err, SegmentationError::Cancelled);
    }
}
