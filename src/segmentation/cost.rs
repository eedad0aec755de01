use super::appearance::AppearanceModel;
use super::types::{Label, LabelMap, SeedSet};
use crate::grid::{Connectivity, Pixel, PixelSource};

/// Mean Euclidean color distance between neighboring pixels
///
/// Used as the contrast scale of the smoothness term. Zero when the image
/// has no neighbor pairs or is perfectly flat.
pub fn estimate_sigma<I: PixelSource>(image: &I, connectivity: Connectivity) -> f64 {
    let (width, height) = image.dimensions();
    let mut total = 0.0;
    let mut pairs = 0usize;
    for (p, q, _) in connectivity.neighbor_pairs(width, height) {
        total += color_distance_sq(image, p, q).sqrt();
        pairs += 1;
    }
    if pairs == 0 {
        0.0
    } else {
        total / pairs as f64
    }
}

fn color_distance_sq<I: PixelSource>(image: &I, p: Pixel, q: Pixel) -> f64 {
    image
        .color(p)
        .iter()
        .zip(image.color(q).iter())
        .map(|(&a, &b)| {
            let d = a as f64 - b as f64;
            d * d
        })
        .sum()
}

/// Energy terms for one image and one pair of appearance models
pub struct CostFunction<'a, I: PixelSource> {
    image: &'a I,
    foreground: &'a AppearanceModel,
    background: &'a AppearanceModel,
    lambda: f64,
    sigma: f64,
}

impl<'a, I: PixelSource> CostFunction<'a, I> {
    pub fn new(
        image: &'a I,
        foreground: &'a AppearanceModel,
        background: &'a AppearanceModel,
        lambda: f64,
        connectivity: Connectivity,
    ) -> Self {
        let sigma = estimate_sigma(image, connectivity);
        tracing::debug!("Estimated contrast sigma {:.4}", sigma);
        Self {
            image,
            foreground,
            background,
            lambda,
            sigma,
        }
    }

    pub fn image(&self) -> &'a I {
        self.image
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Cost of giving `pixel` the label `label`
    ///
    /// This is the pixel's negative log-likelihood under that label's own
    /// model. The graph stores it on the terminal edge that gets cut when
    /// the pixel ends up with `label`.
    pub fn data_cost(&self, pixel: Pixel, label: Label) -> f64 {
        let color = self.image.color(pixel);
        match label {
            Label::Foreground => self.foreground.cost(color),
            Label::Background => self.background.cost(color),
        }
    }

    /// Unweighted penalty for separating two neighbors
    ///
    /// `exp(-|c(p) - c(q)|^2 / (2 sigma^2)) / dist(p, q)`
    pub fn smoothness_cost(&self, p: Pixel, q: Pixel) -> f64 {
        let dx = p.x as f64 - q.x as f64;
        let dy = p.y as f64 - q.y as f64;
        let distance = (dx * dx + dy * dy).sqrt();
        if distance == 0.0 {
            return 0.0;
        }

        let diff_sq = color_distance_sq(self.image, p, q);
        let similarity = if self.sigma > 0.0 {
            (-diff_sq / (2.0 * self.sigma * self.sigma)).exp()
        } else if diff_sq == 0.0 {
            1.0
        } else {
            0.0
        };
        similarity / distance
    }

    /// Capacity of the neighbor edge between `p` and `q`
    pub fn neighbor_weight(&self, p: Pixel, q: Pixel) -> f64 {
        if self.lambda == 0.0 {
            return 0.0;
        }
        self.lambda * self.smoothness_cost(p, q)
    }
}

/// Evaluates the labeling energy the flow network encodes
///
/// Seed pixels cost nothing when they keep their seed label and are
/// forbidden (infinite energy) otherwise.
pub struct EnergyFunction<'a, I: PixelSource> {
    costs: &'a CostFunction<'a, I>,
    connectivity: Connectivity,
    foreground_seeds: &'a SeedSet,
    background_seeds: &'a SeedSet,
}

impl<'a, I: PixelSource> EnergyFunction<'a, I> {
    pub fn new(
        costs: &'a CostFunction<'a, I>,
        connectivity: Connectivity,
        foreground_seeds: &'a SeedSet,
        background_seeds: &'a SeedSet,
    ) -> Self {
        Self {
            costs,
            connectivity,
            foreground_seeds,
            background_seeds,
        }
    }

    pub fn data_term(&self, labels: &LabelMap) -> f64 {
        let image = self.costs.image();
        (0..image.pixel_count())
            .map(|index| {
                let pixel = image.pixel_at(index);
                let label = labels.labels()[index];
                let seed = if self.foreground_seeds.contains(&pixel) {
                    Some(Label::Foreground)
                } else if self.background_seeds.contains(&pixel) {
                    Some(Label::Background)
                } else {
                    None
                };
                match seed {
                    Some(fixed) if fixed == label => 0.0,
                    Some(_) => f64::INFINITY,
                    None => self.costs.data_cost(pixel, label),
                }
            })
            .sum()
    }

    pub fn smoothness_term(&self, labels: &LabelMap) -> f64 {
        let (width, height) = self.costs.image().dimensions();
        self.connectivity
            .neighbor_pairs(width, height)
            .filter(|&(p, q, _)| labels.get(p) != labels.get(q))
            .map(|(p, q, _)| self.costs.neighbor_weight(p, q))
            .sum()
    }

    /// Total energy of `labels`; must match the image dimensions
    pub fn energy(&self, labels: &LabelMap) -> f64 {
        self.data_term(labels) + self.smoothness_term(labels)
    }
}
