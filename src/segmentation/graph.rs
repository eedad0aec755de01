use super::appearance::AppearanceModel;
use super::cost::CostFunction;
use super::types::{Label, SeedSet};
use crate::error::{Result, SegmentationError, SeedKind};
use crate::grid::{Connectivity, PixelSource};
use rayon::prelude::*;

/// Capacity standing in for "never cut this edge"
pub const HARD_CONSTRAINT: f64 = f64::INFINITY;

/// Pair of opposite directed edges between two non-terminal nodes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborEdge {
    pub from: usize,
    pub to: usize,
    /// Capacity of `from -> to`
    pub capacity: f64,
    /// Capacity of `to -> from`
    pub reverse_capacity: f64,
}

/// Capacitated network with implicit SOURCE and SINK terminals
///
/// Every node has one edge from SOURCE and one edge to SINK. Cutting the
/// SOURCE edge puts the node on the sink side, so its capacity is the price
/// of that outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowNetwork {
    source_caps: Vec<f64>,
    sink_caps: Vec<f64>,
    edges: Vec<NeighborEdge>,
}

impl FlowNetwork {
    pub fn new(node_count: usize) -> Self {
        Self {
            source_caps: vec![0.0; node_count],
            sink_caps: vec![0.0; node_count],
            edges: Vec::new(),
        }
    }

    pub fn with_edge_capacity(node_count: usize, edges: usize) -> Self {
        let mut network = Self::new(node_count);
        network.edges.reserve(edges);
        network
    }

    pub fn node_count(&self) -> usize {
        self.source_caps.len()
    }

    /// Capacities of `SOURCE -> node` and `node -> SINK`
    ///
    /// At most one of the two may be infinite.
    pub fn set_terminal_weights(&mut self, node: usize, source: f64, sink: f64) {
        debug_assert!(
            !(source.is_infinite() && sink.is_infinite()),
            "node {node} tied to both terminals"
        );
        self.source_caps[node] = source;
        self.sink_caps[node] = sink;
    }

    /// Adds `from -> to` and `to -> from`, returning the edge id
    pub fn add_edge(&mut self, from: usize, to: usize, capacity: f64, reverse_capacity: f64) -> usize {
        self.edges.push(NeighborEdge {
            from,
            to,
            capacity,
            reverse_capacity,
        });
        self.edges.len() - 1
    }

    pub fn source_capacity(&self, node: usize) -> f64 {
        self.source_caps[node]
    }

    pub fn sink_capacity(&self, node: usize) -> f64 {
        self.sink_caps[node]
    }

    pub fn edges(&self) -> &[NeighborEdge] {
        &self.edges
    }

    /// Sum of the capacities that cross from the source side to the sink side
    pub fn cut_capacity(&self, source_side: &[bool]) -> f64 {
        let terminal: f64 = (0..self.node_count())
            .map(|node| {
                if source_side[node] {
                    self.sink_caps[node]
                } else {
                    self.source_caps[node]
                }
            })
            .sum();
        let neighbors: f64 = self
            .edges
            .iter()
            .map(|e| match (source_side[e.from], source_side[e.to]) {
                (true, false) => e.capacity,
                (false, true) => e.reverse_capacity,
                _ => 0.0,
            })
            .sum();
        terminal + neighbors
    }
}

/// Encodes the segmentation energy of an image as a `FlowNetwork`
///
/// Pixel nodes are numbered row-major. SOURCE stands for foreground and
/// SINK for background.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphBuilder {
    connectivity: Connectivity,
}

impl GraphBuilder {
    pub fn new(connectivity: Connectivity) -> Self {
        Self { connectivity }
    }

    pub fn build<I: PixelSource>(
        &self,
        image: &I,
        foreground: &AppearanceModel,
        background: &AppearanceModel,
        lambda: f64,
        foreground_seeds: &SeedSet,
        background_seeds: &SeedSet,
    ) -> Result<FlowNetwork> {
        let costs = CostFunction::new(image, foreground, background, lambda, self.connectivity);
        self.build_with_costs(&costs, foreground_seeds, background_seeds)
    }

    pub fn build_with_costs<I: PixelSource>(
        &self,
        costs: &CostFunction<'_, I>,
        foreground_seeds: &SeedSet,
        background_seeds: &SeedSet,
    ) -> Result<FlowNetwork> {
        let _span = tracing::debug_span!("build_network").entered();
        let image = costs.image();

        check_seed_sets(image, foreground_seeds, background_seeds)?;

        let (width, height) = image.dimensions();
        let node_count = image.pixel_count();
        let edge_estimate = match self.connectivity {
            Connectivity::Four => 2 * node_count,
            Connectivity::Eight => 4 * node_count,
        };
        let mut network = FlowNetwork::with_edge_capacity(node_count, edge_estimate);

        // Pixel-local, so each weight pair lands in its own slot.
        let terminal: Vec<(f64, f64)> = (0..node_count)
            .into_par_iter()
            .map(|node| {
                let pixel = image.pixel_at(node);
                (
                    costs.data_cost(pixel, Label::Background),
                    costs.data_cost(pixel, Label::Foreground),
                )
            })
            .collect();
        for (node, (source, sink)) in terminal.into_iter().enumerate() {
            network.set_terminal_weights(node, source, sink);
        }

        for &pixel in foreground_seeds {
            network.set_terminal_weights(image.index_of(pixel), HARD_CONSTRAINT, 0.0);
        }
        for &pixel in background_seeds {
            network.set_terminal_weights(image.index_of(pixel), 0.0, HARD_CONSTRAINT);
        }

        for (p, q, _) in self.connectivity.neighbor_pairs(width, height) {
            let weight = costs.neighbor_weight(p, q);
            network.add_edge(image.index_of(p), image.index_of(q), weight, weight);
        }

        tracing::debug!(
            "Network: {} nodes, {} neighbor edges, {} + {} seeds",
            network.node_count(),
            network.edges().len(),
            foreground_seeds.len(),
            background_seeds.len()
        );

        Ok(network)
    }
}

/// Both seed sets must be non-empty, in bounds and disjoint
///
/// A pixel in both sets is reported as the first such pixel in row-major
/// order.
pub(super) fn check_seed_sets<I: PixelSource>(
    image: &I,
    foreground: &SeedSet,
    background: &SeedSet,
) -> Result<()> {
    check_seeds(image, foreground, SeedKind::Foreground)?;
    check_seeds(image, background, SeedKind::Background)?;
    match foreground.intersection(background).next() {
        Some(&pixel) => Err(SegmentationError::ConflictingSeed { pixel }),
        None => Ok(()),
    }
}

pub(super) fn check_seeds<I: PixelSource>(image: &I, seeds: &SeedSet, kind: SeedKind) -> Result<()> {
    if seeds.is_empty() {
        return Err(SegmentationError::InvalidSeedSet {
            kind,
            reason: "no seed pixels".to_string(),
        });
    }
    match seeds.iter().find(|&&p| !image.contains(p)) {
        Some(pixel) => {
            let (width, height) = image.dimensions();
            Err(SegmentationError::InvalidSeedSet {
                kind,
                reason: format!("seed {pixel} lies outside the {width}x{height} image"),
            })
        }
        None => Ok(()),
    }
}
