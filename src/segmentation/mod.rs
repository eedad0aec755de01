mod appearance;
mod cost;
mod engine;
mod graph;
mod maxflow;
pub mod types;

pub use appearance::{AppearanceModel, BinLayout, MAX_HISTOGRAM_CELLS, PROBABILITY_FLOOR};
pub use cost::{estimate_sigma, CostFunction, EnergyFunction};
pub use engine::SegmentationEngine;
pub use graph::{FlowNetwork, GraphBuilder, NeighborEdge, HARD_CONSTRAINT};
pub use maxflow::{MinCut, MinCutSolver, SolverStats};
pub use types::{
    CancellationToken, Label, LabelMap, SeedSet, Segmentation, SegmentationConfig, Segmenter,
    ValueRange,
};
