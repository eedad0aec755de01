use thiserror::Error;

use crate::grid::Pixel;

/// Which of the two seed sets an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedKind {
    Foreground,
    Background,
}

impl std::fmt::Display for SeedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Foreground => write!(f, "foreground"),
            Self::Background => write!(f, "background"),
        }
    }
}

/// Errors surfaced by the segmentation core
///
/// All of these are detected before any graph work is done, except
/// `Cancelled`, which the solver returns when asked to stop.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SegmentationError {
    #[error("image has no pixels")]
    EmptyImage,

    #[error("invalid {kind} seed set: {reason}")]
    InvalidSeedSet { kind: SeedKind, reason: String },

    #[error("pixel {pixel} is both a foreground and a background seed")]
    ConflictingSeed { pixel: Pixel },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("segmentation was cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, SegmentationError>;
