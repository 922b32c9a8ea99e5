use nmgen::{HeightfieldBuilderError, RasterizationError};
use thiserror::Error;

/// Why a boundary call was rejected. Never crosses the boundary itself:
/// callers only see the null / `false` / `-1` the exported function returns.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoundaryError {
    /// A required pointer argument was null.
    #[error("required argument `{0}` is null")]
    NullPointer(&'static str),
    /// The requested grid dimensions do not fit a heightfield.
    #[error("invalid heightfield dimensions {width}x{height}")]
    InvalidDimensions {
        /// The requested width
        width: i32,
        /// The requested height
        height: i32,
    },
    /// The column coordinates are outside of the heightfield.
    #[error("column ({x}, {y}) is outside of the heightfield")]
    ColumnOutOfBounds {
        /// The requested x-coordinate
        x: i32,
        /// The requested y-coordinate
        y: i32,
    },
    /// The output buffer cannot hold all spans of the column.
    #[error("span buffer of capacity {capacity} is too small")]
    BufferTooSmall {
        /// The capacity of the caller's buffer
        capacity: usize,
    },
    /// The heightfield could not be constructed.
    #[error(transparent)]
    Build(#[from] HeightfieldBuilderError),
    /// The geometry could not be rasterized.
    #[error(transparent)]
    Rasterization(#[from] RasterizationError),
}
