#![doc = include_str!("../../../readme.md")]

mod config;
mod heightfield;
mod main_api;
pub(crate) mod math;
mod pre_filter;
mod rasterize;
mod span;
mod trimesh;

pub use config::{HeightfieldConfig, HeightfieldConfigBuilder};
pub use heightfield::{
    ColumnSpans, Heightfield, HeightfieldBuilder, HeightfieldBuilderError, SpanInsertionError,
};
pub use math::Aabb3d;
pub use rasterize::{IndexedTriangle, RasterizationError};
pub use span::{AreaType, Span, SpanKey, Spans};
pub use trimesh::TriMesh;
