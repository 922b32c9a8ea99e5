//! A flat C-linkage boundary over [`nmgen`].
//!
//! Heightfields and build contexts cross the boundary as opaque pointers that the caller
//! allocates and frees explicitly. Failures never unwind: they collapse to a null handle,
//! `false`, `0` or `-1`, and are logged through `tracing` and the build context.
//!
//! None of the functions synchronize. A handle must not be used from two threads at once.

mod context;
mod error;
mod heightfield;
mod span_record;

pub use context::{
    BuildContext, LogCategory, nmbc_alloc_context, nmbc_enable_log, nmbc_free_context,
    nmbc_get_log_messages, nmbc_get_message_count, nmbc_log, nmbc_reset_log,
};
pub use error::BoundaryError;
pub use heightfield::{
    HeightfieldInfo, nmhf_alloc_field, nmhf_filter_ledge_spans,
    nmhf_filter_low_hanging_walkable_obstacles, nmhf_filter_walkable_low_height_spans,
    nmhf_free_field, nmhf_get_field_info, nmhf_get_max_spans_in_column, nmhf_get_span_count,
    nmhf_get_spans, nmhf_rasterize_tri_mesh, nmhf_rasterize_tri_mesh_short,
    nmhf_rasterize_triangle, nmhf_rasterize_triangles,
};
pub use nmgen::Heightfield;
pub use span_record::SpanRecord;
