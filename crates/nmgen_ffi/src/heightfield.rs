//! `extern "C"` functions over an opaque [`Heightfield`] handle.
//!
//! Follows the calling conventions of Recast's `rcAllocHeightfield`, `rcRasterizeTriangles` and friends:
//! pointers to flat `float` arrays for vertices, one `unsigned char` area per triangle,
//! and a build context threaded through every mutating call.

use std::slice;

use glam::Vec3A;
use nmgen::{Aabb3d, AreaType, Heightfield, HeightfieldBuilder, IndexedTriangle};

use crate::{
    context::{BuildContext, LogCategory},
    error::BoundaryError,
    span_record::SpanRecord,
};

/// Dimensions of a heightfield, as reported by [`nmhf_get_field_info`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct HeightfieldInfo {
    /// The width of the heightfield along the x-axis in cell units
    pub width: i32,
    /// The height of the heightfield along the z-axis in cell units
    pub height: i32,
    /// The minimum bounds in world space
    pub bmin: [f32; 3],
    /// The maximum bounds in world space
    pub bmax: [f32; 3],
    /// The size of each cell on the xz-plane
    pub cell_size: f32,
    /// The size of each cell along the y-axis
    pub cell_height: f32,
}

impl From<&Heightfield> for HeightfieldInfo {
    fn from(heightfield: &Heightfield) -> Self {
        Self {
            width: heightfield.width as i32,
            height: heightfield.height as i32,
            bmin: heightfield.aabb.min.to_array(),
            bmax: heightfield.aabb.max.to_array(),
            cell_size: heightfield.cell_size,
            cell_height: heightfield.cell_height,
        }
    }
}

/// Allocates an empty heightfield of `width` x `height` columns spanning `[bmin, bmax]`.
///
/// Returns null if either bounds pointer is null or the heightfield cannot be built.
/// Release the handle with [`nmhf_free_field`].
///
/// # Safety
///
/// `bmin` and `bmax` must each be null or point to 3 readable floats.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nmhf_alloc_field(
    width: i32,
    height: i32,
    bmin: *const f32,
    bmax: *const f32,
    cell_size: f32,
    cell_height: f32,
) -> *mut Heightfield {
    // SAFETY: upheld by the caller.
    let bounds = unsafe { read_bounds(bmin, bmax) };
    let result = bounds.and_then(|aabb| build_field(width, height, aabb, cell_size, cell_height));
    match result {
        Ok(heightfield) => Box::into_raw(Box::new(heightfield)),
        Err(err) => {
            tracing::error!("Failed to allocate heightfield: {err}");
            std::ptr::null_mut()
        }
    }
}

/// Releases a heightfield allocated by [`nmhf_alloc_field`]. Does nothing for null.
///
/// # Safety
///
/// `handle` must be null or a pointer returned by [`nmhf_alloc_field`] that was not released yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nmhf_free_field(handle: *mut Heightfield) {
    if handle.is_null() {
        return;
    }
    // SAFETY: the pointer came from `Box::into_raw` and is released exactly once.
    drop(unsafe { Box::from_raw(handle) });
}

/// Rasterizes a single triangle, given as 9 floats, into the heightfield.
///
/// Returns `false` without touching the heightfield if any pointer is null.
/// A negative `flag_merge_threshold` is treated as 0, so spans with equal ceilings still merge their areas.
///
/// # Safety
///
/// `context` and `handle` must each be null or live with no other access during the call.
/// `vertices` must be null or point to 9 readable floats.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nmhf_rasterize_triangle(
    context: *mut BuildContext,
    vertices: *const f32,
    area: u8,
    handle: *mut Heightfield,
    flag_merge_threshold: i32,
) -> bool {
    const OP: &str = "nmhf_rasterize_triangle";
    // SAFETY: upheld by the caller.
    let Some((context, heightfield)) = (unsafe { borrow(OP, context, handle) }) else {
        return false;
    };
    // SAFETY: upheld by the caller.
    let Some(vertices) = (unsafe { slice_or_none(vertices, 9) }) else {
        return finish(context, OP, Err(BoundaryError::NullPointer("vertices")));
    };
    let triangle = [
        Vec3A::from_slice(&vertices[0..3]),
        Vec3A::from_slice(&vertices[3..6]),
        Vec3A::from_slice(&vertices[6..9]),
    ];
    let result = heightfield
        .rasterize_triangle(triangle, AreaType(area), voxels(flag_merge_threshold))
        .map_err(BoundaryError::from);
    finish(context, OP, result)
}

/// Rasterizes an indexed triangle mesh with 32-bit indices into the heightfield.
///
/// `indices` holds `3 * triangle_count` entries, `areas` holds `triangle_count`.
/// Returns `false` without touching the heightfield if any pointer is null
/// or any index does not address one of the `vertex_count` vertices.
/// A negative `flag_merge_threshold` is treated as 0, so spans with equal ceilings still merge their areas.
///
/// # Safety
///
/// `context` and `handle` must each be null or live with no other access during the call.
/// Each buffer must be null or readable for the length given by its count.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nmhf_rasterize_tri_mesh(
    context: *mut BuildContext,
    vertices: *const f32,
    vertex_count: i32,
    indices: *const i32,
    areas: *const u8,
    triangle_count: i32,
    handle: *mut Heightfield,
    flag_merge_threshold: i32,
) -> bool {
    // SAFETY: upheld by the caller.
    unsafe {
        rasterize_indexed::<i32>(
            "nmhf_rasterize_tri_mesh",
            context,
            vertices,
            vertex_count,
            indices,
            areas,
            triangle_count,
            handle,
            flag_merge_threshold,
        )
    }
}

/// Like [`nmhf_rasterize_tri_mesh`], but with 16-bit indices.
///
/// # Safety
///
/// Same as [`nmhf_rasterize_tri_mesh`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nmhf_rasterize_tri_mesh_short(
    context: *mut BuildContext,
    vertices: *const f32,
    vertex_count: i32,
    indices: *const u16,
    areas: *const u8,
    triangle_count: i32,
    handle: *mut Heightfield,
    flag_merge_threshold: i32,
) -> bool {
    // SAFETY: upheld by the caller.
    unsafe {
        rasterize_indexed::<u16>(
            "nmhf_rasterize_tri_mesh_short",
            context,
            vertices,
            vertex_count,
            indices,
            areas,
            triangle_count,
            handle,
            flag_merge_threshold,
        )
    }
}

/// Rasterizes an unindexed triangle list: vertices `3i`, `3i + 1` and `3i + 2` form triangle `i`.
///
/// `vertices` holds `9 * triangle_count` floats, `areas` holds `triangle_count` entries.
/// Returns `false` without touching the heightfield if any pointer is null.
/// A negative `flag_merge_threshold` is treated as 0, so spans with equal ceilings still merge their areas.
///
/// # Safety
///
/// `context` and `handle` must each be null or live with no other access during the call.
/// Each buffer must be null or readable for the length given by `triangle_count`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nmhf_rasterize_triangles(
    context: *mut BuildContext,
    vertices: *const f32,
    areas: *const u8,
    triangle_count: i32,
    handle: *mut Heightfield,
    flag_merge_threshold: i32,
) -> bool {
    const OP: &str = "nmhf_rasterize_triangles";
    // SAFETY: upheld by the caller.
    let Some((context, heightfield)) = (unsafe { borrow(OP, context, handle) }) else {
        return false;
    };
    let triangle_count = count(triangle_count);
    // SAFETY: upheld by the caller.
    let buffers = unsafe {
        (
            slice_or_none(vertices, triangle_count * 9),
            slice_or_none(areas.cast::<AreaType>(), triangle_count),
        )
    };
    let result = match buffers {
        (None, _) => Err(BoundaryError::NullPointer("vertices")),
        (_, None) => Err(BoundaryError::NullPointer("areas")),
        (Some(vertices), Some(areas)) => heightfield
            .rasterize_triangle_list(&read_vertices(vertices), areas, voxels(flag_merge_threshold))
            .map_err(BoundaryError::from),
    };
    finish(context, OP, result)
}

/// Marks non-walkable spans as walkable if they lie at most `walkable_climb` voxels
/// above a walkable span.
///
/// Returns `false` if `context` or `handle` is null.
///
/// # Safety
///
/// `context` and `handle` must each be null or live with no other access during the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nmhf_filter_low_hanging_walkable_obstacles(
    context: *mut BuildContext,
    walkable_climb: i32,
    handle: *mut Heightfield,
) -> bool {
    // SAFETY: upheld by the caller.
    unsafe {
        with_field("nmhf_filter_low_hanging_walkable_obstacles", context, handle, |heightfield| {
            heightfield.filter_low_hanging_walkable_obstacles(voxels(walkable_climb));
        })
    }
}

/// Marks spans that are ledges as non-walkable.
///
/// Returns `false` if `context` or `handle` is null.
///
/// # Safety
///
/// `context` and `handle` must each be null or live with no other access during the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nmhf_filter_ledge_spans(
    context: *mut BuildContext,
    walkable_height: i32,
    walkable_climb: i32,
    handle: *mut Heightfield,
) -> bool {
    // SAFETY: upheld by the caller.
    unsafe {
        with_field("nmhf_filter_ledge_spans", context, handle, |heightfield| {
            heightfield.filter_ledge_spans(voxels(walkable_height), voxels(walkable_climb));
        })
    }
}

/// Marks walkable spans as non-walkable if the clearance above them is less than `walkable_height`.
///
/// Returns `false` if `context` or `handle` is null.
///
/// # Safety
///
/// `context` and `handle` must each be null or live with no other access during the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nmhf_filter_walkable_low_height_spans(
    context: *mut BuildContext,
    walkable_height: i32,
    handle: *mut Heightfield,
) -> bool {
    // SAFETY: upheld by the caller.
    unsafe {
        with_field("nmhf_filter_walkable_low_height_spans", context, handle, |heightfield| {
            heightfield.filter_walkable_low_height_spans(voxels(walkable_height));
        })
    }
}

/// Returns the number of walkable spans in the heightfield, or 0 for null.
///
/// # Safety
///
/// `handle` must be null or a live heightfield.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nmhf_get_span_count(handle: *const Heightfield) -> i32 {
    // SAFETY: upheld by the caller.
    unsafe { handle.as_ref() }.map_or(0, |heightfield| saturate(heightfield.span_count()))
}

/// Returns the highest number of walkable spans in any single column, or 0 for null.
///
/// Walks the whole heightfield on every call.
///
/// # Safety
///
/// `handle` must be null or a live heightfield.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nmhf_get_max_spans_in_column(handle: *const Heightfield) -> i32 {
    // SAFETY: upheld by the caller.
    unsafe { handle.as_ref() }.map_or(0, |heightfield| saturate(heightfield.max_spans_in_column()))
}

/// Copies the walkable spans of column `(x, y)` into `spans`, bottom to top.
///
/// Returns the number of records written, or -1 if a pointer is null, the column does not exist
/// or the column holds more than `capacity` walkable spans. On -1 the buffer may be partially written.
///
/// # Safety
///
/// `handle` must be null or a live heightfield. `spans` must be null or writable for `capacity` records.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nmhf_get_spans(
    handle: *const Heightfield,
    x: i32,
    y: i32,
    spans: *mut SpanRecord,
    capacity: i32,
) -> i32 {
    // SAFETY: upheld by the caller.
    let Some(heightfield) = (unsafe { handle.as_ref() }) else {
        return -1;
    };
    if spans.is_null() {
        return -1;
    }
    // SAFETY: non-null and writable for `capacity` records per the caller's contract.
    let buffer = unsafe { slice::from_raw_parts_mut(spans, count(capacity)) };
    match copy_spans(heightfield, x, y, buffer) {
        Ok(written) => saturate(written),
        Err(err) => {
            tracing::debug!("nmhf_get_spans: {err}");
            -1
        }
    }
}

/// Writes the dimensions of the heightfield into `info`.
///
/// Returns `false` if either pointer is null.
///
/// # Safety
///
/// `handle` must be null or a live heightfield. `info` must be null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nmhf_get_field_info(
    handle: *const Heightfield,
    info: *mut HeightfieldInfo,
) -> bool {
    // SAFETY: upheld by the caller.
    let (Some(heightfield), Some(info)) = (unsafe { handle.as_ref() }, unsafe { info.as_mut() })
    else {
        return false;
    };
    *info = HeightfieldInfo::from(heightfield);
    true
}

fn build_field(
    width: i32,
    height: i32,
    aabb: Aabb3d,
    cell_size: f32,
    cell_height: f32,
) -> Result<Heightfield, BoundaryError> {
    let (Ok(w), Ok(h)) = (u16::try_from(width), u16::try_from(height)) else {
        return Err(BoundaryError::InvalidDimensions { width, height });
    };
    let heightfield = HeightfieldBuilder {
        width: w,
        height: h,
        aabb,
        cell_size,
        cell_height,
    }
    .build()?;
    Ok(heightfield)
}

fn copy_spans(
    heightfield: &Heightfield,
    x: i32,
    y: i32,
    buffer: &mut [SpanRecord],
) -> Result<usize, BoundaryError> {
    if !heightfield.contains(x, y) {
        return Err(BoundaryError::ColumnOutOfBounds { x, y });
    }
    let spans = heightfield
        .walkable_spans_in_column(x as u16, y as u16)
        .ok_or(BoundaryError::ColumnOutOfBounds { x, y })?;
    let capacity = buffer.len();
    let mut written = 0;
    for span in spans {
        let slot = buffer
            .get_mut(written)
            .ok_or(BoundaryError::BufferTooSmall { capacity })?;
        *slot = SpanRecord::from(span);
        written += 1;
    }
    Ok(written)
}

unsafe fn rasterize_indexed<T>(
    op: &'static str,
    context: *mut BuildContext,
    vertices: *const f32,
    vertex_count: i32,
    indices: *const T,
    areas: *const u8,
    triangle_count: i32,
    handle: *mut Heightfield,
    flag_merge_threshold: i32,
) -> bool
where
    [T; 3]: IndexedTriangle,
{
    // SAFETY: upheld by the caller.
    let Some((context, heightfield)) = (unsafe { borrow(op, context, handle) }) else {
        return false;
    };
    let triangle_count = count(triangle_count);
    // SAFETY: upheld by the caller.
    let buffers = unsafe {
        (
            slice_or_none(vertices, count(vertex_count) * 3),
            slice_or_none(indices.cast::<[T; 3]>(), triangle_count),
            slice_or_none(areas.cast::<AreaType>(), triangle_count),
        )
    };
    let result = match buffers {
        (None, _, _) => Err(BoundaryError::NullPointer("vertices")),
        (_, None, _) => Err(BoundaryError::NullPointer("indices")),
        (_, _, None) => Err(BoundaryError::NullPointer("areas")),
        (Some(vertices), Some(indices), Some(areas)) => heightfield
            .rasterize_indexed_triangles(
                &read_vertices(vertices),
                indices,
                areas,
                voxels(flag_merge_threshold),
            )
            .map_err(BoundaryError::from),
    };
    finish(context, op, result)
}

unsafe fn with_field(
    op: &str,
    context: *mut BuildContext,
    handle: *mut Heightfield,
    filter: impl FnOnce(&mut Heightfield),
) -> bool {
    // SAFETY: upheld by the caller.
    let Some((_, heightfield)) = (unsafe { borrow(op, context, handle) }) else {
        return false;
    };
    filter(heightfield);
    true
}

/// Logs a failed call to `tracing` and to the context, then collapses the result to a `bool`.
fn finish(context: &mut BuildContext, op: &str, result: Result<(), BoundaryError>) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            context.log(LogCategory::Error, format!("{op}: {err}"));
            false
        }
    }
}

/// Borrows the context and the heightfield, or logs which one is null.
unsafe fn borrow<'a>(
    op: &str,
    context: *mut BuildContext,
    handle: *mut Heightfield,
) -> Option<(&'a mut BuildContext, &'a mut Heightfield)> {
    // SAFETY: upheld by the caller.
    match unsafe { (context.as_mut(), handle.as_mut()) } {
        (Some(context), Some(heightfield)) => Some((context, heightfield)),
        (None, _) => {
            tracing::error!("{op}: {}", BoundaryError::NullPointer("context"));
            None
        }
        (Some(context), None) => {
            context.log(
                LogCategory::Error,
                format!("{op}: {}", BoundaryError::NullPointer("handle")),
            );
            None
        }
    }
}

unsafe fn read_bounds(bmin: *const f32, bmax: *const f32) -> Result<Aabb3d, BoundaryError> {
    // SAFETY: upheld by the caller.
    let (Some(min), Some(max)) = (unsafe { slice_or_none(bmin, 3) }, unsafe {
        slice_or_none(bmax, 3)
    }) else {
        return Err(BoundaryError::NullPointer("bounds"));
    };
    Ok(Aabb3d::new(Vec3A::from_slice(min), Vec3A::from_slice(max)))
}

/// Borrows `len` elements starting at `ptr`, or `None` if `ptr` is null.
unsafe fn slice_or_none<'a, T>(ptr: *const T, len: usize) -> Option<&'a [T]> {
    if ptr.is_null() {
        return None;
    }
    if len == 0 {
        return Some(&[]);
    }
    // SAFETY: non-null and readable for `len` elements per the caller's contract.
    Some(unsafe { slice::from_raw_parts(ptr, len) })
}

fn read_vertices(flat: &[f32]) -> Vec<Vec3A> {
    flat.chunks_exact(3).map(Vec3A::from_slice).collect()
}

/// Negative counts are treated as empty.
#[inline]
fn count(value: i32) -> usize {
    usize::try_from(value).unwrap_or(0)
}

/// Negative voxel distances are treated as zero.
#[inline]
fn voxels(value: i32) -> u16 {
    value.clamp(0, u16::MAX as i32) as u16
}

#[inline]
fn saturate(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
