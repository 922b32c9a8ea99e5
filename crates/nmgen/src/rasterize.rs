//! Contains methods for rasterizing triangles into a [`Heightfield`].
//!
//! Follows <https://github.com/recastnavigation/recastnavigation/blob/bd98d84c274ee06842bf51a4088ca82ac71f8c2d/Recast/Source/RecastRasterization.cpp>

use glam::{UVec3, Vec3A};
use thiserror::Error;

use crate::{
    heightfield::{Heightfield, SpanInsertion, SpanInsertionError},
    math::TriangleVertices as _,
    span::{AreaType, Span, SpanBuilder},
};

impl Heightfield {
    /// Rasterizes a single triangle into the heightfield.
    ///
    /// Spans produced by the triangle are tagged with `area`.
    /// `flag_merge_threshold` is the maximum difference between the ceilings of two overlapping spans
    /// for their area types to be merged. [Units: vx]
    pub fn rasterize_triangle(
        &mut self,
        triangle: [Vec3A; 3],
        area: AreaType,
        flag_merge_threshold: u16,
    ) -> Result<(), RasterizationError> {
        if self.width == 0 || self.height == 0 {
            return Ok(());
        }
        let triangle_aabb = triangle.aabb();
        // If the triangle does not touch the bounding box of the heightfield, skip the triangle.
        if !triangle_aabb.intersects(&self.aabb) {
            return Ok(());
        }

        let width = self.width as i32;
        let height = self.height as i32;
        let field_height = self.aabb.max.y - self.aabb.min.y;
        let inverse_cell_size = 1.0 / self.cell_size;
        let inverse_cell_height = 1.0 / self.cell_height;

        // Calculate the footprint of the triangle on the grid's z-axis
        let z0 = ((triangle_aabb.min.z - self.aabb.min.z) * inverse_cell_size) as i32;
        let z1 = ((triangle_aabb.max.z - self.aabb.min.z) * inverse_cell_size) as i32;
        // use -1 rather than 0 to cut the polygon properly at the start of the tile
        let z0 = z0.clamp(-1, height - 1);
        let z1 = z1.clamp(0, height - 1);

        // Clip the triangle into all grid cells it touches.
        let mut remaining = Polygon::from_triangle(triangle);
        for z in z0..=z1 {
            // Clip polygon to row. Store the remaining polygon as well
            let cell_z = self.aabb.min.z + z as f32 * self.cell_size;
            let (row, rest) = remaining.divide(cell_z + self.cell_size, Axis::Z);
            remaining = rest;

            if row.len() < 3 || z < 0 {
                continue;
            }

            // Find the horizontal bounds in the row
            let (min_x, max_x) = row
                .vertices()
                .iter()
                .fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), v| {
                    (min.min(v.x), max.max(v.x))
                });
            let x0 = ((min_x - self.aabb.min.x) * inverse_cell_size) as i32;
            let x1 = ((max_x - self.aabb.min.x) * inverse_cell_size) as i32;
            if x1 < 0 || x0 >= width {
                continue;
            }
            let x0 = x0.clamp(-1, width - 1);
            let x1 = x1.clamp(0, width - 1);

            let mut row_remaining = row;
            for x in x0..=x1 {
                // Clip polygon to column. Store the remaining polygon as well
                let cell_x = self.aabb.min.x + x as f32 * self.cell_size;
                let (cell, rest) = row_remaining.divide(cell_x + self.cell_size, Axis::X);
                row_remaining = rest;

                if cell.len() < 3 || x < 0 {
                    continue;
                }

                // Calculate min and max of the span.
                let (span_min, span_max) = cell
                    .vertices()
                    .iter()
                    .fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), v| {
                        (min.min(v.y), max.max(v.y))
                    });
                let span_min = span_min - self.aabb.min.y;
                let span_max = span_max - self.aabb.min.y;

                // Skip the span if it's completely outside the heightfield bounding box
                if span_max < 0.0 || span_min > field_height {
                    continue;
                }

                // Clamp the span to the heightfield bounding box.
                let span_min = span_min.max(0.0);
                let span_max = span_max.min(field_height);

                // Snap the span to the heightfield height grid.
                let max_height = Span::MAX_HEIGHT as i32;
                let span_min_cell =
                    ((span_min * inverse_cell_height).floor() as i32).clamp(0, max_height);
                let span_max_cell = ((span_max * inverse_cell_height).ceil() as i32)
                    .max(span_min_cell + 1)
                    .min(max_height);

                self.add_span(SpanInsertion {
                    x: x as u16,
                    z: z as u16,
                    flag_merge_threshold,
                    span: SpanBuilder {
                        min: span_min_cell as u16,
                        max: span_max_cell as u16,
                        area,
                        next: None,
                    }
                    .build(),
                })?;
            }
        }
        Ok(())
    }

    /// Rasterizes indexed triangles into the heightfield.
    ///
    /// Each entry of `indices` is one triangle and is tagged with the area at the same position in `areas`.
    /// All indices are validated before anything is rasterized, so on error the heightfield is unchanged.
    ///
    /// Corresponds to the indexed overloads of `rcRasterizeTriangles`.
    pub fn rasterize_indexed_triangles<T: IndexedTriangle>(
        &mut self,
        vertices: &[Vec3A],
        indices: &[T],
        areas: &[AreaType],
        flag_merge_threshold: u16,
    ) -> Result<(), RasterizationError> {
        if indices.len() != areas.len() {
            return Err(RasterizationError::AreaCountMismatch {
                triangles: indices.len(),
                areas: areas.len(),
            });
        }
        let mut triangles = Vec::with_capacity(indices.len());
        for (triangle_index, triangle) in indices.iter().enumerate() {
            let mut corners = [Vec3A::ZERO; 3];
            for (corner, vertex_index) in corners.iter_mut().zip(triangle.vertex_indices()) {
                *corner = vertex_index
                    .and_then(|i| vertices.get(i))
                    .copied()
                    .ok_or(RasterizationError::VertexIndexOutOfBounds {
                        triangle: triangle_index,
                        vertex_count: vertices.len(),
                    })?;
            }
            triangles.push(corners);
        }
        self.rasterize_validated(triangles, areas, flag_merge_threshold)
    }

    /// Rasterizes an unindexed triangle list: every three consecutive vertices form one triangle.
    ///
    /// Corresponds to the unindexed overload of `rcRasterizeTriangles`.
    pub fn rasterize_triangle_list(
        &mut self,
        vertices: &[Vec3A],
        areas: &[AreaType],
        flag_merge_threshold: u16,
    ) -> Result<(), RasterizationError> {
        if vertices.len() % 3 != 0 {
            return Err(RasterizationError::IncompleteTriangleList {
                vertex_count: vertices.len(),
            });
        }
        let triangle_count = vertices.len() / 3;
        if triangle_count != areas.len() {
            return Err(RasterizationError::AreaCountMismatch {
                triangles: triangle_count,
                areas: areas.len(),
            });
        }
        let triangles = vertices
            .chunks_exact(3)
            .map(|v| [v[0], v[1], v[2]])
            .collect::<Vec<_>>();
        self.rasterize_validated(triangles, areas, flag_merge_threshold)
    }

    fn rasterize_validated(
        &mut self,
        triangles: Vec<[Vec3A; 3]>,
        areas: &[AreaType],
        flag_merge_threshold: u16,
    ) -> Result<(), RasterizationError> {
        let triangle_count = triangles.len();
        for (triangle, area) in triangles.into_iter().zip(areas) {
            self.rasterize_triangle(triangle, *area, flag_merge_threshold)?;
        }
        tracing::trace!(
            triangle_count,
            span_count = self.allocated_spans.len(),
            "rasterized triangles"
        );
        Ok(())
    }
}

/// A triangle expressed as three indices into a vertex buffer.
pub trait IndexedTriangle {
    /// The vertex indices of the triangle. `None` for indices that cannot address a vertex, e.g. negative ones.
    fn vertex_indices(&self) -> [Option<usize>; 3];
}

impl IndexedTriangle for [u16; 3] {
    #[inline]
    fn vertex_indices(&self) -> [Option<usize>; 3] {
        self.map(|i| Some(i as usize))
    }
}

impl IndexedTriangle for [u32; 3] {
    #[inline]
    fn vertex_indices(&self) -> [Option<usize>; 3] {
        self.map(|i| usize::try_from(i).ok())
    }
}

impl IndexedTriangle for [i32; 3] {
    #[inline]
    fn vertex_indices(&self) -> [Option<usize>; 3] {
        self.map(|i| usize::try_from(i).ok())
    }
}

impl IndexedTriangle for UVec3 {
    #[inline]
    fn vertex_indices(&self) -> [Option<usize>; 3] {
        self.to_array().vertex_indices()
    }
}

/// Errors that can occur when rasterizing triangles into a [`Heightfield`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RasterizationError {
    /// A span could not be inserted into the heightfield.
    #[error(transparent)]
    SpanInsertion(#[from] SpanInsertionError),
    /// A triangle references a vertex that does not exist.
    #[error("triangle {triangle} references a vertex outside of the {vertex_count} available vertices")]
    VertexIndexOutOfBounds {
        /// The index of the offending triangle
        triangle: usize,
        /// The number of vertices that were provided
        vertex_count: usize,
    },
    /// The number of area types does not match the number of triangles.
    #[error("got {areas} area types for {triangles} triangles")]
    AreaCountMismatch {
        /// The number of triangles
        triangles: usize,
        /// The number of area types
        areas: usize,
    },
    /// A triangle list whose vertex count is not a multiple of three.
    #[error("triangle list has {vertex_count} vertices, which is not a multiple of 3")]
    IncompleteTriangleList {
        /// The number of vertices that were provided
        vertex_count: usize,
    },
}

#[derive(Debug, Clone, Copy)]
enum Axis {
    X,
    Z,
}

impl Axis {
    #[inline]
    fn component(self, vertex: Vec3A) -> f32 {
        match self {
            Axis::X => vertex.x,
            Axis::Z => vertex.z,
        }
    }
}

/// A convex polygon produced by clipping a triangle against grid lines.
#[derive(Debug, Clone, Copy)]
struct Polygon {
    vertices: [Vec3A; Polygon::MAX_VERTICES],
    len: usize,
}

impl Polygon {
    /// Room for a triangle clipped against a row and a cell (at most 7 vertices),
    /// plus the duplicates produced when vertices lie exactly on a clip line.
    const MAX_VERTICES: usize = 12;

    const EMPTY: Self = Self {
        vertices: [Vec3A::ZERO; Self::MAX_VERTICES],
        len: 0,
    };

    fn from_triangle(triangle: [Vec3A; 3]) -> Self {
        let mut polygon = Self::EMPTY;
        for vertex in triangle {
            polygon.push(vertex);
        }
        polygon
    }

    #[inline]
    fn len(&self) -> usize {
        self.len
    }

    #[inline]
    fn vertices(&self) -> &[Vec3A] {
        &self.vertices[..self.len]
    }

    #[inline]
    fn push(&mut self, vertex: Vec3A) {
        debug_assert!(self.len < Self::MAX_VERTICES);
        if self.len < Self::MAX_VERTICES {
            self.vertices[self.len] = vertex;
            self.len += 1;
        }
    }

    /// Divides the polygon into two along the line `axis == axis_offset`.
    /// The first polygon is the part below the line, the second the part above it.
    fn divide(&self, axis_offset: f32, axis: Axis) -> (Polygon, Polygon) {
        let mut below = Self::EMPTY;
        let mut above = Self::EMPTY;
        if self.len == 0 {
            return (below, above);
        }

        let mut deltas = [0.0_f32; Self::MAX_VERTICES];
        for (delta, vertex) in deltas.iter_mut().zip(self.vertices()) {
            *delta = axis_offset - axis.component(*vertex);
        }

        for a in 0..self.len {
            let b = if a == 0 { self.len - 1 } else { a - 1 };
            let same_side = (deltas[a] >= 0.0) == (deltas[b] >= 0.0);
            if !same_side {
                let s = deltas[b] / (deltas[b] - deltas[a]);
                let intersection = self.vertices[b] + (self.vertices[a] - self.vertices[b]) * s;
                below.push(intersection);
                above.push(intersection);
                // Add the current vertex to the polygon on its side. Vertices on the line were already added.
                if deltas[a] > 0.0 {
                    below.push(self.vertices[a]);
                } else if deltas[a] < 0.0 {
                    above.push(self.vertices[a]);
                }
            } else {
                // Same side. Vertices exactly on the line belong to both polygons.
                if deltas[a] >= 0.0 {
                    below.push(self.vertices[a]);
                }
                if deltas[a] <= 0.0 {
                    above.push(self.vertices[a]);
                }
            }
        }
        (below, above)
    }
}
