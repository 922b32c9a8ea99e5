//! The heightfield module contains the types and functions for working with [`Heightfield`]s.
//!
//! A heightfield is a 3D grid of [`Span`]s, where each column contains 0, 1, or more spans.

use thiserror::Error;

use crate::{
    Aabb3d,
    span::{Span, SpanKey, Spans},
};

/// Corresponds to <https://github.com/recastnavigation/recastnavigation/blob/bd98d84c274ee06842bf51a4088ca82ac71f8c2d/Recast/Include/Recast.h#L312>
/// Build with [`HeightfieldBuilder`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Heightfield {
    /// The width of the heightfield along the x-axis in cell units
    pub width: u16,
    /// The height of the heightfield along the z-axis in cell units
    pub height: u16,
    /// The AABB of the heightfield
    pub aabb: Aabb3d,
    /// The size of each cell on the xz-plane
    pub cell_size: f32,
    /// The size of each cell along the y-axis
    pub cell_height: f32,
    /// The indices to the spans in the heightfield in width*height order
    /// Each index corresponds to a column in the heightfield by pointing to the lowest span in the column
    pub spans: Vec<Option<SpanKey>>,
    /// All spans in the heightfield
    pub allocated_spans: Spans,
}

impl Heightfield {
    /// https://github.com/recastnavigation/recastnavigation/blob/bd98d84c274ee06842bf51a4088ca82ac71f8c2d/Recast/Source/RecastRasterization.cpp#L105
    #[inline]
    pub(crate) fn add_span(&mut self, insertion: SpanInsertion) -> Result<(), SpanInsertionError> {
        if !self.contains(insertion.x as i32, insertion.z as i32) {
            return Err(SpanInsertionError::ColumnIndexOutOfBounds {
                x: insertion.x,
                z: insertion.z,
            });
        }
        let column_index = self.column_index(insertion.x, insertion.z);

        let mut new_span = insertion.span;
        let mut previous_span_key = None;
        let mut current_span_key_iter = self.spans[column_index];
        // Insert the new span, possibly merging it with existing spans.
        while let Some(current_span_key) = current_span_key_iter {
            let current_span = self.span(current_span_key);
            if current_span.min() > new_span.max() {
                // Current span is completely above the new span, break.
                break;
            }
            if current_span.max() < new_span.min() {
                // Current span is completely below the new span.  Keep going.
                previous_span_key.replace(current_span_key);
                current_span_key_iter = current_span.next();
                continue;
            }
            // The new span overlaps with an existing span.  Merge them.
            if current_span.min() < new_span.min() {
                new_span.set_min(current_span.min());
            }
            if current_span.max() > new_span.max() {
                new_span.set_max(current_span.max());
            }

            // Merge flags.
            if (new_span.max() as i32 - current_span.max() as i32).unsigned_abs()
                <= insertion.flag_merge_threshold as u32
            {
                // Higher area ID numbers indicate higher resolution priority.
                let area = new_span.area().max(current_span.area());
                new_span.set_area(area);
            }

            // Remove the current span since it's now merged with newSpan.
            // Keep going because there might be other overlapping spans that also need to be merged.
            let next_key = current_span.next();
            self.allocated_spans.remove(current_span_key);
            if let Some(previous_span_key) = previous_span_key {
                self.span_mut(previous_span_key).set_next(next_key);
            } else {
                self.spans[column_index] = next_key;
            }
            current_span_key_iter = next_key;
        }

        if let Some(previous_span_key) = previous_span_key {
            // Insert new span after prev
            new_span.set_next(self.span(previous_span_key).next());
            let new_span_key = self.allocated_spans.insert(new_span);
            self.span_mut(previous_span_key).set_next(new_span_key);
        } else {
            // This span should go before the others in the list
            let lowest_span_key = self.spans[column_index];
            new_span.set_next(lowest_span_key);
            let new_span_key = self.allocated_spans.insert(new_span);
            self.spans[column_index] = Some(new_span_key);
        }

        Ok(())
    }

    #[inline]
    pub(crate) fn column_index(&self, x: u16, z: u16) -> usize {
        x as usize + z as usize * self.width as usize
    }

    /// Returns `true` if `(x, z)` addresses a column of this heightfield.
    #[inline]
    pub fn contains(&self, x: i32, z: i32) -> bool {
        x >= 0 && x < self.width as i32 && z >= 0 && z < self.height as i32
    }

    /// Returns the key of the lowest span in the column at the given coordinates.
    /// `None` if either the index is out of bounds or there is no span in the column.
    #[inline]
    pub fn span_key_at(&self, x: u16, z: u16) -> Option<SpanKey> {
        if !self.contains(x as i32, z as i32) {
            // Invalid coordinates
            return None;
        }
        self.spans[self.column_index(x, z)]
    }

    /// Returns the span at the given coordinates.
    /// `None` if either the index is out of bounds or there is no span in the column.
    #[inline]
    pub fn span_at(&self, x: u16, z: u16) -> Option<&Span> {
        let Some(span_key) = self.span_key_at(x, z) else {
            // No span in this column
            return None;
        };
        Some(self.span(span_key))
    }

    /// Returns a reference to the span with the given key.
    /// # Panics
    /// Panics if the key is not found.
    #[inline]
    pub fn span(&self, key: SpanKey) -> &Span {
        &self.allocated_spans[key]
    }

    /// Returns a mutable reference to the span with the given key.
    /// # Panics
    /// Panics if the key is not found.
    #[inline]
    pub fn span_mut(&mut self, key: SpanKey) -> &mut Span {
        &mut self.allocated_spans[key]
    }

    /// Iterates over all spans of the column at the given coordinates, from bottom to top.
    /// `None` if the coordinates are out of bounds.
    #[inline]
    pub fn column(&self, x: u16, z: u16) -> Option<ColumnSpans<'_>> {
        if !self.contains(x as i32, z as i32) {
            return None;
        }
        Some(ColumnSpans {
            heightfield: self,
            next: self.spans[self.column_index(x, z)],
        })
    }

    /// Iterates over the walkable spans of the column at the given coordinates, from bottom to top.
    /// `None` if the coordinates are out of bounds.
    pub fn walkable_spans_in_column(
        &self,
        x: u16,
        z: u16,
    ) -> Option<impl Iterator<Item = &Span> + '_> {
        let column = self.column(x, z)?;
        Some(column.filter(|span| span.area().is_walkable()))
    }

    /// Returns the number of walkable spans in the whole heightfield.
    ///
    /// Corresponds to `rcGetHeightFieldSpanCount`.
    pub fn span_count(&self) -> usize {
        self.allocated_spans
            .values()
            .filter(|span| span.area().is_walkable())
            .count()
    }

    /// Returns the highest number of walkable spans found in any single column.
    ///
    /// Not cached, every call walks all columns.
    pub fn max_spans_in_column(&self) -> usize {
        let mut max_count = 0;
        for z in 0..self.height {
            for x in 0..self.width {
                let count = self
                    .walkable_spans_in_column(x, z)
                    .map_or(0, |spans| spans.count());
                max_count = max_count.max(count);
            }
        }
        max_count
    }
}

/// Iterator over the spans of a single column of a [`Heightfield`], from bottom to top.
/// Created by [`Heightfield::column`].
#[derive(Debug, Clone)]
pub struct ColumnSpans<'a> {
    heightfield: &'a Heightfield,
    next: Option<SpanKey>,
}

impl<'a> Iterator for ColumnSpans<'a> {
    type Item = &'a Span;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.next?;
        let span = self.heightfield.span(key);
        self.next = span.next();
        Some(span)
    }
}

/// A builder for [`Heightfield`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightfieldBuilder {
    /// The width of the heightfield along the x-axis in cell units
    pub width: u16,
    /// The height of the heightfield along the z-axis in cell units
    pub height: u16,
    /// The AABB of the heightfield
    pub aabb: Aabb3d,
    /// The size of each cell on the xz-plane
    pub cell_size: f32,
    /// The size of each cell along the y-axis
    pub cell_height: f32,
}

impl HeightfieldBuilder {
    /// Creates a builder whose width and height cover `aabb` with cells of `cell_size`.
    pub fn from_aabb(
        aabb: Aabb3d,
        cell_size: f32,
        cell_height: f32,
    ) -> Result<Self, HeightfieldBuilderError> {
        if !(cell_size > 0.0 && cell_size.is_finite()) {
            return Err(HeightfieldBuilderError::InvalidCellSize(cell_size));
        }
        let width = (aabb.max.x - aabb.min.x) / cell_size + 0.5;
        let height = (aabb.max.z - aabb.min.z) / cell_size + 0.5;
        if !(0.0..=u16::MAX as f32).contains(&width) || !(0.0..=u16::MAX as f32).contains(&height)
        {
            return Err(HeightfieldBuilderError::ColumnCountTooLarge { width, height });
        }
        Ok(Self {
            width: width as u16,
            height: height as u16,
            aabb,
            cell_size,
            cell_height,
        })
    }

    /// Builds the heightfield.
    ///
    /// Corresponds to `rcCreateHeightfield`.
    pub fn build(self) -> Result<Heightfield, HeightfieldBuilderError> {
        if !(self.cell_size > 0.0 && self.cell_size.is_finite()) {
            return Err(HeightfieldBuilderError::InvalidCellSize(self.cell_size));
        }
        if !(self.cell_height > 0.0 && self.cell_height.is_finite()) {
            return Err(HeightfieldBuilderError::InvalidCellHeight(self.cell_height));
        }
        let column_count = self.width as usize * self.height as usize;
        let mut spans = Vec::new();
        spans
            .try_reserve_exact(column_count)
            .map_err(|_| HeightfieldBuilderError::AllocationFailed { column_count })?;
        spans.resize(column_count, None);
        Ok(Heightfield {
            width: self.width,
            height: self.height,
            aabb: self.aabb,
            cell_size: self.cell_size,
            cell_height: self.cell_height,
            spans,
            allocated_spans: Spans::default(),
        })
    }
}

/// Errors that can occur when building a [`Heightfield`] with [`HeightfieldBuilder::build`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HeightfieldBuilderError {
    /// Happens when the column count is too large.
    #[error(
        "Heightfield dimensions out of range, got {width}*{height} but each side must be within 0..={max}",
        max = u16::MAX
    )]
    ColumnCountTooLarge {
        /// The width of the heightfield along the x-axis in cell units
        width: f32,
        /// The height of the heightfield along the z-axis in cell units
        height: f32,
    },
    /// Happens when the cell size is not a positive, finite number.
    #[error("Cell size must be positive and finite, got {0}")]
    InvalidCellSize(f32),
    /// Happens when the cell height is not a positive, finite number.
    #[error("Cell height must be positive and finite, got {0}")]
    InvalidCellHeight(f32),
    /// Happens when the memory for the columns cannot be allocated.
    #[error("Failed to allocate {column_count} heightfield columns")]
    AllocationFailed {
        /// The number of columns that were requested
        column_count: usize,
    },
}

/// Errors that can occur when inserting a span into a [`Heightfield`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpanInsertionError {
    /// Happens when the column index is out of bounds.
    #[error("column index out of bounds: x={x}, z={z}")]
    ColumnIndexOutOfBounds {
        /// The x-coordinate of the span
        x: u16,
        /// The z-coordinate of the span
        z: u16,
    },
}

pub(crate) struct SpanInsertion {
    /// The x-coordinate of the span
    pub(crate) x: u16,
    /// The z-coordinate of the span
    pub(crate) z: u16,
    /// Maximum difference between the ceilings of two spans to merge area type IDs
    pub(crate) flag_merge_threshold: u16,
    /// The span to insert
    pub(crate) span: Span,
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::span::{AreaType, SpanBuilder};

    use super::*;

    pub(crate) fn height_field() -> Heightfield {
        HeightfieldBuilder {
            width: 5,
            height: 5,
            aabb: Aabb3d::new([0.0, 0.0, 0.0], [5.0, 5.0, 5.0]),
            cell_size: 1.0,
            cell_height: 1.0,
        }
        .build()
        .unwrap()
    }

    /// Inserts a span without merging areas.
    pub(crate) fn push_span(
        heightfield: &mut Heightfield,
        x: u16,
        z: u16,
        min: u16,
        max: u16,
        area: u8,
    ) {
        heightfield
            .add_span(SpanInsertion {
                x,
                z,
                flag_merge_threshold: 0,
                span: SpanBuilder {
                    min,
                    max,
                    area: AreaType(area),
                    next: None,
                }
                .build(),
            })
            .unwrap();
    }

    fn span_low() -> SpanBuilder {
        SpanBuilder {
            min: 2,
            max: 4,
            area: AreaType(2),
            next: None,
        }
    }

    fn span_mid() -> SpanBuilder {
        SpanBuilder {
            min: 4,
            max: 7,
            area: AreaType(2),
            next: None,
        }
    }

    fn span_high() -> SpanBuilder {
        SpanBuilder {
            min: 7,
            max: 10,
            area: AreaType(2),
            next: None,
        }
    }

    #[test]
    fn can_create_heightfield() {
        let heightfield = height_field();
        assert_eq!(heightfield.spans.len(), 25);
        assert_eq!(heightfield.span_count(), 0);
        assert_eq!(heightfield.max_spans_in_column(), 0);
    }

    #[test]
    fn builder_from_aabb_rounds_dimensions() {
        let builder =
            HeightfieldBuilder::from_aabb(Aabb3d::new([0.0; 3], [3.0, 3.0, 3.0]), 0.3, 0.2)
                .unwrap();
        assert_eq!(builder.width, 10);
        assert_eq!(builder.height, 10);
    }

    #[test]
    fn rejects_invalid_cell_dimensions() {
        let mut builder = HeightfieldBuilder {
            width: 2,
            height: 2,
            aabb: Aabb3d::new([0.0; 3], [1.0; 3]),
            cell_size: 0.0,
            cell_height: 1.0,
        };
        assert_eq!(
            builder.clone().build().unwrap_err(),
            HeightfieldBuilderError::InvalidCellSize(0.0)
        );
        builder.cell_size = 1.0;
        builder.cell_height = f32::NAN;
        assert!(matches!(
            builder.build(),
            Err(HeightfieldBuilderError::InvalidCellHeight(_))
        ));
    }

    #[test]
    fn can_add_span() {
        let mut heightfield = height_field();
        let expected_span = span_low().build();
        heightfield
            .add_span(SpanInsertion {
                x: 1,
                z: 3,
                flag_merge_threshold: 0,
                span: expected_span.clone(),
            })
            .unwrap();
        let span = heightfield.span_at(1, 3).unwrap();
        assert_eq!(*span, expected_span);

        let empty_span = heightfield.span_at(3, 1);
        assert_eq!(empty_span, None);
    }

    #[test]
    fn rejects_span_outside_of_grid() {
        let mut heightfield = height_field();
        let result = heightfield.add_span(SpanInsertion {
            x: 5,
            z: 0,
            flag_merge_threshold: 0,
            span: span_low().build(),
        });
        assert_eq!(
            result,
            Err(SpanInsertionError::ColumnIndexOutOfBounds { x: 5, z: 0 })
        );
        assert_eq!(heightfield.span_at(0, 1), None);
    }

    #[test]
    fn can_add_higher_span_in_same_column() {
        let mut heightfield = height_field();
        let span_low = span_low().build();
        heightfield
            .add_span(SpanInsertion {
                x: 1,
                z: 3,
                flag_merge_threshold: 0,
                span: span_low.clone(),
            })
            .unwrap();

        let span_high = span_high().build();
        heightfield
            .add_span(SpanInsertion {
                x: 1,
                z: 3,
                flag_merge_threshold: 0,
                span: span_high.clone(),
            })
            .unwrap();

        let spans: Vec<_> = heightfield.column(1, 3).unwrap().collect();
        assert_eq!(spans.len(), 2);
        assert_eq_without_next(spans[0], &span_low);
        assert_eq_without_next(spans[1], &span_high);
        assert_eq!(heightfield.max_spans_in_column(), 2);
    }

    #[test]
    fn can_add_lower_span_in_same_column() {
        let mut heightfield = height_field();
        let span_high = span_high().build();
        heightfield
            .add_span(SpanInsertion {
                x: 1,
                z: 3,
                flag_merge_threshold: 0,
                span: span_high.clone(),
            })
            .unwrap();

        let span_low = span_low().build();
        heightfield
            .add_span(SpanInsertion {
                x: 1,
                z: 3,
                flag_merge_threshold: 0,
                span: span_low.clone(),
            })
            .unwrap();

        let span = heightfield.span_at(1, 3).unwrap();
        assert_eq_without_next(span, &span_low);
        let next_span = span.next().unwrap();
        let next_span = heightfield.span(next_span);
        assert_eq_without_next(next_span, &span_high);
    }

    #[test]
    fn can_merge_spans() {
        let mut heightfield = height_field();
        let span_low = span_low().build();
        heightfield
            .add_span(SpanInsertion {
                x: 1,
                z: 3,
                flag_merge_threshold: 0,
                span: span_low.clone(),
            })
            .unwrap();

        let span_mid: Span = span_mid().build();
        heightfield
            .add_span(SpanInsertion {
                x: 1,
                z: 3,
                flag_merge_threshold: 0,
                span: span_mid.clone(),
            })
            .unwrap();

        let merged_span = SpanBuilder {
            min: span_low.min(),
            max: span_mid.max(),
            area: span_mid.area(),
            next: None,
        }
        .build();

        let span = heightfield.span_at(1, 3).unwrap();
        assert_eq!(*span, merged_span);
        assert_eq!(heightfield.span_count(), 1);
    }

    #[test]
    fn merge_keeps_higher_area_within_threshold() {
        let mut heightfield = height_field();
        push_span(&mut heightfield, 0, 0, 0, 5, 7);
        heightfield
            .add_span(SpanInsertion {
                x: 0,
                z: 0,
                flag_merge_threshold: 1,
                span: SpanBuilder {
                    min: 2,
                    max: 6,
                    area: AreaType(3),
                    next: None,
                }
                .build(),
            })
            .unwrap();
        let span = heightfield.span_at(0, 0).unwrap();
        assert_eq!((span.min(), span.max()), (0, 6));
        assert_eq!(span.area(), AreaType(7));

        // Ceilings too far apart, the new span's area wins.
        push_span(&mut heightfield, 0, 0, 1, 12, 2);
        let span = heightfield.span_at(0, 0).unwrap();
        assert_eq!((span.min(), span.max()), (0, 12));
        assert_eq!(span.area(), AreaType(2));
    }

    #[test]
    fn counts_ignore_unwalkable_spans() {
        let mut heightfield = height_field();
        push_span(&mut heightfield, 0, 0, 0, 2, 1);
        push_span(&mut heightfield, 0, 0, 4, 6, 0);
        push_span(&mut heightfield, 0, 0, 8, 9, 1);
        push_span(&mut heightfield, 2, 2, 0, 2, 1);
        assert_eq!(heightfield.span_count(), 3);
        assert_eq!(heightfield.max_spans_in_column(), 2);
        let walkable: Vec<_> = heightfield
            .walkable_spans_in_column(0, 0)
            .unwrap()
            .map(|span| span.min())
            .collect();
        assert_eq!(walkable, vec![0, 8]);
        assert!(heightfield.walkable_spans_in_column(5, 0).is_none());
        assert!(heightfield.column(0, 5).is_none());
    }

    #[track_caller]
    fn assert_eq_without_next(span: &Span, expected_span: &Span) {
        assert_eq!(span.min(), expected_span.min(), "min is not equal");
        assert_eq!(span.max(), expected_span.max(), "max is not equal");
        assert_eq!(span.area(), expected_span.area(), "area is not equal");
    }
}
