//! Walkability filters run on a [`Heightfield`] after rasterization.
//!
//! Follows <https://github.com/recastnavigation/recastnavigation/blob/bd98d84c274ee06842bf51a4088ca82ac71f8c2d/Recast/Source/RecastFilter.cpp>

use crate::{
    heightfield::Heightfield,
    math::{dir_offset_x, dir_offset_z},
    span::AreaType,
};

impl Heightfield {
    /// The ceiling of the topmost span in a column.
    const MAX_HEIGHT: i32 = 0xffff;

    /// Marks non-walkable spans as walkable if their maximum is within `walkable_climb` of the span below them.
    ///
    /// This removes small obstacles and rasterization artifacts that the agent would be able to walk over
    /// such as curbs. It also allows agents to move up terraced structures like stairs.
    ///
    /// Obstacle spans are marked walkable if: `obstacle_span.max - walkable_span.max <= walkable_climb`
    pub fn filter_low_hanging_walkable_obstacles(&mut self, walkable_climb: u16) {
        for z in 0..self.height {
            for x in 0..self.width {
                let mut previous_max = None;
                let mut previous_was_walkable = false;
                let mut previous_area_id = AreaType::NOT_WALKABLE;

                // For each span in the column...
                let mut span_key_iter = self.span_key_at(x, z);
                while let Some(span_key) = span_key_iter {
                    let span = self.span_mut(span_key);
                    span_key_iter = span.next();
                    let walkable = span.area().is_walkable();

                    // If current span is not walkable, but there is walkable span just below it and the height difference
                    // is small enough for the agent to walk over, mark the current span as walkable too.
                    if let Some(previous_max) = previous_max {
                        if !walkable
                            && previous_was_walkable
                            && (span.max() as i32 - previous_max as i32) <= walkable_climb as i32
                        {
                            span.set_area(previous_area_id);
                        }
                    }

                    // Copy the original walkable value regardless of whether we changed it.
                    // This prevents multiple consecutive non-walkable spans from being erroneously marked as walkable.
                    previous_max = Some(span.max());
                    previous_was_walkable = walkable;
                    previous_area_id = span.area();
                }
            }
        }
    }

    /// Marks spans that are ledges as not-walkable.
    ///
    /// A ledge is a span with one or more neighbors whose maximum is further away than `walkable_climb`
    /// from the current span's maximum.
    /// This method removes the impact of the overestimation of conservative voxelization
    /// so the resulting mesh will not have regions hanging in the air over ledges.
    ///
    /// A span is a ledge if: `abs(current_span.max - neighbor_span.max) > walkable_climb`
    pub fn filter_ledge_spans(&mut self, walkable_height: u16, walkable_climb: u16) {
        let walkable_height = walkable_height as i32;
        let walkable_climb = walkable_climb as i32;

        // Mark spans that are adjacent to a ledge as unwalkable..
        for z in 0..self.height {
            for x in 0..self.width {
                let mut span_key_iter = self.span_key_at(x, z);
                while let Some(span_key) = span_key_iter {
                    let span = self.span(span_key);
                    span_key_iter = span.next();

                    // Skip non-walkable spans.
                    if !span.area().is_walkable() {
                        continue;
                    }

                    let floor = span.max() as i32;
                    let ceiling = span
                        .next()
                        .map_or(Self::MAX_HEIGHT, |next| self.span(next).min() as i32);

                    if self.is_ledge(x, z, floor, ceiling, walkable_height, walkable_climb) {
                        self.span_mut(span_key).set_area(AreaType::NOT_WALKABLE);
                    }
                }
            }
        }
    }

    fn is_ledge(
        &self,
        x: u16,
        z: u16,
        floor: i32,
        ceiling: i32,
        walkable_height: i32,
        walkable_climb: i32,
    ) -> bool {
        // The difference between this walkable area and the lowest neighbor walkable area.
        // This is the difference between the current span and all neighbor spans that have
        // enough space for an agent to move between, but not accounting at all for surface slope.
        let mut lowest_neighbor_floor_difference = Self::MAX_HEIGHT;

        // Min and max height of accessible neighbours.
        let mut lowest_traversable_neighbor_floor = floor;
        let mut highest_traversable_neighbor_floor = floor;

        for direction in 0..4 {
            let neighbor_x = x as i32 + dir_offset_x(direction) as i32;
            let neighbor_z = z as i32 + dir_offset_z(direction) as i32;
            // Skip neighbours which are out of bounds.
            if !self.contains(neighbor_x, neighbor_z) {
                lowest_neighbor_floor_difference = -walkable_climb - 1;
                break;
            }
            let neighbor_x = neighbor_x as u16;
            let neighbor_z = neighbor_z as u16;

            let mut neighbor_span_iter = self.span_key_at(neighbor_x, neighbor_z);

            // The most we can step down to the neighbor is the walkable climb distance.
            // Start with the area under the neighbor span
            let neighbor_ceiling = neighbor_span_iter
                .map_or(Self::MAX_HEIGHT, |neighbor| self.span(neighbor).min() as i32);

            // Skip neighbour if the gap between the spans is too small.
            if ceiling.min(neighbor_ceiling) - floor >= walkable_height {
                lowest_neighbor_floor_difference = -walkable_climb - 1;
                break;
            }

            // For each span in the neighboring column...
            while let Some(neighbor_key) = neighbor_span_iter {
                let neighbor_span = self.span(neighbor_key);
                neighbor_span_iter = neighbor_span.next();

                let neighbor_floor = neighbor_span.max() as i32;
                let neighbor_ceiling = neighbor_span
                    .next()
                    .map_or(Self::MAX_HEIGHT, |next| self.span(next).min() as i32);

                // Only consider neighboring areas that have enough overlap to be potentially traversable.
                if ceiling.min(neighbor_ceiling) - floor.max(neighbor_floor) < walkable_height {
                    // No space to traverse between them.
                    continue;
                }

                let neighbor_floor_difference = neighbor_floor - floor;
                lowest_neighbor_floor_difference =
                    lowest_neighbor_floor_difference.min(neighbor_floor_difference);

                // Find min/max accessible neighbor height.
                // Only consider neighbors that are at most walkable_climb away.
                if neighbor_floor_difference.abs() <= walkable_climb {
                    // There is space to move to the neighbor cell and the slope isn't too much.
                    lowest_traversable_neighbor_floor =
                        lowest_traversable_neighbor_floor.min(neighbor_floor);
                    highest_traversable_neighbor_floor =
                        highest_traversable_neighbor_floor.max(neighbor_floor);
                } else if neighbor_floor_difference < -walkable_climb {
                    // We already know this will be considered a ledge span so we can early-out
                    break;
                }
            }
        }

        // The current span is close to a ledge if the magnitude of the drop to any neighbour span
        // is greater than the walkable_climb distance.
        // That is, there is a gap that is large enough to let an agent move between them, but the drop
        // (surface slope) is too large to allow it.
        if lowest_neighbor_floor_difference < -walkable_climb {
            return true;
        }
        // If the difference between all neighbor floors is too large, this is a steep slope,
        // so mark the span as an unwalkable ledge.
        highest_traversable_neighbor_floor - lowest_traversable_neighbor_floor > walkable_climb
    }

    /// Marks walkable spans as not walkable if the clearance above the span is less than `walkable_height`.
    ///
    /// For this filter, the clearance above the span is the distance from the span's
    /// maximum to the minimum of the next higher span in the same column.
    /// If there is no higher span in the column, the clearance is computed as the
    /// distance from the top of the span to the maximum heightfield height.
    pub fn filter_walkable_low_height_spans(&mut self, walkable_height: u16) {
        // Remove walkable flag from spans which do not have enough
        // space above them for the agent to stand there.
        for z in 0..self.height {
            for x in 0..self.width {
                let mut span_key_iter = self.span_key_at(x, z);
                while let Some(span_key) = span_key_iter {
                    let span = self.span(span_key);
                    span_key_iter = span.next();

                    let bottom = span.max() as i32;
                    let top = span
                        .next()
                        .map_or(Self::MAX_HEIGHT, |next| self.span(next).min() as i32);
                    if top - bottom < walkable_height as i32 {
                        self.span_mut(span_key).set_area(AreaType::NOT_WALKABLE);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        heightfield::tests::{height_field, push_span},
        span::AreaType,
    };

    fn areas(heightfield: &crate::Heightfield, x: u16, z: u16) -> Vec<u8> {
        heightfield
            .column(x, z)
            .unwrap()
            .map(|span| span.area().0)
            .collect()
    }

    #[test]
    fn low_hanging_obstacle_within_climb_becomes_walkable() {
        let mut heightfield = height_field();
        push_span(&mut heightfield, 1, 1, 0, 2, 3);
        push_span(&mut heightfield, 1, 1, 3, 4, 0);
        heightfield.filter_low_hanging_walkable_obstacles(2);
        assert_eq!(areas(&heightfield, 1, 1), vec![3, 3]);
    }

    #[test]
    fn low_hanging_obstacle_above_climb_stays_unwalkable() {
        let mut heightfield = height_field();
        push_span(&mut heightfield, 1, 1, 0, 2, 3);
        push_span(&mut heightfield, 1, 1, 3, 6, 0);
        heightfield.filter_low_hanging_walkable_obstacles(2);
        assert_eq!(areas(&heightfield, 1, 1), vec![3, 0]);
    }

    #[test]
    fn consecutive_obstacles_are_not_chained() {
        let mut heightfield = height_field();
        push_span(&mut heightfield, 1, 1, 0, 2, 3);
        push_span(&mut heightfield, 1, 1, 3, 4, 0);
        push_span(&mut heightfield, 1, 1, 5, 6, 0);
        heightfield.filter_low_hanging_walkable_obstacles(2);
        assert_eq!(areas(&heightfield, 1, 1), vec![3, 3, 0]);
    }

    #[test]
    fn spans_at_the_border_are_ledges() {
        let mut heightfield = height_field();
        for z in 0..heightfield.height {
            for x in 0..heightfield.width {
                push_span(&mut heightfield, x, z, 0, 2, 1);
            }
        }
        heightfield.filter_ledge_spans(3, 1);
        assert_eq!(areas(&heightfield, 0, 0), vec![0]);
        assert_eq!(areas(&heightfield, 4, 2), vec![0]);
        assert_eq!(areas(&heightfield, 2, 2), vec![1]);
        assert_eq!(heightfield.span_count(), 9);
    }

    #[test]
    fn drop_larger_than_climb_is_a_ledge() {
        let mut heightfield = height_field();
        for z in 0..heightfield.height {
            for x in 0..heightfield.width {
                push_span(&mut heightfield, x, z, 0, 2, 1);
            }
        }
        // Raise a single column in the middle far above its neighbours.
        push_span(&mut heightfield, 2, 2, 2, 10, 1);
        heightfield.filter_ledge_spans(3, 1);
        assert_eq!(areas(&heightfield, 2, 2), vec![0]);
        assert_eq!(areas(&heightfield, 1, 1), vec![1]);
    }

    #[test]
    fn step_within_climb_is_not_a_ledge() {
        let mut heightfield = height_field();
        for z in 0..heightfield.height {
            for x in 0..heightfield.width {
                push_span(&mut heightfield, x, z, 0, 2, 1);
            }
        }
        push_span(&mut heightfield, 2, 2, 2, 3, 1);
        heightfield.filter_ledge_spans(3, 1);
        assert_eq!(areas(&heightfield, 2, 2), vec![1]);
    }

    #[test]
    fn low_ceiling_makes_span_unwalkable() {
        let mut heightfield = height_field();
        push_span(&mut heightfield, 3, 3, 0, 2, 1);
        push_span(&mut heightfield, 3, 3, 4, 5, 1);
        push_span(&mut heightfield, 3, 3, 10, 11, 1);
        heightfield.filter_walkable_low_height_spans(3);
        // 2 voxels of clearance above the bottom span, 5 above the middle one.
        assert_eq!(areas(&heightfield, 3, 3), vec![0, 1, 1]);
        assert_eq!(AreaType(areas(&heightfield, 3, 3)[0]), AreaType::NOT_WALKABLE);
    }
}
