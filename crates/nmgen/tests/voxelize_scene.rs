//! Voxelizes small hand-built scenes end to end: mark walkable triangles, rasterize, filter.

use glam::{UVec3, Vec3A};
use nmgen::{Aabb3d, AreaType, Heightfield, HeightfieldConfig, HeightfieldConfigBuilder, TriMesh};

/// A flat floor covering the whole field at `y`.
fn floor(y: f32, size: f32) -> TriMesh {
    TriMesh {
        vertices: vec![
            Vec3A::new(0.0, y, 0.0),
            Vec3A::new(size, y, 0.0),
            Vec3A::new(size, y, size),
            Vec3A::new(0.0, y, size),
        ],
        indices: vec![UVec3::new(0, 2, 1), UVec3::new(0, 3, 2)],
        area_types: vec![AreaType::NOT_WALKABLE; 2],
    }
}

/// A flat box top covering `[min, max]` on the xz-plane at `y`.
fn box_top(min: f32, max: f32, y: f32) -> TriMesh {
    TriMesh {
        vertices: vec![
            Vec3A::new(min, y, min),
            Vec3A::new(max, y, min),
            Vec3A::new(max, y, max),
            Vec3A::new(min, y, max),
        ],
        indices: vec![UVec3::new(0, 2, 1), UVec3::new(0, 3, 2)],
        area_types: vec![AreaType::NOT_WALKABLE; 2],
    }
}

fn config() -> HeightfieldConfig {
    HeightfieldConfigBuilder {
        cell_size: 0.5,
        cell_height: 0.25,
        agent_height: 1.0,
        agent_max_climb: 0.5,
        aabb: Aabb3d::new([0.0, 0.0, 0.0], [5.0, 5.0, 5.0]),
        ..Default::default()
    }
    .build()
    .unwrap()
}

fn voxelize(trimesh: &TriMesh, config: &HeightfieldConfig) -> Heightfield {
    let mut heightfield = config.heightfield_builder().build().unwrap();
    heightfield.populate_from_trimesh(trimesh, config).unwrap();
    heightfield
}

#[test]
fn flat_floor_is_walkable_except_at_the_border() {
    let config = config();
    assert_eq!((config.width, config.height), (10, 10));
    assert_eq!(config.walkable_height, 4);
    assert_eq!(config.walkable_climb, 2);

    let mut trimesh = floor(1.0, 5.0);
    trimesh.mark_walkable_triangles(config.walkable_slope_angle);
    let heightfield = voxelize(&trimesh, &config);

    // Border columns are ledges because their outer neighbours do not exist.
    assert_eq!(heightfield.span_count(), 8 * 8);
    assert_eq!(heightfield.max_spans_in_column(), 1);
    let span = heightfield.span_at(4, 4).unwrap();
    assert_eq!(span.area(), AreaType::DEFAULT_WALKABLE);
    assert!(span.min() < span.max());
    assert!(!heightfield.span_at(0, 4).unwrap().area().is_walkable());
}

#[test]
fn unmarked_geometry_produces_no_walkable_spans() {
    let config = config();
    let heightfield = voxelize(&floor(1.0, 5.0), &config);
    assert_eq!(heightfield.span_count(), 0);
    assert_eq!(heightfield.allocated_spans.len(), 100);
}

#[test]
fn low_box_under_agent_height_blocks_the_floor_below_it() {
    let config = config();
    let mut trimesh = floor(0.5, 5.0);
    // 0.5 wu above the floor, agent needs 1.0 wu of clearance.
    trimesh.extend(box_top(1.5, 3.5, 1.0));
    trimesh.mark_walkable_triangles(config.walkable_slope_angle);
    let heightfield = voxelize(&trimesh, &config);

    let column: Vec<_> = heightfield.column(5, 5).unwrap().collect();
    assert_eq!(column.len(), 2);
    assert!(!column[0].area().is_walkable());
    assert!(column[1].area().is_walkable());
    assert_eq!(heightfield.max_spans_in_column(), 1);
}

#[cfg(feature = "serialize")]
#[test]
fn heightfield_serializes_its_dimensions() {
    let config = config();
    let mut trimesh = floor(1.0, 5.0);
    trimesh.mark_walkable_triangles(config.walkable_slope_angle);
    let heightfield = voxelize(&trimesh, &config);
    let json = serde_json::to_value(&heightfield).unwrap();
    assert_eq!(json["width"], 10);
    assert_eq!(json["height"], 10);
}
