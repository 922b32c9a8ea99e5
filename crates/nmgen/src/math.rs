use glam::{UVec3, Vec3A};

/// An axis-aligned bounding box in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Aabb3d {
    /// The minimum corner of the box
    pub min: Vec3A,
    /// The maximum corner of the box
    pub max: Vec3A,
}

impl Aabb3d {
    /// Creates a new AABB from its minimum and maximum corners.
    #[inline]
    pub fn new(min: impl Into<Vec3A>, max: impl Into<Vec3A>) -> Self {
        Self {
            min: min.into(),
            max: max.into(),
        }
    }

    /// Computes the AABB enclosing all `verts`.
    /// Returns `None` if `verts` is empty.
    pub fn from_verts(verts: &[Vec3A]) -> Option<Self> {
        let mut iter = verts.iter();

        let first = iter.next()?;

        let (min, max) = iter.fold((*first, *first), |(prev_min, prev_max), point| {
            (point.min(prev_min), point.max(prev_max))
        });

        Some(Self { min, max })
    }

    /// Returns `true` if the two boxes overlap, touching boundaries included.
    #[inline]
    pub fn intersects(&self, other: &Aabb3d) -> bool {
        self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
    }
}

pub(crate) trait TriangleIndices {
    fn normal(&self, vertices: &[Vec3A]) -> Vec3A;
}

impl TriangleIndices for UVec3 {
    #[inline]
    fn normal(&self, vertices: &[Vec3A]) -> Vec3A {
        let a = vertices[self[0] as usize];
        let b = vertices[self[1] as usize];
        let c = vertices[self[2] as usize];
        let ab = b - a;
        let ac = c - a;
        ab.cross(ac).normalize_or_zero()
    }
}

pub(crate) trait TriangleVertices {
    fn aabb(&self) -> Aabb3d;
}

impl TriangleVertices for [Vec3A; 3] {
    #[inline]
    fn aabb(&self) -> Aabb3d {
        let min = self[0].min(self[1]).min(self[2]);
        let max = self[0].max(self[1]).max(self[2]);
        Aabb3d { min, max }
    }
}

/// Gets the standard width (x-axis) offset for the specified direction.
/// # Arguments
/// - `direction`: The direction. [Limits: 0 <= value < 4]
/// # Returns
///
/// The width offset to apply to the current cell position to move in the direction.
pub(crate) fn dir_offset_x(direction: u8) -> i8 {
    const OFFSET: [i8; 4] = [-1, 0, 1, 0];
    OFFSET[direction as usize & 0x03]
}

/// Gets the standard height (z-axis) offset for the specified direction.
/// # Arguments
/// - `direction`: The direction. [Limits: 0 <= value < 4]
/// # Returns
///
/// The height offset to apply to the current cell position to move in the direction.
pub(crate) fn dir_offset_z(direction: u8) -> i8 {
    const OFFSET: [i8; 4] = [0, 1, 0, -1];
    OFFSET[direction as usize & 0x03]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aabb_from_verts_encloses_all_points() {
        let aabb = Aabb3d::from_verts(&[
            Vec3A::new(1.0, -2.0, 3.0),
            Vec3A::new(-1.0, 4.0, 0.5),
            Vec3A::new(0.0, 0.0, 7.0),
        ])
        .unwrap();
        assert_eq!(aabb.min, Vec3A::new(-1.0, -2.0, 0.5));
        assert_eq!(aabb.max, Vec3A::new(1.0, 4.0, 7.0));
    }

    #[test]
    fn aabb_from_no_verts_is_none() {
        assert_eq!(Aabb3d::from_verts(&[]), None);
    }

    #[test]
    fn touching_boxes_intersect() {
        let a = Aabb3d::new([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        let b = Aabb3d::new([1.0, 0.0, 0.0], [2.0, 1.0, 1.0]);
        let c = Aabb3d::new([1.5, 0.0, 0.0], [2.0, 1.0, 1.0]);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn direction_offsets_cover_four_neighbours() {
        let offsets: Vec<_> = (0..4).map(|d| (dir_offset_x(d), dir_offset_z(d))).collect();
        assert_eq!(offsets, vec![(-1, 0), (0, 1), (1, 0), (0, -1)]);
    }
}
