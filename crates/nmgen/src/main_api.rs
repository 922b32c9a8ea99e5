use crate::{
    config::HeightfieldConfig, heightfield::Heightfield, rasterize::RasterizationError,
    trimesh::TriMesh,
};

impl Heightfield {
    /// Rasterizes all triangles of a [`TriMesh`], each tagged with its entry in [`TriMesh::area_types`].
    pub fn rasterize_trimesh(
        &mut self,
        trimesh: &TriMesh,
        flag_merge_threshold: u16,
    ) -> Result<(), RasterizationError> {
        self.rasterize_indexed_triangles(
            &trimesh.vertices,
            &trimesh.indices,
            &trimesh.area_types,
            flag_merge_threshold,
        )
    }

    /// Rasterizes the triangles of a [`TriMesh`] into a [`Heightfield`] and runs the walkability filters on it.
    ///
    /// # Arguments
    ///
    /// - `trimesh` - The [`TriMesh`] to rasterize. Mark its walkable triangles first with [`TriMesh::mark_walkable_triangles`].
    /// - `config` - Supplies `walkable_height` and `walkable_climb`, both in voxels.
    pub fn populate_from_trimesh(
        &mut self,
        trimesh: &TriMesh,
        config: &HeightfieldConfig,
    ) -> Result<(), RasterizationError> {
        // Implementation note: flag_merge_threshold and walkable_climb are the same thing in practice, so we just chose one name for the param.
        self.rasterize_trimesh(trimesh, config.walkable_climb)?;

        // Once all geometry is rasterized, we do initial pass of filtering to
        // remove unwanted overhangs caused by the conservative rasterization
        // as well as filter spans where the character cannot possibly stand.
        self.filter_low_hanging_walkable_obstacles(config.walkable_climb);
        self.filter_ledge_spans(config.walkable_height, config.walkable_climb);
        self.filter_walkable_low_height_spans(config.walkable_height);
        Ok(())
    }
}
