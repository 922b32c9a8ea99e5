use crate::{Aabb3d, HeightfieldBuilder, HeightfieldBuilderError};

/// Specifies a configuration to use when voxelizing geometry into a [`Heightfield`](crate::Heightfield).
/// Usually built using [`HeightfieldConfigBuilder`].
///
/// Units are usually in voxels (vx) or world units (wu). The units for voxels, grid size,
/// and cell size are all based on the values of `cell_size` and `cell_height`.
///
/// > Note:
/// >
/// > First you should decide the size of your agent's logical cylinder.
/// > If your game world uses meters as units, a reasonable starting point for a human-sized agent
/// > might be a radius of 0.4 and a height of 2.0.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct HeightfieldConfig {
    /// The width of the field along the x-axis. `[Limit: >= 0] [Units: vx]`
    pub width: u16,

    /// The height of the field along the z-axis. `[Limit: >= 0] [Units: vx]`
    pub height: u16,

    /// The xz-plane cell size to use for fields. `[Limit: > 0] [Units: wu]`.
    ///
    /// The voxelization cell size defines the voxel size along both axes of the ground plane: x and z.
    /// This value is usually derived from the character radius r. A recommended starting value for cell_size is either r/2 or r/3.
    /// Smaller values of cell_size will increase rasterization resolution, but total generation time will increase exponentially.
    ///
    /// The minimum value for this parameter depends on the platform's floating point accuracy,
    /// with the practical minimum usually around 0.05.
    pub cell_size: f32,

    /// The y-axis cell size to use for fields. `[Limit: > 0] [Units: wu]`
    ///
    /// The voxelization cell height is defined separately in order to allow for greater precision in height tests.
    /// A good starting point for cell_height is half the cell_size value.
    pub cell_height: f32,

    /// The field's AABB [Units: wu]
    pub aabb: Aabb3d,

    /// The maximum slope that is considered walkable. `[Limits: 0 <= value < 0.5*π] [Units: Radians]`
    pub walkable_slope_angle: f32,

    /// Minimum floor to 'ceiling' height that will still allow the floor area to
    /// be considered walkable. `[Limit: >= 3] [Units: vx]`
    ///
    /// The value of walkable_height should be calculated as `(h / cell_height).ceil()`.
    pub walkable_height: u16,

    /// Maximum ledge height that is considered to still be traversable. `[Limit: >=0] [Units: vx]`
    ///
    /// Allows the field to flow over low lying obstructions such as curbs and up/down stairways.
    /// Also used as the flag merge threshold during rasterization.
    pub walkable_climb: u16,
}

impl HeightfieldConfig {
    /// Returns a [`HeightfieldBuilder`] for a field matching this configuration.
    pub fn heightfield_builder(&self) -> HeightfieldBuilder {
        HeightfieldBuilder {
            width: self.width,
            height: self.height,
            aabb: self.aabb,
            cell_size: self.cell_size,
            cell_height: self.cell_height,
        }
    }
}

/// A builder for [`HeightfieldConfig`]. Takes the agent's dimensions in world units
/// and derives the voxel-unit values of the config.
/// The default values are chosen to be reasonable for an agent resembling an adult human.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct HeightfieldConfigBuilder {
    /// The xz-plane cell size to use for fields. `[Limit: > 0] [Units: wu]`.
    pub cell_size: f32,
    /// The y-axis cell size to use for fields. `[Limit: > 0] [Units: wu]`
    pub cell_height: f32,
    /// The height of the agent. `[Limit: > 0] [Units: wu]`
    ///
    /// It's often a good idea to add a little bit of padding to the height. For example,
    /// an agent that is 1.8 world units tall might want to set this value to 2.0 units.
    pub agent_height: f32,
    /// The highest step the agent can climb. `[Limit: >= 0] [Units: wu]`
    pub agent_max_climb: f32,
    /// The steepest slope the agent can walk on. `[Limits: 0 <= value < 0.5*π] [Units: Radians]`
    pub agent_max_slope: f32,
    /// The area to voxelize. [Units: wu]
    pub aabb: Aabb3d,
}

impl Default for HeightfieldConfigBuilder {
    fn default() -> Self {
        Self {
            cell_size: 0.3,
            cell_height: 0.2,
            agent_height: 2.0,
            agent_max_climb: 0.9,
            agent_max_slope: 45.0_f32.to_radians(),
            aabb: Aabb3d::default(),
        }
    }
}

impl HeightfieldConfigBuilder {
    /// Builds a [`HeightfieldConfig`] from the current configuration.
    pub fn build(self) -> Result<HeightfieldConfig, HeightfieldBuilderError> {
        let grid = HeightfieldBuilder::from_aabb(self.aabb, self.cell_size, self.cell_height)?;
        if !(self.cell_height > 0.0 && self.cell_height.is_finite()) {
            return Err(HeightfieldBuilderError::InvalidCellHeight(self.cell_height));
        }
        Ok(HeightfieldConfig {
            width: grid.width,
            height: grid.height,
            cell_size: self.cell_size,
            cell_height: self.cell_height,
            aabb: self.aabb,
            walkable_slope_angle: self.agent_max_slope,
            walkable_height: (self.agent_height / self.cell_height).ceil() as u16,
            walkable_climb: (self.agent_max_climb / self.cell_height).floor() as u16,
        })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn default_agent_converts_to_voxels() {
        let config = HeightfieldConfigBuilder {
            aabb: Aabb3d::new([0.0, 0.0, 0.0], [3.0, 3.0, 6.0]),
            ..Default::default()
        }
        .build()
        .unwrap();
        assert_eq!(config.width, 10);
        assert_eq!(config.height, 20);
        assert_eq!(config.walkable_height, 10);
        assert_eq!(config.walkable_climb, 4);
        assert_relative_eq!(config.walkable_slope_angle, std::f32::consts::FRAC_PI_4);

        let builder = config.heightfield_builder();
        assert_eq!((builder.width, builder.height), (10, 20));
    }

    #[test]
    fn invalid_cell_height_is_rejected() {
        let result = HeightfieldConfigBuilder {
            cell_height: -1.0,
            ..Default::default()
        }
        .build();
        assert_eq!(
            result,
            Err(HeightfieldBuilderError::InvalidCellHeight(-1.0))
        );
    }
}
