//! Point-cloud filtering: voxel down-sampling and pass-through cuts.

mod passthrough;
mod voxel_grid;

pub use passthrough::filter_z;
pub use voxel_grid::VoxelGrid;
