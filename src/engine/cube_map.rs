//! Cube-sharded persistent feature map.
//!
//! The world is carved into 50 m cubes stored in a fixed 21×21×11 arena,
//! re-centered around the sensor by rolling whole slabs along an axis.
//! Each cube owns one edge cloud and one plane cloud. Points that roll off
//! the arena are discarded — memory stays bounded by construction.

use log::trace;
use nalgebra::Vector3;

use crate::algorithms::filtering::VoxelGrid;
use crate::core::types::{FeatureCloud, FeaturePoint};

/// Arena extent along x, in cubes.
pub const MAP_WIDTH: usize = 21;
/// Arena extent along y, in cubes.
pub const MAP_HEIGHT: usize = 21;
/// Arena extent along z, in cubes.
pub const MAP_DEPTH: usize = 11;

/// Cube edge length in meters.
pub const CUBE_SIZE: f64 = 50.0;
const HALF_CUBE: f64 = CUBE_SIZE / 2.0;

/// The sensor cube is kept at least this many cubes away from the arena
/// boundary along every axis.
pub const RECENTER_MARGIN: i64 = 2;

const DIMS: [usize; 3] = [MAP_WIDTH, MAP_HEIGHT, MAP_DEPTH];

/// One cube cell: the edge and plane features that landed in it.
#[derive(Debug, Clone, Default)]
pub struct CubeCell {
    pub edges: FeatureCloud,
    pub planes: FeatureCloud,
}

impl CubeCell {
    fn clear(&mut self) {
        self.edges.clear();
        self.planes.clear();
    }

    fn is_empty(&self) -> bool {
        self.edges.is_empty() && self.planes.is_empty()
    }
}

/// Cube-sharded feature map.
#[derive(Debug, Clone)]
pub struct CubeMap {
    cells: Vec<CubeCell>,
    /// Storage offset added to the floor-rule cube coordinate per axis.
    /// Mutated by recentering so world-to-storage stays consistent.
    center: [i64; 3],
}

impl Default for CubeMap {
    fn default() -> Self {
        Self::new()
    }
}

impl CubeMap {
    /// Create an empty map with the sensor cube at the arena center.
    pub fn new() -> Self {
        Self {
            cells: vec![CubeCell::default(); MAP_WIDTH * MAP_HEIGHT * MAP_DEPTH],
            center: [
                (MAP_WIDTH / 2) as i64,
                (MAP_HEIGHT / 2) as i64,
                (MAP_DEPTH / 2) as i64,
            ],
        }
    }

    /// Current per-axis center offsets.
    pub fn center(&self) -> [i64; 3] {
        self.center
    }

    #[inline]
    fn index(i: usize, j: usize, k: usize) -> usize {
        i + MAP_WIDTH * (j + MAP_HEIGHT * k)
    }

    /// Storage cube coordinate of a world position (floor rule).
    ///
    /// A coordinate `x` maps to `floor((x + 25) / 50)` plus the current
    /// center offset, so the cube spans `[-25, 25)` around each multiple
    /// of 50 m.
    pub fn cube_of(&self, position: &Vector3<f64>) -> [i64; 3] {
        [
            ((position.x + HALF_CUBE) / CUBE_SIZE).floor() as i64 + self.center[0],
            ((position.y + HALF_CUBE) / CUBE_SIZE).floor() as i64 + self.center[1],
            ((position.z + HALF_CUBE) / CUBE_SIZE).floor() as i64 + self.center[2],
        ]
    }

    /// Roll the arena so the sensor cube sits strictly inside the margins.
    ///
    /// Returns the sensor's storage cube after recentering; each component
    /// is guaranteed to lie in `[RECENTER_MARGIN, dim - RECENTER_MARGIN - 1]`.
    pub fn recenter(&mut self, sensor: &Vector3<f64>) -> [i64; 3] {
        let mut cube = self.cube_of(sensor);
        for axis in 0..3 {
            let dim = DIMS[axis] as i64;
            while cube[axis] < RECENTER_MARGIN {
                self.shift(axis, 1);
                self.center[axis] += 1;
                cube[axis] += 1;
            }
            while cube[axis] >= dim - RECENTER_MARGIN {
                self.shift(axis, -1);
                self.center[axis] -= 1;
                cube[axis] -= 1;
            }
        }
        cube
    }

    /// Roll the arena one step along `axis`.
    ///
    /// `dir = +1` moves cell contents toward higher storage indices (the
    /// highest slab wraps to index zero and is cleared); `dir = -1`
    /// mirrors that. Within the retained volume the world-to-storage
    /// mapping is preserved by the accompanying center-offset change.
    fn shift(&mut self, axis: usize, dir: i64) {
        let n = DIMS[axis];
        let (u_axis, v_axis) = match axis {
            0 => (1, 2),
            1 => (0, 2),
            _ => (0, 1),
        };

        for u in 0..DIMS[u_axis] {
            for v in 0..DIMS[v_axis] {
                let at = |s: usize| {
                    let mut c = [0usize; 3];
                    c[axis] = s;
                    c[u_axis] = u;
                    c[v_axis] = v;
                    Self::index(c[0], c[1], c[2])
                };
                if dir > 0 {
                    for s in (1..n).rev() {
                        self.cells.swap(at(s), at(s - 1));
                    }
                    self.cells[at(0)].clear();
                } else {
                    for s in 0..n - 1 {
                        self.cells.swap(at(s), at(s + 1));
                    }
                    self.cells[at(n - 1)].clear();
                }
            }
        }
    }

    /// Storage indices of the 3×3×3 window around a sensor cube, clipped
    /// to the arena. Order is deterministic (i-major, then j, then k).
    pub fn window_indices(&self, sensor_cube: [i64; 3]) -> Vec<usize> {
        let mut indices = Vec::with_capacity(27);
        for i in sensor_cube[0] - 1..=sensor_cube[0] + 1 {
            for j in sensor_cube[1] - 1..=sensor_cube[1] + 1 {
                for k in sensor_cube[2] - 1..=sensor_cube[2] + 1 {
                    if i >= 0
                        && i < MAP_WIDTH as i64
                        && j >= 0
                        && j < MAP_HEIGHT as i64
                        && k >= 0
                        && k < MAP_DEPTH as i64
                    {
                        indices.push(Self::index(i as usize, j as usize, k as usize));
                    }
                }
            }
        }
        indices
    }

    /// Union of edge clouds over a window: the edge slab.
    pub fn edge_slab(&self, indices: &[usize]) -> FeatureCloud {
        let mut slab = FeatureCloud::new();
        for &i in indices {
            slab.extend_from(&self.cells[i].edges);
        }
        slab
    }

    /// Union of plane clouds over a window: the plane slab.
    pub fn plane_slab(&self, indices: &[usize]) -> FeatureCloud {
        let mut slab = FeatureCloud::new();
        for &i in indices {
            slab.extend_from(&self.cells[i].planes);
        }
        slab
    }

    /// Insert a world-frame edge feature; silently dropped when its cube
    /// lies outside the arena.
    pub fn insert_edge(&mut self, point: FeaturePoint) {
        self.insert(point, true);
    }

    /// Insert a world-frame plane feature; silently dropped when its cube
    /// lies outside the arena.
    pub fn insert_plane(&mut self, point: FeaturePoint) {
        self.insert(point, false);
    }

    fn insert(&mut self, point: FeaturePoint, edge: bool) {
        let cube = self.cube_of(&point.position());
        let inside = cube[0] >= 0
            && cube[0] < MAP_WIDTH as i64
            && cube[1] >= 0
            && cube[1] < MAP_HEIGHT as i64
            && cube[2] >= 0
            && cube[2] < MAP_DEPTH as i64;
        if !inside {
            trace!("point outside cube arena dropped: cube {:?}", cube);
            return;
        }
        let cell = &mut self.cells[Self::index(cube[0] as usize, cube[1] as usize, cube[2] as usize)];
        if edge {
            cell.edges.push(point);
        } else {
            cell.planes.push(point);
        }
    }

    /// Voxel-filter the cubes of a window in place.
    ///
    /// Only the touched cubes are filtered; the rest of the map keeps its
    /// previous density, bounding per-frame work.
    pub fn filter_window(
        &mut self,
        indices: &[usize],
        edge_filter: &VoxelGrid,
        plane_filter: &VoxelGrid,
    ) {
        for &i in indices {
            let cell = &mut self.cells[i];
            if !cell.edges.is_empty() {
                cell.edges = edge_filter.filter(&cell.edges);
            }
            if !cell.planes.is_empty() {
                cell.planes = plane_filter.filter(&cell.planes);
            }
        }
    }

    /// All features of a window as one cloud (the surround view).
    pub fn collect_window(&self, indices: &[usize]) -> FeatureCloud {
        let mut cloud = FeatureCloud::new();
        for &i in indices {
            cloud.extend_from(&self.cells[i].edges);
            cloud.extend_from(&self.cells[i].planes);
        }
        cloud
    }

    /// All features of the whole arena as one cloud (the map view).
    pub fn collect_all(&self) -> FeatureCloud {
        let mut cloud = FeatureCloud::new();
        for cell in &self.cells {
            cloud.extend_from(&cell.edges);
            cloud.extend_from(&cell.planes);
        }
        cloud
    }

    /// Total stored point count across all cubes.
    pub fn total_points(&self) -> usize {
        self.cells
            .iter()
            .map(|c| c.edges.len() + c.planes.len())
            .sum()
    }

    /// Number of cubes currently holding any points.
    pub fn occupied_cubes(&self) -> usize {
        self.cells.iter().filter(|c| !c.is_empty()).count()
    }
}
