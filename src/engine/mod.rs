//! Orchestration layer: cube map, staging, adaptive control, the mapper.

pub mod adaptive;
pub mod cube_map;
mod mapper;
mod shared;
mod staging;

pub use adaptive::{ResolutionController, ResolutionUpdate, MIN_RESOLUTION};
pub use cube_map::{CubeCell, CubeMap, CUBE_SIZE, MAP_DEPTH, MAP_HEIGHT, MAP_WIDTH};
pub use mapper::{FrameSummary, Mapper};
pub use shared::{CorrectionLink, ShutdownFlag};
pub use staging::{InputStaging, StagedFrame, TIME_SYNC_TOLERANCE_US};
