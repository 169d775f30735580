//! I/O infrastructure: the transport-facing sink and file persistence.

mod sink;
mod trajectory;

pub use sink::{MappingSink, NullSink};
pub use trajectory::{TimingWriter, TrajectoryWriter};
