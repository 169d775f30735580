//! Trajectory and timing file writers.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::core::types::Pose3D;
use crate::error::Result;

/// Writes one re-axed 3×4 pose matrix per frame: twelve space-separated
/// doubles, row-major, in the camera-forward axis convention (see
/// [`Pose3D::reaxed_matrix_rows`]).
pub struct TrajectoryWriter {
    writer: BufWriter<File>,
}

impl TrajectoryWriter {
    /// Create or truncate the trajectory file.
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
        })
    }

    /// Append one frame's pose.
    pub fn write_pose(&mut self, pose: &Pose3D) -> Result<()> {
        let rows = pose.reaxed_matrix_rows();
        let line = rows
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(self.writer, "{}", line)?;
        Ok(())
    }

    /// Flush buffered lines to disk.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes one removal-stage duration in milliseconds per frame.
pub struct TimingWriter {
    writer: BufWriter<File>,
}

impl TimingWriter {
    /// Create or truncate the timing file.
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
        })
    }

    /// Append one frame's removal time.
    pub fn write_ms(&mut self, milliseconds: f64) -> Result<()> {
        writeln!(self.writer, "{}", milliseconds)?;
        Ok(())
    }

    /// Flush buffered lines to disk.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
