//! Everything a finished run leaves on disk: the binary trajectory file,
//! the VMD export, the trajectory plot and the `{X, Y}` position archive.

use std::io;
use thiserror::Error;

pub mod archive;
pub mod plot;
pub mod trajectory;
pub mod xyz;

pub use archive::{
    BinarySerializer, JsonSerializer, PickleSerializer, PositionArchive, SerializationError,
    SerializeObject, Serializer,
};
pub use plot::{plot_trajectories, svg_to_pdf};
pub use trajectory::{
    remove_existing, TrajectoryHandle, TrajectoryHeader, TrajectoryReader, TrajectoryWriter,
};
pub use xyz::{export_xyz, VisualizationFiles};

/// Error types for reading and writing run outputs.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Trajectory encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("Archive serialization error: {0}")]
    Serialization(#[from] SerializationError),

    #[error("Malformed trajectory: {0}")]
    Malformed(String),

    #[error("Plotting failed: {0}")]
    Plot(String),
}
