//! Time-major `{X, Y}` position archives and the serializers that write them.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use trajgen_core::TimeSeries;

use crate::OutputError;

/// Error types for serialization operations
#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Binary serialization error: {0}")]
    BinaryError(#[from] bincode::Error),

    #[error("Pickle serialization error: {0}")]
    PickleError(#[from] serde_pickle::Error),
}

/// `X[t][i]` / `Y[t][i]`: coordinates of particle `i` at frame `t`. The z
/// axis is dropped since the domain is quasi-2D.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionArchive {
    #[serde(rename = "X")]
    pub x: Vec<Vec<f64>>,
    #[serde(rename = "Y")]
    pub y: Vec<Vec<f64>>,
}

impl PositionArchive {
    pub fn from_series(series: &TimeSeries) -> Self {
        let x = series
            .frames
            .iter()
            .map(|frame| frame.iter().map(|r| r.x).collect())
            .collect();
        let y = series
            .frames
            .iter()
            .map(|frame| frame.iter().map(|r| r.y).collect())
            .collect();
        Self { x, y }
    }

    pub fn frames(&self) -> usize {
        self.x.len()
    }
}

/// Trait for objects that can be serialized
pub trait SerializeObject {
    fn to_json(&self) -> Result<Vec<u8>, SerializationError>;
    fn to_binary(&self) -> Result<Vec<u8>, SerializationError>;
    fn to_pickle(&self) -> Result<Vec<u8>, SerializationError>;
}

// Implement SerializeObject for any type that implements Serialize
impl<T: Serialize> SerializeObject for T {
    fn to_json(&self) -> Result<Vec<u8>, SerializationError> {
        serde_json::to_vec(self).map_err(SerializationError::JsonError)
    }

    fn to_binary(&self) -> Result<Vec<u8>, SerializationError> {
        bincode::serialize(self).map_err(SerializationError::BinaryError)
    }

    // Protocol 2 keeps the archive loadable by old pickle readers.
    fn to_pickle(&self) -> Result<Vec<u8>, SerializationError> {
        serde_pickle::to_vec(self, serde_pickle::SerOptions::new().proto_v2())
            .map_err(SerializationError::PickleError)
    }
}

/// Base serializer trait without generics for object-safety
pub trait Serializer: Send + Sync {
    /// File extension of archives written by this serializer.
    fn extension(&self) -> &'static str;

    fn serialize_to_bytes(&self, data: &dyn SerializeObject) -> Result<Vec<u8>, SerializationError>;

    fn deserialize_archive(&self, bytes: &[u8]) -> Result<PositionArchive, SerializationError>;

    /// Writes `archive` to `<stem>.<extension>` and returns the path.
    fn write_archive(&self, archive: &PositionArchive, stem: &Path) -> Result<PathBuf, OutputError> {
        let mut name = stem.as_os_str().to_owned();
        name.push(".");
        name.push(self.extension());
        let path = PathBuf::from(name);

        let bytes = self.serialize_to_bytes(archive)?;
        fs::write(&path, bytes)?;
        info!(
            "Stored {} frames of positions in {}",
            archive.frames(),
            path.display()
        );
        Ok(path)
    }

    fn read_archive(&self, path: &Path) -> Result<PositionArchive, OutputError> {
        let bytes = fs::read(path)?;
        Ok(self.deserialize_archive(&bytes)?)
    }
}

/// Pickle serializer, `.pck` files
pub struct PickleSerializer;

impl Serializer for PickleSerializer {
    fn extension(&self) -> &'static str {
        "pck"
    }

    fn serialize_to_bytes(&self, data: &dyn SerializeObject) -> Result<Vec<u8>, SerializationError> {
        data.to_pickle()
    }

    fn deserialize_archive(&self, bytes: &[u8]) -> Result<PositionArchive, SerializationError> {
        Ok(serde_pickle::from_slice(bytes, serde_pickle::DeOptions::new())?)
    }
}

/// JSON serializer implementation
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn serialize_to_bytes(&self, data: &dyn SerializeObject) -> Result<Vec<u8>, SerializationError> {
        data.to_json()
    }

    fn deserialize_archive(&self, bytes: &[u8]) -> Result<PositionArchive, SerializationError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Binary serializer implementation using bincode
pub struct BinarySerializer;

impl Serializer for BinarySerializer {
    fn extension(&self) -> &'static str {
        "bin"
    }

    fn serialize_to_bytes(&self, data: &dyn SerializeObject) -> Result<Vec<u8>, SerializationError> {
        data.to_binary()
    }

    fn deserialize_archive(&self, bytes: &[u8]) -> Result<PositionArchive, SerializationError> {
        Ok(bincode::deserialize(bytes)?)
    }
}
