//! Binary trajectory file.
//!
//! Layout:
//! - 8 bytes: magic `TRAJGEN\0`
//! - 4 bytes: format version as little-endian u32
//! - bincode body: header, recorded step indices, frames
//!
//! Frames are buffered in memory and the whole file is written by
//! [`TrajectoryWriter::finish`], first to a `.partial` sibling that is then
//! renamed over the target. A crashed run never leaves a truncated file at
//! the final path.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use trajgen_core::{Geometry, ParticleRecord, TimeSeries};

use crate::OutputError;

const MAGIC: [u8; 8] = *b"TRAJGEN\0";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryHeader {
    pub species: Vec<String>,
    pub geometry: Geometry,
    pub dt: f64,
    pub stride: u64,
}

#[derive(Serialize, Deserialize)]
struct TrajectoryBody {
    header: TrajectoryHeader,
    steps: Vec<u64>,
    frames: Vec<Vec<ParticleRecord>>,
}

/// Reference to a finished trajectory file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrajectoryHandle {
    pub path: PathBuf,
    pub frames: usize,
    pub particles: usize,
}

/// Deletes `path` if it exists. Returns whether a file was removed.
pub fn remove_existing(path: &Path) -> Result<bool, OutputError> {
    match fs::remove_file(path) {
        Ok(()) => {
            info!("Removed previous output {}", path.display());
            Ok(true)
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}

pub struct TrajectoryWriter {
    path: PathBuf,
    header: TrajectoryHeader,
    steps: Vec<u64>,
    frames: Vec<Vec<ParticleRecord>>,
}

impl TrajectoryWriter {
    /// Starts a new trajectory at `path`, deleting whatever was there.
    pub fn create(path: impl Into<PathBuf>, header: TrajectoryHeader) -> Result<Self, OutputError> {
        let path = path.into();
        remove_existing(&path)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            header,
            steps: Vec::new(),
            frames: Vec::new(),
        })
    }

    pub fn push_frame(&mut self, step: u64, frame: Vec<ParticleRecord>) -> Result<(), OutputError> {
        if let Some(first) = self.frames.first() {
            if first.len() != frame.len() {
                return Err(OutputError::Malformed(format!(
                    "frame at step {} has {} particles, expected {}",
                    step,
                    frame.len(),
                    first.len()
                )));
            }
        }
        if self.steps.last().is_some_and(|&last| step <= last) {
            return Err(OutputError::Malformed(format!(
                "step {} recorded out of order",
                step
            )));
        }
        self.steps.push(step);
        self.frames.push(frame);
        Ok(())
    }

    pub fn finish(self) -> Result<TrajectoryHandle, OutputError> {
        let mut partial = self.path.clone().into_os_string();
        partial.push(".partial");
        let partial = PathBuf::from(partial);

        let particles = self.frames.first().map_or(0, Vec::len);
        let frames = self.frames.len();
        let body = TrajectoryBody {
            header: self.header,
            steps: self.steps,
            frames: self.frames,
        };
        let written = write_body(&partial, &body)
            .and_then(|()| fs::rename(&partial, &self.path).map_err(OutputError::from));
        if let Err(err) = written {
            match fs::remove_file(&partial) {
                Err(cleanup) if cleanup.kind() != std::io::ErrorKind::NotFound => {
                    warn!("Could not remove {}: {}", partial.display(), cleanup)
                }
                _ => {}
            }
            return Err(err);
        }
        debug!(
            "Wrote {} frames x {} particles to {}",
            frames,
            particles,
            self.path.display()
        );

        Ok(TrajectoryHandle {
            path: self.path,
            frames,
            particles,
        })
    }
}

fn write_body(path: &Path, body: &TrajectoryBody) -> Result<(), OutputError> {
    let mut out = BufWriter::new(File::create(path)?);
    out.write_all(&MAGIC)?;
    out.write_all(&FORMAT_VERSION.to_le_bytes())?;
    bincode::serialize_into(&mut out, body)?;
    out.flush()?;
    Ok(())
}

/// A trajectory file loaded into memory.
#[derive(Debug)]
pub struct TrajectoryReader {
    path: PathBuf,
    header: TrajectoryHeader,
    steps: Vec<u64>,
    frames: Vec<Vec<ParticleRecord>>,
}

impl TrajectoryReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, OutputError> {
        let path = path.as_ref();
        let mut input = BufReader::new(File::open(path)?);

        let mut magic = [0u8; 8];
        let mut version = [0u8; 4];
        input
            .read_exact(&mut magic)
            .and_then(|_| input.read_exact(&mut version))
            .map_err(|_| OutputError::Malformed(format!("{} is too short", path.display())))?;
        if magic != MAGIC {
            return Err(OutputError::Malformed(format!(
                "{} is not a trajectory file",
                path.display()
            )));
        }
        let version = u32::from_le_bytes(version);
        if version != FORMAT_VERSION {
            return Err(OutputError::Malformed(format!(
                "unsupported trajectory format version {}",
                version
            )));
        }

        let body: TrajectoryBody = bincode::deserialize_from(input)
            .map_err(|e| OutputError::Malformed(format!("{}: {}", path.display(), e)))?;
        if body.steps.len() != body.frames.len() {
            return Err(OutputError::Malformed(format!(
                "{} step indices for {} frames",
                body.steps.len(),
                body.frames.len()
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            header: body.header,
            steps: body.steps,
            frames: body.frames,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &TrajectoryHeader {
        &self.header
    }

    pub fn steps(&self) -> &[u64] {
        &self.steps
    }

    pub fn frames(&self) -> &[Vec<ParticleRecord>] {
        &self.frames
    }

    /// Position observable restricted to the named species. An empty filter
    /// keeps every particle.
    pub fn read_positions(&self, filter: &[String]) -> Result<TimeSeries, OutputError> {
        let mut keep = vec![filter.is_empty(); self.header.species.len()];
        for name in filter {
            match self.header.species.iter().position(|s| s == name) {
                Some(index) => keep[index] = true,
                None => warn!("Species '{}' does not occur in {}", name, self.path.display()),
            }
        }

        let mut frames = Vec::with_capacity(self.frames.len());
        for frame in &self.frames {
            let mut kept = Vec::with_capacity(frame.len());
            for record in frame {
                match keep.get(record.species as usize) {
                    Some(true) => kept.push(*record),
                    Some(false) => {}
                    None => {
                        return Err(OutputError::Malformed(format!(
                            "particle {} has unknown species index {}",
                            record.id, record.species
                        )))
                    }
                }
            }
            frames.push(kept);
        }

        Ok(TimeSeries {
            steps: self.steps.clone(),
            dt: self.header.dt,
            species: self.header.species.clone(),
            frames,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;
    use tempfile::tempdir;

    fn header() -> TrajectoryHeader {
        TrajectoryHeader {
            species: vec!["A".into(), "B".into()],
            geometry: Geometry::default(),
            dt: 0.01,
            stride: 1,
        }
    }

    fn frame(t: u64) -> Vec<ParticleRecord> {
        vec![
            ParticleRecord::new(0, 0, DVec3::new(t as f64, 0.5, 0.0)),
            ParticleRecord::new(1, 1, DVec3::new(-(t as f64), 1.5, 0.0)),
            ParticleRecord::new(2, 0, DVec3::new(2.0, t as f64 * 0.1, 0.0)),
        ]
    }

    #[test]
    fn written_positions_read_back_unchanged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.traj");
        let mut writer = TrajectoryWriter::create(&path, header()).unwrap();
        for t in 0..5 {
            writer.push_frame(t, frame(t)).unwrap();
        }
        let handle = writer.finish().unwrap();
        assert_eq!(handle.frames, 5);
        assert_eq!(handle.particles, 3);

        let reader = TrajectoryReader::open(&handle.path).unwrap();
        assert_eq!(reader.header(), &header());
        let series = reader.read_positions(&[]).unwrap();
        assert_eq!(series.steps, vec![0, 1, 2, 3, 4]);
        for t in 0..5 {
            assert_eq!(series.frames[t as usize], frame(t));
        }

        let only_a = reader.read_positions(&["A".to_string()]).unwrap();
        assert_eq!(only_a.particle_count(), 2);
        assert!(only_a.frames.iter().flatten().all(|r| r.species == 0));
    }

    #[test]
    fn create_replaces_previous_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Sims.traj");
        for run in 0..2 {
            let mut writer = TrajectoryWriter::create(&path, header()).unwrap();
            writer.push_frame(0, frame(run)).unwrap();
            writer.finish().unwrap();
        }
        let reader = TrajectoryReader::open(&path).unwrap();
        assert_eq!(reader.frames().len(), 1);
        assert_eq!(reader.frames()[0], frame(1));
        assert!(!remove_existing(&dir.path().join("missing.traj")).unwrap());
    }

    #[test]
    fn failed_finish_leaves_no_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blocked.traj");
        let mut writer = TrajectoryWriter::create(&path, header()).unwrap();
        writer.push_frame(0, frame(0)).unwrap();
        // A directory at the target makes the final rename fail.
        fs::create_dir(&path).unwrap();

        assert!(matches!(writer.finish(), Err(OutputError::Io(_))));
        assert!(!dir.path().join("blocked.traj.partial").exists());
        assert!(path.is_dir());
    }

    #[test]
    fn rejects_inconsistent_frames() {
        let dir = tempdir().unwrap();
        let mut writer = TrajectoryWriter::create(dir.path().join("t.traj"), header()).unwrap();
        writer.push_frame(0, frame(0)).unwrap();
        let mut short = frame(1);
        short.pop();
        assert!(matches!(writer.push_frame(1, short), Err(OutputError::Malformed(_))));
        assert!(matches!(writer.push_frame(0, frame(0)), Err(OutputError::Malformed(_))));
    }

    #[test]
    fn missing_and_garbage_files_are_errors() {
        let dir = tempdir().unwrap();
        let missing = TrajectoryReader::open(dir.path().join("nope.traj"));
        assert!(matches!(missing, Err(OutputError::Io(_))));

        let garbage = dir.path().join("garbage.traj");
        fs::write(&garbage, b"definitely not a trajectory").unwrap();
        assert!(matches!(TrajectoryReader::open(&garbage), Err(OutputError::Malformed(_))));

        let truncated = dir.path().join("truncated.traj");
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&[1, 2, 3]);
        fs::write(&truncated, bytes).unwrap();
        assert!(matches!(TrajectoryReader::open(&truncated), Err(OutputError::Malformed(_))));
    }
}
