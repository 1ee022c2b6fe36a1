//! XYZ export plus a VMD script for viewing a trajectory.
//!
//! View the result with `vmd -e <trajectory>.xyz.tcl`.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use glam::DVec3;
use log::{info, warn};

use crate::trajectory::TrajectoryReader;
use crate::OutputError;

const DEFAULT_RADIUS: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisualizationFiles {
    pub xyz: PathBuf,
    pub script: PathBuf,
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Writes `<trajectory>.xyz` and `<trajectory>.xyz.tcl` next to the
/// trajectory file.
pub fn export_xyz(
    trajectory: &TrajectoryReader,
    radii: &BTreeMap<String, f64>,
    draw_box: bool,
) -> Result<VisualizationFiles, OutputError> {
    let xyz = with_suffix(trajectory.path(), ".xyz");
    let script = with_suffix(trajectory.path(), ".xyz.tcl");
    let species = &trajectory.header().species;

    let mut out = BufWriter::new(File::create(&xyz)?);
    for (step, frame) in trajectory.steps().iter().zip(trajectory.frames()) {
        writeln!(out, "{}", frame.len())?;
        writeln!(out, "step {}", step)?;
        for record in frame {
            let name = species
                .get(record.species as usize)
                .map(String::as_str)
                .unwrap_or("X");
            writeln!(out, "{} {:.6} {:.6} {:.6}", name, record.x, record.y, record.z)?;
        }
    }
    out.flush()?;

    let mut tcl = BufWriter::new(File::create(&script)?);
    writeln!(tcl, "mol delete top")?;
    writeln!(tcl, "mol load xyz {{{}}}", xyz.display())?;
    writeln!(tcl, "mol delrep 0 top")?;
    writeln!(tcl, "display resetview")?;
    for (color, name) in species.iter().enumerate() {
        let radius = match radii.get(name) {
            Some(radius) => *radius,
            None => {
                warn!("No radius given for species '{}', using {}", name, DEFAULT_RADIUS);
                DEFAULT_RADIUS
            }
        };
        writeln!(tcl, "mol representation VDW {:.6} 16.0", radius)?;
        writeln!(tcl, "mol selection name {}", name)?;
        writeln!(tcl, "mol color ColorID {}", color % 33)?;
        writeln!(tcl, "mol addrep top")?;
    }
    writeln!(tcl, "animate goto 0")?;
    writeln!(tcl, "color Display Background white")?;
    if draw_box {
        writeln!(tcl, "draw color black")?;
        for (a, b) in box_edges(trajectory.header().geometry.half_extent()) {
            writeln!(
                tcl,
                "draw line {{{} {} {}}} {{{} {} {}}}",
                a.x, a.y, a.z, b.x, b.y, b.z
            )?;
        }
    }
    tcl.flush()?;

    info!("Visualization written to {} (vmd -e {})", xyz.display(), script.display());
    Ok(VisualizationFiles { xyz, script })
}

/// The 12 edges of the origin-centred box with the given half extent.
fn box_edges(half: DVec3) -> Vec<(DVec3, DVec3)> {
    let corner = |i: usize| {
        DVec3::new(
            if i & 1 == 0 { -half.x } else { half.x },
            if i & 2 == 0 { -half.y } else { half.y },
            if i & 4 == 0 { -half.z } else { half.z },
        )
    };
    let mut edges = Vec::with_capacity(12);
    for i in 0..8usize {
        for bit in [1usize, 2, 4] {
            if i & bit == 0 {
                edges.push((corner(i), corner(i | bit)));
            }
        }
    }
    edges
}
