//! File output of synthesis results: the JSON result and the optional diagnostic dumps.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use log::info;

use crate::synthesis::{GrainRecord, SynthesisResult, VoxelGrid};

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Writes the full result as pretty-printed JSON
pub fn write_result_json(result: &SynthesisResult, path: &Path) -> Result<()> {
    let mut out = create(path)?;
    serde_json::to_writer_pretty(&mut out, result)
        .with_context(|| format!("serializing result to {}", path.display()))?;
    out.flush()?;
    info!("wrote result with {} grains to {}", result.grains.len(), path.display());
    Ok(())
}

/// Writes grain ids and phases as a legacy VTK structured-points dataset
pub fn write_vtk_grain_ids(grid: &VoxelGrid, path: &Path) -> Result<()> {
    let mut out = create(path)?;
    write_vtk(grid, &mut out).with_context(|| format!("writing {}", path.display()))?;
    info!("wrote VTK grain ids to {}", path.display());
    Ok(())
}

fn write_vtk<W: Write>(grid: &VoxelGrid, out: &mut W) -> std::io::Result<()> {
    let [nx, ny, nz] = grid.geometry.dims;
    let [rx, ry, rz] = grid.geometry.resolution;
    writeln!(out, "# vtk DataFile Version 2.0")?;
    writeln!(out, "synthetic microstructure")?;
    writeln!(out, "ASCII")?;
    writeln!(out, "DATASET STRUCTURED_POINTS")?;
    writeln!(out, "DIMENSIONS {} {} {}", nx, ny, nz)?;
    writeln!(out, "ORIGIN {} {} {}", rx * 0.5, ry * 0.5, rz * 0.5)?;
    writeln!(out, "SPACING {} {} {}", rx, ry, rz)?;
    writeln!(out, "POINT_DATA {}", grid.len())?;
    writeln!(out)?;
    writeln!(out, "SCALARS GrainID int 1")?;
    writeln!(out, "LOOKUP_TABLE default")?;
    write_rows(out, grid.grain_ids.iter())?;
    writeln!(out, "SCALARS PhaseID int 1")?;
    writeln!(out, "LOOKUP_TABLE default")?;
    write_rows(out, grid.phases.iter())?;
    Ok(())
}

// Twenty values per line
fn write_rows<W: Write, T: std::fmt::Display>(
    out: &mut W,
    values: impl Iterator<Item = T>,
) -> std::io::Result<()> {
    for (i, v) in values.enumerate() {
        if i > 0 && i % 20 == 0 {
            writeln!(out)?;
        }
        write!(out, "{} ", v)?;
    }
    writeln!(out)
}

/// Writes one `id phase phi1 PHI phi2` line per grain, angles in radians
pub fn write_euler_listing(grains: &[GrainRecord], path: &Path) -> Result<()> {
    let mut out = create(path)?;
    writeln!(out, "{}", grains.len())?;
    for g in grains {
        writeln!(
            out,
            "{} {} {:.6} {:.6} {:.6}",
            g.id, g.phase, g.euler.phi1, g.euler.phi, g.euler.phi2
        )?;
    }
    out.flush()?;
    info!("wrote Euler listing of {} grains to {}", grains.len(), path.display());
    Ok(())
}
