//! Land block elimination.
//!
//! Finds a processor layout in which enough tiles are entirely land that,
//! once those tiles are masked out, exactly the requested number of
//! processors remain active.

use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{MomError, MomResult};
use crate::land_mask::{HaloMask, LandMask, Topology};
use crate::layout::{compute_extent, define_layout, Layout};
use crate::lbe_parameters::LbeParameters;

/// 1-based `(i, j)` coordinate of a tile in the layout.
pub type BlockCoord = (usize, usize);

/// Tiles of a `idiv x jdiv` layout over a closed-boundary mask whose
/// halo-widened window holds no ocean cell, in scan order (i outer, j inner).
pub fn find_land_blocks(
    mask: &LandMask,
    idiv: usize,
    jdiv: usize,
    halo_i: usize,
    halo_j: usize,
) -> MomResult<Vec<BlockCoord>> {
    let padded = HaloMask::new(mask, halo_i, halo_j, Topology::default())?;
    land_blocks(&padded, Layout { idiv, jdiv })
}

fn land_blocks(mask: &HaloMask, layout: Layout) -> MomResult<Vec<BlockCoord>> {
    let i_extents = compute_extent(1, mask.nx(), layout.idiv)?;
    let j_extents = compute_extent(1, mask.ny(), layout.jdiv)?;

    let mut blocks = Vec::new();
    for i in 0..layout.idiv {
        for j in 0..layout.jdiv {
            let i_cells = i_extents.begin[i]..=i_extents.end[i];
            let j_cells = j_extents.begin[j]..=j_extents.end[j];
            if mask.is_land_block(i_cells, j_cells) {
                blocks.push((i + 1, j + 1));
            }
        }
    }
    Ok(blocks)
}

/// Layout plus the tiles to leave unassigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskTable {
    pub layout: Layout,
    pub masked_blocks: Vec<BlockCoord>,
}

impl MaskTable {
    /// Number of processors left active.
    pub fn num_active(&self) -> usize {
        self.layout.num_tiles() - self.masked_blocks.len()
    }

    /// Writes the table as read by MOM6: the number of masked tiles, the
    /// layout `idiv,jdiv`, then one `i,j` line per masked tile.
    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        write!(writer, "{}", self)
    }

    pub fn write_to_dir<P: AsRef<Path>>(
        &self,
        output_dir: P,
        file_name: &str,
    ) -> MomResult<PathBuf> {
        let path = output_dir.as_ref().join(file_name);
        let mut file = File::create(&path)?;
        self.write(&mut file)?;
        info!(path = %path.display(), "mask_table written");
        Ok(path)
    }
}

impl fmt::Display for MaskTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.masked_blocks.len())?;
        writeln!(f, "{},{}", self.layout.idiv, self.layout.jdiv)?;
        for (i, j) in &self.masked_blocks {
            writeln!(f, "{},{}", i, j)?;
        }
        Ok(())
    }
}

/// Searches for the largest division count `p > npes`, starting from the
/// optimistic `ceil(npes / ocean_fraction)`, whose layout has at least
/// `p - npes` land tiles. The first `p - npes` of them are masked.
///
/// Layouts with more tiles than cells along a direction are passed over.
pub fn generate_mask_table(
    mask: &LandMask,
    npes: usize,
    params: &LbeParameters,
) -> MomResult<MaskTable> {
    if npes == 0 {
        return Err(MomError::InvalidLayout("number of PEs must be positive".to_owned()));
    }

    let padded = HaloMask::new(mask, params.halo_i, params.halo_j, params.topology())?;
    let (nx, ny) = (padded.nx(), padded.ny());

    let ocean_fraction = padded.ocean_fraction();
    if ocean_fraction <= 0.0 {
        return Err(MomError::InvalidMask("topography has no ocean cells".to_owned()));
    }
    let upper = (npes as f64 / ocean_fraction).ceil() as usize;
    debug!(ocean_fraction, upper, npes, "searching division counts");

    for p in (npes + 1..=upper).rev() {
        let layout = define_layout(nx, ny, p)?;
        let (idiv, jdiv) = (layout.idiv, layout.jdiv);

        if idiv > nx || jdiv > ny {
            debug!(p, idiv, jdiv, "skipping layout finer than the grid");
            continue;
        }

        if let Some(limit) = params.aspect_limit() {
            let ratio = (nx as f64 / idiv as f64) / (ny as f64 / jdiv as f64);
            if ratio * limit < 1.0 || limit < ratio {
                debug!(p, idiv, jdiv, ratio, "skipping extreme layout");
                continue;
            }
        }

        let mut blocks = land_blocks(&padded, layout)?;
        debug!(p, idiv, jdiv, land_blocks = blocks.len(), "candidate layout");

        if p - blocks.len() <= npes {
            blocks.truncate(p - npes);
            info!(
                ndivs = p,
                idiv,
                jdiv,
                masked = blocks.len(),
                "found the optimum layout for auto-masking"
            );
            return Ok(MaskTable {
                layout,
                masked_blocks: blocks,
            });
        }
    }

    Err(MomError::Unsatisfiable { npes })
}
