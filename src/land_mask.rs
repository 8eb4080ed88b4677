use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;

use crate::error::{MomError, MomResult};
use crate::fortran_array_2d::FortranArray2D;

/// Land/ocean mask of the global domain, indexed `(i, j)` from 1.
#[derive(Debug, Clone, PartialEq)]
pub struct LandMask {
    ocean: FortranArray2D<bool>,
    nx: usize,
    ny: usize,
}

impl LandMask {
    /// Builds a mask from rows `rows[j][i]` where non-zero marks land.
    pub fn from_land_rows(rows: &[Vec<u8>]) -> MomResult<Self> {
        Self::from_rows(rows, |cell| *cell == 0)
    }

    /// Builds a mask from rows of a topography ocean mask (non-zero is ocean).
    pub fn from_ocean_rows(rows: &[Vec<f64>]) -> MomResult<Self> {
        Self::from_rows(rows, |cell| *cell != 0.0)
    }

    fn from_rows<T, F>(rows: &[Vec<T>], is_ocean: F) -> MomResult<Self>
    where
        F: Fn(&T) -> bool,
    {
        let ny = rows.len();
        let nx = rows.first().map(Vec::len).unwrap_or(0);
        if nx == 0 || ny == 0 {
            return Err(MomError::InvalidMask("mask is empty".to_owned()));
        }

        let mut ocean = FortranArray2D::new(1, 1, nx, ny);
        for (j, row) in rows.iter().enumerate() {
            if row.len() != nx {
                return Err(MomError::InvalidMask(format!(
                    "row {} has {} cells, expected {}",
                    j + 1,
                    row.len(),
                    nx
                )));
            }
            for (i, cell) in row.iter().enumerate() {
                ocean.set(i + 1, j + 1, is_ocean(cell));
            }
        }

        Ok(LandMask { ocean, nx, ny })
    }

    /// Reads a whitespace-separated text grid of ocean-mask values, one line
    /// per row starting from the southernmost.
    pub fn read_topography<P: AsRef<Path>>(path: P) -> MomResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;

        let mut rows = Vec::new();
        for (line_idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let row = line
                .split_whitespace()
                .map(|cell| cell.parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| {
                    MomError::InvalidMask(format!(
                        "{}:{}: {}",
                        path.display(),
                        line_idx + 1,
                        err
                    ))
                })?;
            rows.push(row);
        }

        Self::from_ocean_rows(&rows)
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    pub fn is_ocean(&self, i: usize, j: usize) -> bool {
        self.ocean.get(i, j)
    }
}

/// Boundary connectivity of the grid, used to fill the halo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Topology {
    pub reentrant_x: bool,
    pub reentrant_y: bool,
    pub tripolar_n: bool,
}

/// A mask padded by halo cells on every side. Interior cell `(i, j)` sits at
/// `(i + halo_i, j + halo_j)`; halo cells are land unless filled by the
/// topology.
#[derive(Debug, Clone)]
pub struct HaloMask {
    ocean: FortranArray2D<bool>,
    nx: usize,
    ny: usize,
    halo_i: usize,
    halo_j: usize,
}

impl HaloMask {
    pub fn new(
        mask: &LandMask,
        halo_i: usize,
        halo_j: usize,
        topology: Topology,
    ) -> MomResult<Self> {
        let (nx, ny) = (mask.nx, mask.ny);
        if (topology.reentrant_x && halo_i > nx)
            || ((topology.reentrant_y || topology.tripolar_n) && halo_j > ny)
        {
            return Err(MomError::InvalidMask(format!(
                "halo ({}, {}) is wider than the {}x{} domain",
                halo_i, halo_j, nx, ny
            )));
        }

        let (px, py) = (nx + 2 * halo_i, ny + 2 * halo_j);
        let mut ocean = FortranArray2D::new(1, 1, px, py);
        for j in 1..=ny {
            for i in 1..=nx {
                ocean.set(i + halo_i, j + halo_j, mask.is_ocean(i, j));
            }
        }

        if topology.reentrant_x {
            for q in 1..=py {
                for p in 1..=halo_i {
                    ocean.set(p, q, ocean.get(p + nx, q));
                }
                for p in nx + halo_i + 1..=px {
                    ocean.set(p, q, ocean.get(p - nx, q));
                }
            }
        }

        if topology.reentrant_y {
            for p in 1..=px {
                for q in 1..=halo_j {
                    ocean.set(p, q, ocean.get(p, q + ny));
                }
                for q in ny + halo_j + 1..=py {
                    ocean.set(p, q, ocean.get(p, q - ny));
                }
            }
        }

        if topology.tripolar_n {
            // fold across the northern edge
            for k in 0..halo_j {
                for p in 1..=px {
                    let folded = ocean.get(px + 1 - p, ny + halo_j - k);
                    ocean.set(p, ny + halo_j + 1 + k, folded);
                }
            }
            // Blocks along the fold need metrics from their mirror partner,
            // so the last interior row never counts as all land.
            for p in 1..=px {
                ocean.set(p, ny + halo_j, true);
            }
        }

        Ok(HaloMask {
            ocean,
            nx,
            ny,
            halo_i,
            halo_j,
        })
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    /// Fraction of interior cells that are ocean.
    pub fn ocean_fraction(&self) -> f64 {
        let wet = (1..=self.ny)
            .flat_map(|j| (1..=self.nx).map(move |i| (i, j)))
            .filter(|&(i, j)| self.ocean.get(i + self.halo_i, j + self.halo_j))
            .count();
        wet as f64 / (self.nx * self.ny) as f64
    }

    /// True if the tile covering interior cells `i_cells x j_cells`, widened
    /// by the halo on every side, holds no ocean cell.
    pub fn is_land_block(
        &self,
        i_cells: RangeInclusive<usize>,
        j_cells: RangeInclusive<usize>,
    ) -> bool {
        let i_window = *i_cells.start()..=*i_cells.end() + 2 * self.halo_i;
        let j_window = *j_cells.start()..=*j_cells.end() + 2 * self.halo_j;
        !self.ocean.any_in_window(i_window, j_window, |wet| wet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(pattern: &[&str]) -> Vec<Vec<u8>> {
        pattern
            .iter()
            .map(|row| row.bytes().map(|b| b - b'0').collect())
            .collect()
    }

    #[test]
    fn rows_are_indexed_i_then_j() {
        let mask = LandMask::from_land_rows(&rows(&["110", "000"])).unwrap();
        assert_eq!((mask.nx(), mask.ny()), (3, 2));
        assert!(!mask.is_ocean(1, 1));
        assert!(!mask.is_ocean(2, 1));
        assert!(mask.is_ocean(3, 1));
        assert!(mask.is_ocean(1, 2));
    }

    #[test]
    fn ragged_and_empty_masks_are_rejected() {
        assert!(LandMask::from_land_rows(&rows(&["11", "0"])).is_err());
        assert!(LandMask::from_land_rows(&[]).is_err());
    }

    #[test]
    fn closed_halo_is_land() {
        let mask = LandMask::from_land_rows(&rows(&["00", "00"])).unwrap();
        let padded = HaloMask::new(&mask, 1, 1, Topology::default()).unwrap();
        assert_eq!(padded.ocean_fraction(), 1.0);
        assert!(!padded.ocean.get(1, 1));
        assert!(padded.ocean.get(2, 2));
    }

    #[test]
    fn reentrant_halo_wraps_around() {
        // ocean only in the eastern column
        let mask = LandMask::from_land_rows(&rows(&["110", "110"])).unwrap();
        let closed = HaloMask::new(&mask, 1, 0, Topology::default()).unwrap();
        let periodic = HaloMask::new(
            &mask,
            1,
            0,
            Topology {
                reentrant_x: true,
                ..Topology::default()
            },
        )
        .unwrap();

        // the western tile (interior column 1) sees the eastern column
        // through the periodic halo only
        assert!(closed.is_land_block(1..=1, 1..=2));
        assert!(!periodic.is_land_block(1..=1, 1..=2));
    }

    #[test]
    fn tripolar_fold_keeps_the_last_row_wet() {
        let mask = LandMask::from_land_rows(&rows(&["00", "11"])).unwrap();
        let padded = HaloMask::new(
            &mask,
            0,
            1,
            Topology {
                tripolar_n: true,
                ..Topology::default()
            },
        )
        .unwrap();
        assert_eq!(padded.ocean_fraction(), 1.0);
        // the folded halo row mirrors the (original, dry) northern row
        assert!(!padded.ocean.get(1, 4));
    }

    #[test]
    fn oversized_periodic_halo_is_rejected() {
        let mask = LandMask::from_land_rows(&rows(&["00"])).unwrap();
        let topology = Topology {
            reentrant_y: true,
            ..Topology::default()
        };
        assert!(HaloMask::new(&mask, 0, 2, topology).is_err());
    }
}
