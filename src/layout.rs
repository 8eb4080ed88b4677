//! Processor layouts and per-tile index extents, matching the way MOM6 and
//! FMS decompose the global domain.

use crate::error::{MomError, MomResult};

/// Number of tiles along each direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub idiv: usize,
    pub jdiv: usize,
}

impl Layout {
    pub fn num_tiles(&self) -> usize {
        self.idiv * self.jdiv
    }
}

/// Splits `ndivs` processors into an `idiv x jdiv` layout whose tiles are as
/// close to square as an exact divisor pair allows for an `isz x jsz` grid.
pub fn define_layout(isz: usize, jsz: usize, ndivs: usize) -> MomResult<Layout> {
    if ndivs == 0 || isz == 0 || jsz == 0 {
        return Err(MomError::InvalidLayout(format!(
            "cannot lay out {} divisions on a {}x{} grid",
            ndivs, isz, jsz
        )));
    }

    // Match the domain aspect ratio first, then back off to a divisor.
    let ideal = ((ndivs as f64 * isz as f64) / jsz as f64).sqrt();
    let mut idiv = (ideal.round_ties_even() as usize).max(1);
    while ndivs % idiv != 0 {
        idiv -= 1;
    }

    Ok(Layout {
        idiv,
        jdiv: ndivs / idiv,
    })
}

/// Begin and end indices (inclusive) of each tile along one direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extents {
    pub begin: Vec<usize>,
    pub end: Vec<usize>,
}

impl Extents {
    pub fn len(&self) -> usize {
        self.begin.len()
    }

    pub fn is_empty(&self) -> bool {
        self.begin.is_empty()
    }
}

/// Partitions `[isg, ieg]` into `ndivs` contiguous tiles whose sizes differ
/// by at most one. When the parities of `ndivs` and the range length allow,
/// the decomposition is mirror-symmetric about the midpoint.
pub fn compute_extent(isg: usize, ieg: usize, ndivs: usize) -> MomResult<Extents> {
    if ndivs == 0 || ieg < isg {
        return Err(MomError::InvalidExtent(format!(
            "cannot split [{}, {}] into {} tiles",
            isg, ieg, ndivs
        )));
    }

    let (isg, ieg) = (isg as i64, ieg as i64);
    let n = ndivs as i64;
    let len = ieg - isg + 1;
    let even = |x: i64| x % 2 == 0;
    let symmetrize = (even(n) && even(len))
        || (!even(n) && !even(len))
        || (!even(n) && even(len) && 2 * n < len);

    let mut begin: Vec<Option<i64>> = vec![None; ndivs];
    let mut end: Vec<Option<i64>> = vec![None; ndivs];

    let mut is = isg;
    let mut imax = ieg;
    let mut ndmax = n;
    let ceil_div = |num: i64, den: i64| (num + den - 1).div_euclid(den);

    for ndiv in 0..n {
        let ie;
        // bottom half, going over the midpoint for odd ndivs
        if ndiv < (n - 1) / 2 + 1 {
            ie = is + ceil_div(imax - is + 1, ndmax - ndiv) - 1;
            let ndmirror = (n - 1) - ndiv;
            if ndmirror > ndiv && symmetrize {
                // max() eliminates overlaps
                let mirror_begin = (isg + ieg - ie).max(ie + 1);
                begin[ndmirror as usize] = Some(mirror_begin);
                end[ndmirror as usize] = Some((isg + ieg - is).max(ie + 1));
                imax = mirror_begin - 1;
                ndmax -= 1;
            }
        } else if symmetrize {
            // top half was filled in by mirroring
            is = begin[ndiv as usize].ok_or_else(|| missing_tile(ndiv))?;
            ie = end[ndiv as usize].ok_or_else(|| missing_tile(ndiv))?;
        } else {
            ie = is + ceil_div(imax - is + 1, ndmax - ndiv) - 1;
        }

        begin[ndiv as usize] = Some(is);
        end[ndiv as usize] = Some(ie);

        if ie < is {
            return Err(MomError::InvalidExtent(format!(
                "domain extents must be positive definite: tile {} of {} spans [{}, {}]",
                ndiv + 1,
                n,
                is,
                ie
            )));
        }
        if ndiv == n - 1 && ie != ieg {
            return Err(MomError::InvalidExtent(format!(
                "domain extents do not span space completely: last tile ends at {} not {}",
                ie, ieg
            )));
        }
        is = ie + 1;
    }

    let begin: Vec<usize> = begin.into_iter().map(|b| b.unwrap_or(0) as usize).collect();
    let end: Vec<usize> = end.into_iter().map(|e| e.unwrap_or(0) as usize).collect();
    for k in 1..ndivs {
        if begin[k] != end[k - 1] + 1 {
            return Err(MomError::InvalidExtent(format!(
                "tiles {} and {} are not contiguous",
                k,
                k + 1
            )));
        }
    }

    Ok(Extents { begin, end })
}

fn missing_tile(ndiv: i64) -> MomError {
    MomError::InvalidExtent(format!("tile {} was never assigned", ndiv + 1))
}
