//! Subsequence DTW scoring of a query contour against a song.
//!
//! The cost of aligning song frames `i` with query frames `j` under a
//! transposition `shift` follows
//!
//! ```text
//! D[i][j] = |song[i] - (query[j] - shift)| + min(D[i-1][j], D[i][j-1], D[i-1][j-1])
//! ```
//!
//! with a free start (a virtual zero column: the match may begin at any song
//! frame) and a free end (the answer is the minimum of the last query column
//! over all song frames). Two interchangeable kernels compute the same value:
//! [`RowKernel`] sweeps rows, [`DiagonalKernel`] sweeps anti-diagonals over the
//! reversed, padded song buffer in fixed-width lanes. They perform identical
//! floating-point operations per cell and therefore agree bit for bit.

pub mod diagonal;
pub mod dtw;

use std::ops::Range;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::db::models::Song;
use crate::pitch::PitchType;

pub use diagonal::DiagonalKernel;
pub use dtw::{find_where, score, Alignment, RowKernel};

/// Lane width of the diagonal kernel; songs carry this much zero padding
/// after their reversed pitch buffer.
pub const LANES: usize = 8;

/// Cost of an impossible alignment (empty song range or empty query).
pub const INF: PitchType = PitchType::INFINITY;

/// A DTW scoring strategy.
pub trait DtwKernel: Send + Sync {
    /// Minimal free-start/free-end cost of `query` against `song.pitch[range]`.
    fn score(
        &self,
        song: &Song,
        range: Range<usize>,
        query: &[PitchType],
        shift: PitchType,
        scratch: &mut DtwScratch,
    ) -> PitchType;
}

/// Which kernel the search uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum KernelKind {
    Rows,
    #[default]
    Diagonal,
}

impl KernelKind {
    pub fn kernel(self) -> &'static dyn DtwKernel {
        match self {
            KernelKind::Rows => &RowKernel,
            KernelKind::Diagonal => &DiagonalKernel,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            KernelKind::Rows => "rows",
            KernelKind::Diagonal => "diagonal",
        }
    }
}

/// Reusable DP buffers. One per worker thread; never shared.
#[derive(Debug, Default)]
pub struct DtwScratch {
    query: Vec<PitchType>,
    bufs: [Vec<PitchType>; 3],
}

impl DtwScratch {
    /// Load `query - shift` (zero padded by [`LANES`]) and reset three
    /// buffers of `width` cells to `[0, INF, INF, ...]`.
    fn prepare(
        &mut self,
        query: &[PitchType],
        shift: PitchType,
        width: usize,
    ) -> (
        &[PitchType],
        &mut [PitchType],
        &mut [PitchType],
        &mut [PitchType],
    ) {
        self.query.clear();
        self.query.extend(query.iter().map(|&q| q - shift));
        self.query.resize(query.len() + LANES, 0.0);

        for buf in self.bufs.iter_mut() {
            buf.clear();
            buf.resize(width, INF);
            buf[0] = 0.0;
        }
        let [a, b, c] = &mut self.bufs;
        (&self.query, a, b, c)
    }
}

/// Minimum of the three DP predecessors. Every kernel goes through this so
/// they stay bit-identical.
#[inline(always)]
pub(crate) fn min3(up: PitchType, diag: PitchType, left: PitchType) -> PitchType {
    up.min(diag).min(left)
}
