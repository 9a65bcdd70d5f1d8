//! Chaining gapless blocks into alignments.
//!
//! * [`algo`] - KD-tree over block starts for predecessor search.
//! * [`gap_calc`] - Gap cost tables.
//! * [`sub_matrix`] - DNA substitution matrices.
//! * [`connect`] - Dynamic programming, overlap trimming and exact rescoring.
//! * [`band_ext`] - Banded affine extension into the space around blocks.
//! * [`record`] - Chains and blocks.

pub mod algo;
pub mod band_ext;
pub mod connect;
pub mod gap_calc;
pub mod record;
pub mod sub_matrix;

pub use algo::{ChainItem, KdTree};
pub use band_ext::{band_ext_backward, band_ext_forward, ExtBlock};
pub use connect::{chain_blocks, merge_abutting_blocks, sort_chains, ChainMeta, ScoreContext};
pub use gap_calc::GapCalc;
pub use record::{Block, Chain, ChainData, ChainHeader};
pub use sub_matrix::SubMatrix;
