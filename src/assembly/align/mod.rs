mod aligner;
pub mod cigar;
mod record;

pub use aligner::{Aligner, Hit, MappingSummary, PairwiseAligner, Strand};
pub use record::{AlignmentRecord, MateLocation};
