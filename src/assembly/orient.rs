//! Strand correction of finished contigs against the reference.
use super::align::{Aligner, Strand};
use super::error::AssemblyError;
use super::params::OrientationParams;
use crate::utils::{read_fasta, write_fasta_atomically};
use bio::alphabets::dna::revcomp;
use bio::io::fasta;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OrientationFlag {
    /// A contig matched the reference equally well on both strands and was left as assembled.
    MatchBothStrands,
}

impl fmt::Display for OrientationFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrientationFlag::MatchBothStrands => write!(f, "match_both_strands"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Orientation {
    Keep,
    Flip,
    Ambiguous,
}

/// Best qualifying forward and reverse scores of `seq` across the reference.
fn best_scores(
    aligner: &dyn Aligner,
    seq: &[u8],
    reference: &[fasta::Record],
    min_score: i32,
) -> (Option<i32>, Option<i32>) {
    let mut forward = None;
    let mut reverse = None;
    for hit in aligner.hits(seq, reference) {
        if hit.score < min_score {
            continue;
        }
        let best = match hit.strand {
            Strand::Forward => &mut forward,
            Strand::Reverse => &mut reverse,
        };
        *best = Some(best.map_or(hit.score, |score: i32| score.max(hit.score)));
    }
    (forward, reverse)
}

fn decide_orientation(forward: Option<i32>, reverse: Option<i32>) -> Orientation {
    match (forward, reverse) {
        (Some(fwd), Some(rev)) if fwd == rev => Orientation::Ambiguous,
        (Some(fwd), Some(rev)) if rev > fwd => Orientation::Flip,
        (None, Some(_)) => Orientation::Flip,
        _ => Orientation::Keep,
    }
}

fn load_reference(reference_path: &Path) -> Result<Vec<fasta::Record>, AssemblyError> {
    let reference = read_fasta(reference_path).map_err(AssemblyError::ReferenceAlignment)?;
    if reference.is_empty() {
        return Err(AssemblyError::ReferenceAlignment(format!(
            "{} contains no sequences",
            reference_path.display()
        )));
    }
    Ok(reference)
}

/// Rewrites `contigs_path` into `output_path` with every contig on the strand of
/// its best reference hit. Contigs without a hit pass through unchanged.
pub fn fix_contig_orientation(
    aligner: &dyn Aligner,
    contigs_path: &Path,
    reference_path: &Path,
    output_path: &Path,
    params: &OrientationParams,
) -> Result<BTreeSet<OrientationFlag>, AssemblyError> {
    let reference = load_reference(reference_path)?;
    let contigs = read_fasta(contigs_path)?;

    let mut flags = BTreeSet::new();
    let mut oriented = Vec::with_capacity(contigs.len());
    for contig in contigs {
        let seq = contig.seq();
        let (forward, reverse) = best_scores(aligner, seq, &reference, params.min_hit_score);
        let record = match decide_orientation(forward, reverse) {
            Orientation::Keep => contig,
            Orientation::Flip => {
                log::debug!("{}: reverse complemented to match reference", contig.id());
                fasta::Record::with_attrs(contig.id(), contig.desc(), &revcomp(seq))
            }
            Orientation::Ambiguous => {
                log::warn!("{}: matches reference on both strands", contig.id());
                flags.insert(OrientationFlag::MatchBothStrands);
                contig
            }
        };
        oriented.push(record);
    }

    write_fasta_atomically(output_path, &oriented)?;
    Ok(flags)
}
