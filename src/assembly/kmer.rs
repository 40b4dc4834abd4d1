use super::params::KmerParams;
use crate::utils::{read_fastq, Result};
use std::path::Path;

/// Picks the k-mer size for assembling a cluster.
///
/// A non-zero `requested` value is returned as is. Zero derives the k-mer from
/// the mean read length of both files; when that statistic is unavailable the
/// configured default is used instead.
pub fn select_kmer(requested: usize, reads1: &Path, reads2: &Path, params: &KmerParams) -> usize {
    if requested > 0 {
        return requested;
    }

    match mean_read_length(&[reads1, reads2]) {
        Ok(Some(mean_len)) => {
            let kmer = (mean_len * params.read_length_fraction).floor() as usize;
            kmer.clamp(params.min_kmer, params.max_kmer)
        }
        Ok(None) => {
            log::warn!(
                "No reads to derive a k-mer from, using default k={}",
                params.default_kmer
            );
            params.default_kmer
        }
        Err(err) => {
            log::warn!(
                "Could not derive k-mer ({}), using default k={}",
                err,
                params.default_kmer
            );
            params.default_kmer
        }
    }
}

fn mean_read_length(paths: &[&Path]) -> Result<Option<f64>> {
    let mut num_reads = 0usize;
    let mut total_len = 0usize;
    for path in paths {
        for record in read_fastq(path)? {
            num_reads += 1;
            total_len += record.seq().len();
        }
    }
    if num_reads == 0 {
        return Ok(None);
    }
    Ok(Some(total_len as f64 / num_reads as f64))
}
