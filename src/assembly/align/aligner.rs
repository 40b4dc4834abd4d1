//! Read and contig alignment.
//!
//! `Aligner` is the seam used for both re-mapping reads onto draft contigs and
//! matching finished contigs against the reference. `PairwiseAligner` is the
//! built-in implementation based on local Smith-Waterman alignment.
use super::cigar::Cigar;
use crate::assembly::{params::MappingParams, reads::ReadPairPool};
use crate::cli;
use crate::utils::Result;
use bio::alignment::pairwise::{Aligner as BioAligner, MatchParams};
use bio::alphabets::dna::revcomp;
use bio::io::{fasta, fastq};
use rust_htslib::bam::{
    self,
    header::HeaderRecord,
    record::{Aux, CigarString},
};
use std::env;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Strand {
    Forward,
    Reverse,
}

/// Best local alignment score of a query against one target on one strand.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub target: String,
    pub strand: Strand,
    pub score: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MappingSummary {
    pub mapped: usize,
    pub unmapped: usize,
}

pub trait Aligner {
    /// Maps every read of `pool` onto `targets` and writes a coordinate-sorted, indexed BAM.
    fn map_pairs(
        &self,
        pool: &ReadPairPool,
        targets: &[fasta::Record],
        bam_path: &Path,
    ) -> Result<MappingSummary>;

    /// Returns the forward and reverse strand hit of `query` against each target.
    fn hits(&self, query: &[u8], targets: &[fasta::Record]) -> Vec<Hit>;
}

#[derive(Debug, Clone)]
struct Placement {
    tid: usize,
    strand: Strand,
    score: i32,
    cigar: Cigar,
    unique: bool,
}

impl Placement {
    fn start(&self) -> i64 {
        self.cigar.ref_pos
    }

    fn end(&self) -> i64 {
        self.cigar.ref_end()
    }
}

pub struct PairwiseAligner {
    params: MappingParams,
}

impl PairwiseAligner {
    pub fn new(params: MappingParams) -> Self {
        Self { params }
    }

    fn create_aligner(&self) -> BioAligner<MatchParams> {
        BioAligner::new(
            -self.params.gapo_scr,
            -self.params.gape_scr,
            MatchParams::new(self.params.match_scr, -self.params.mism_scr),
        )
    }

    fn min_score(&self, read_len: usize) -> i32 {
        ((read_len as f64 * self.params.min_score_frac).ceil() as i32).max(1)
    }

    /// Finds the best placement of `read`; ties keep the first target and the forward strand.
    fn place(
        &self,
        aligner: &mut BioAligner<MatchParams>,
        read: &[u8],
        targets: &[Vec<u8>],
    ) -> Option<Placement> {
        if read.is_empty() {
            return None;
        }
        let read_rc = revcomp(read);
        let mut best: Option<Placement> = None;
        for (tid, target) in targets.iter().enumerate() {
            for (strand, seq) in [(Strand::Forward, read), (Strand::Reverse, &read_rc[..])] {
                let align = aligner.local(seq, target);
                let is_better = best
                    .as_ref()
                    .map_or(true, |current| align.score > current.score);
                if is_better {
                    best = Some(Placement {
                        tid,
                        strand,
                        score: align.score,
                        cigar: Cigar::from_local_alignment(&align),
                        unique: true,
                    });
                } else if let Some(current) = best.as_mut() {
                    if align.score == current.score {
                        current.unique = false;
                    }
                }
            }
        }
        best.filter(|placement| placement.score >= self.min_score(read.len()))
    }
}

impl Aligner for PairwiseAligner {
    fn map_pairs(
        &self,
        pool: &ReadPairPool,
        targets: &[fasta::Record],
        bam_path: &Path,
    ) -> Result<MappingSummary> {
        if targets.is_empty() {
            return Err(format!(
                "No sequences to map reads against for {}",
                bam_path.display()
            ));
        }
        let target_seqs: Vec<Vec<u8>> = targets
            .iter()
            .map(|t| t.seq().to_ascii_uppercase())
            .collect();

        let mut aligner = self.create_aligner();
        let mut summary = MappingSummary::default();
        let mut records = Vec::with_capacity(2 * pool.len());
        for pair in pool.pairs() {
            let seq1 = pair.read1.seq().to_ascii_uppercase();
            let seq2 = pair.read2.seq().to_ascii_uppercase();
            let placement1 = self.place(&mut aligner, &seq1, &target_seqs);
            let placement2 = self.place(&mut aligner, &seq2, &target_seqs);
            for placement in [&placement1, &placement2] {
                match placement {
                    Some(_) => summary.mapped += 1,
                    None => summary.unmapped += 1,
                }
            }

            let mate1 = MateRead {
                read: &pair.read1,
                seq: &seq1,
                placement: placement1.as_ref(),
            };
            let mate2 = MateRead {
                read: &pair.read2,
                seq: &seq2,
                placement: placement2.as_ref(),
            };
            records.push(build_record(&pair.template, &mate1, &mate2, true)?);
            records.push(build_record(&pair.template, &mate2, &mate1, false)?);
        }

        // Coordinate order, unmapped pairs last
        records.sort_by_key(|rec| (rec.tid() < 0, rec.tid(), rec.pos()));

        let header = create_header(targets);
        {
            let mut writer = bam::Writer::from_path(bam_path, &header, bam::Format::Bam)
                .map_err(|e| format!("Failed to create {}: {}", bam_path.display(), e))?;
            for rec in &records {
                writer
                    .write(rec)
                    .map_err(|e| format!("Failed to write {}: {}", bam_path.display(), e))?;
            }
        }
        bam::index::build(bam_path, None, bam::index::Type::Bai, 1)
            .map_err(|e| format!("Failed to index {}: {}", bam_path.display(), e))?;

        log::debug!(
            "{}: {} reads mapped, {} unmapped",
            bam_path.display(),
            summary.mapped,
            summary.unmapped
        );
        Ok(summary)
    }

    fn hits(&self, query: &[u8], targets: &[fasta::Record]) -> Vec<Hit> {
        let query = query.to_ascii_uppercase();
        let query_rc = revcomp(&query);
        let mut aligner = self.create_aligner();
        let mut hits = Vec::with_capacity(2 * targets.len());
        for target in targets {
            let target_seq = target.seq().to_ascii_uppercase();
            for (strand, seq) in [(Strand::Forward, &query), (Strand::Reverse, &query_rc)] {
                hits.push(Hit {
                    target: target.id().to_string(),
                    strand,
                    score: aligner.local(seq, &target_seq).score,
                });
            }
        }
        hits
    }
}

struct MateRead<'a> {
    read: &'a fastq::Record,
    seq: &'a [u8],
    placement: Option<&'a Placement>,
}

fn bam_quals(read: &fastq::Record) -> Vec<u8> {
    if read.qual().len() == read.seq().len() {
        read.qual().iter().map(|q| q.saturating_sub(33)).collect()
    } else {
        vec![0xff; read.seq().len()]
    }
}

fn build_record(
    template: &str,
    this: &MateRead,
    mate: &MateRead,
    is_first: bool,
) -> Result<bam::Record> {
    let mut rec = bam::Record::new();
    let mut flags: u16 = 0x1 | if is_first { 0x40 } else { 0x80 };
    let mut quals = bam_quals(this.read);

    match this.placement {
        Some(placement) => {
            let seq = match placement.strand {
                Strand::Forward => this.seq.to_vec(),
                Strand::Reverse => {
                    quals.reverse();
                    flags |= 0x10;
                    revcomp(this.seq)
                }
            };
            let cigar = CigarString(placement.cigar.ops.clone());
            rec.set(template.as_bytes(), Some(&cigar), &seq, &quals);
            rec.set_tid(placement.tid as i32);
            rec.set_pos(placement.start());
            rec.set_mapq(if placement.unique { 60 } else { 0 });
            rec.push_aux(b"AS", Aux::I32(placement.score))
                .map_err(|e| format!("Failed to tag read {}: {}", template, e))?;
        }
        None => {
            rec.set(template.as_bytes(), None, this.seq, &quals);
            flags |= 0x4;
            // Unmapped reads sit at their mate's position
            let (tid, pos) = mate
                .placement
                .map(|p| (p.tid as i32, p.start()))
                .unwrap_or((-1, -1));
            rec.set_tid(tid);
            rec.set_pos(pos);
            rec.set_mapq(0);
        }
    }

    match mate.placement {
        Some(mate_placement) => {
            if mate_placement.strand == Strand::Reverse {
                flags |= 0x20;
            }
            rec.set_mtid(mate_placement.tid as i32);
            rec.set_mpos(mate_placement.start());
            let mate_cigar = CigarString(mate_placement.cigar.ops.clone()).to_string();
            rec.push_aux(b"MC", Aux::String(&mate_cigar))
                .map_err(|e| format!("Failed to tag read {}: {}", template, e))?;
        }
        None => {
            flags |= 0x8;
            rec.set_mtid(rec.tid());
            rec.set_mpos(rec.pos());
        }
    }

    if let (Some(p), Some(m)) = (this.placement, mate.placement) {
        if p.tid == m.tid {
            if p.strand != m.strand {
                flags |= 0x2;
            }
            let span = p.end().max(m.end()) - p.start().min(m.start());
            let is_leftmost = p.start() < m.start() || (p.start() == m.start() && is_first);
            rec.set_insert_size(if is_leftmost { span } else { -span });
        }
    }

    rec.set_flags(flags);
    Ok(rec)
}

fn create_header(targets: &[fasta::Record]) -> bam::Header {
    let mut header = bam::Header::new();

    let mut hd = HeaderRecord::new(b"HD");
    hd.push_tag(b"VN", "1.6");
    hd.push_tag(b"SO", "coordinate");
    header.push_record(&hd);

    for target in targets {
        let mut sq = HeaderRecord::new(b"SQ");
        sq.push_tag(b"SN", target.id());
        sq.push_tag(b"LN", target.seq().len());
        header.push_record(&sq);
    }

    let args: Vec<String> = env::args().collect();
    let mut pg = HeaderRecord::new(b"PG");
    pg.push_tag(b"ID", env!("CARGO_PKG_NAME"));
    pg.push_tag(b"PN", env!("CARGO_PKG_NAME"));
    pg.push_tag(b"CL", args.join(" "));
    pg.push_tag(b"VN", (*cli::FULL_VERSION).to_string());
    header.push_record(&pg);

    header
}
