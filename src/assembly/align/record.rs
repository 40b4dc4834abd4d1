//! Read alignments as consumed by contig-end triage.
use super::cigar::Cigar;
use rust_htslib::bam::{
    self,
    record::{Aux, CigarString},
    HeaderView,
};

/// Where the other read of a pair landed.
#[derive(Debug, Clone, PartialEq)]
pub struct MateLocation {
    pub contig: String,
    pub pos: i64,
    /// One past the mate's last aligned base, known when the record carries an `MC` tag.
    pub end: Option<i64>,
    pub is_reverse: bool,
}

/// A single read's alignment to an assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentRecord {
    pub read_name: String,
    /// Name of the contig the read aligns to, `None` for unmapped reads.
    pub contig: Option<String>,
    pub cigar: Option<Cigar>,
    pub is_reverse: bool,
    pub is_first: bool,
    /// `None` when the mate is unmapped.
    pub mate: Option<MateLocation>,
}

impl AlignmentRecord {
    pub fn from_hts_rec(rec: &bam::Record, header: &HeaderView) -> AlignmentRecord {
        let contig_name = |tid: i32| {
            if tid < 0 {
                None
            } else {
                Some(String::from_utf8_lossy(header.tid2name(tid as u32)).into_owned())
            }
        };

        let (contig, cigar) = if rec.is_unmapped() {
            (None, None)
        } else {
            let cigar = Cigar {
                ref_pos: rec.pos(),
                ops: rec.cigar().take().to_vec(),
            };
            (contig_name(rec.tid()), Some(cigar))
        };

        let mate = if rec.is_paired() && !rec.is_mate_unmapped() {
            contig_name(rec.mtid()).map(|contig| MateLocation {
                contig,
                pos: rec.mpos(),
                end: mate_end(rec),
                is_reverse: rec.is_mate_reverse(),
            })
        } else {
            None
        };

        AlignmentRecord {
            read_name: String::from_utf8_lossy(rec.qname()).into_owned(),
            contig,
            cigar,
            is_reverse: rec.is_reverse(),
            is_first: rec.is_first_in_template(),
            mate,
        }
    }

    pub fn is_mapped(&self) -> bool {
        self.contig.is_some() && self.cigar.is_some()
    }
}

fn mate_end(rec: &bam::Record) -> Option<i64> {
    match rec.aux(b"MC") {
        Ok(Aux::String(text)) => CigarString::try_from(text).ok().map(|ops| {
            Cigar {
                ref_pos: rec.mpos(),
                ops: ops.0,
            }
            .ref_end()
        }),
        _ => None,
    }
}
