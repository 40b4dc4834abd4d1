use bio::alignment::{Alignment, AlignmentOperation};
use itertools::Itertools;

pub type CigarOp = rust_htslib::bam::record::Cigar;

pub trait CigarOpExt {
    fn get_ref_len(&self) -> i64;
}

impl CigarOpExt for CigarOp {
    fn get_ref_len(&self) -> i64 {
        match self {
            CigarOp::Match(len)
            | CigarOp::RefSkip(len)
            | CigarOp::Del(len)
            | CigarOp::Equal(len)
            | CigarOp::Diff(len) => *len as i64,
            CigarOp::Ins(_) | CigarOp::SoftClip(_) | CigarOp::HardClip(_) | CigarOp::Pad(_) => 0,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Cigar {
    pub ref_pos: i64,
    pub ops: Vec<CigarOp>,
}

impl Cigar {
    pub fn ref_len(&self) -> i64 {
        self.ops.iter().map(|op| op.get_ref_len()).sum()
    }

    /// Reference position one past the last aligned base.
    pub fn ref_end(&self) -> i64 {
        self.ref_pos + self.ref_len()
    }

    pub fn leading_clip(&self) -> u32 {
        match self.ops.first() {
            Some(CigarOp::SoftClip(len)) => *len,
            _ => 0,
        }
    }

    pub fn trailing_clip(&self) -> u32 {
        match self.ops.last() {
            Some(CigarOp::SoftClip(len)) if self.ops.len() > 1 => *len,
            _ => 0,
        }
    }

    /// Converts a local alignment of a read (x) against a target (y) into CIGAR
    /// operations, soft clipping the unaligned ends of the read.
    pub fn from_local_alignment(align: &Alignment) -> Cigar {
        let mut ops = Vec::new();
        if align.xstart > 0 {
            ops.push(CigarOp::SoftClip(align.xstart as u32));
        }

        let runs = align
            .operations
            .iter()
            .filter_map(|op| match op {
                AlignmentOperation::Match | AlignmentOperation::Subst => Some('M'),
                AlignmentOperation::Ins => Some('I'),
                AlignmentOperation::Del => Some('D'),
                AlignmentOperation::Xclip(_) | AlignmentOperation::Yclip(_) => None,
            })
            .chunk_by(|kind| *kind);
        for (kind, run) in &runs {
            let len = run.count() as u32;
            ops.push(match kind {
                'M' => CigarOp::Match(len),
                'I' => CigarOp::Ins(len),
                _ => CigarOp::Del(len),
            });
        }

        let trailing = align.xlen - align.xend;
        if trailing > 0 {
            ops.push(CigarOp::SoftClip(trailing as u32));
        }

        Cigar {
            ref_pos: align.ystart as i64,
            ops,
        }
    }
}
