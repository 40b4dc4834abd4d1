//! Triage of reads re-mapped onto draft contigs.
//!
//! Each mapped read is sorted into at most one evidence category describing how
//! the sequence might continue past a contig end:
//! * soft clipped at a contig end,
//! * anchored near an end while its mate is unmapped,
//! * linking the ends of two different contigs through its mate.
use super::align::AlignmentRecord;
use super::params::EvidenceParams;
use crate::utils::Result;
use rust_htslib::bam::{self, Read};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ffi::OsString;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContigEnd {
    Left,
    Right,
}

impl fmt::Display for ContigEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContigEnd::Left => write!(f, "left"),
            ContigEnd::Right => write!(f, "right"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SoftClipEvidence {
    pub read_name: String,
    pub end: ContigEnd,
    pub clip_len: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnmappedMateEvidence {
    pub read_name: String,
    pub end: ContigEnd,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScaffoldLink {
    pub read_name: String,
    pub end: ContigEnd,
    pub mate_contig: String,
    pub mate_end: ContigEnd,
}

/// Classification of a single read. A read clipped at both ends of a short
/// contig yields two soft clip entries.
#[derive(Debug, Clone, PartialEq)]
pub enum Evidence {
    SoftClip(Vec<SoftClipEvidence>),
    UnmappedMate(UnmappedMateEvidence),
    ScaffoldLink(ScaffoldLink),
}

/// Pair of contig ends joined by read pairs, ordered so that each adjacency has one key.
pub type LinkKey = (String, ContigEnd, String, ContigEnd);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtensionEvidence {
    pub soft_clipped: BTreeMap<String, Vec<SoftClipEvidence>>,
    pub unmapped_mates: BTreeMap<String, Vec<UnmappedMateEvidence>>,
    pub scaffold_links: BTreeMap<String, Vec<ScaffoldLink>>,
}

impl ExtensionEvidence {
    fn add(&mut self, contig: &str, evidence: Evidence) {
        match evidence {
            Evidence::SoftClip(clips) => self
                .soft_clipped
                .entry(contig.to_string())
                .or_default()
                .extend(clips),
            Evidence::UnmappedMate(mate) => self
                .unmapped_mates
                .entry(contig.to_string())
                .or_default()
                .push(mate),
            Evidence::ScaffoldLink(link) => self
                .scaffold_links
                .entry(contig.to_string())
                .or_default()
                .push(link),
        }
    }

    pub fn num_soft_clipped(&self) -> usize {
        self.soft_clipped.values().map(Vec::len).sum()
    }

    pub fn num_unmapped_mates(&self) -> usize {
        self.unmapped_mates.values().map(Vec::len).sum()
    }

    pub fn num_scaffold_links(&self) -> usize {
        self.scaffold_links.values().map(Vec::len).sum()
    }

    /// Number of read pairs supporting each contig-end adjacency.
    pub fn link_depths(&self) -> BTreeMap<LinkKey, usize> {
        let mut depths = BTreeMap::new();
        for (contig, links) in &self.scaffold_links {
            for link in links {
                let this = (contig.clone(), link.end);
                let other = (link.mate_contig.clone(), link.mate_end);
                let ((c1, e1), (c2, e2)) = if this <= other {
                    (this, other)
                } else {
                    (other, this)
                };
                *depths.entry((c1, e1, c2, e2)).or_insert(0) += 1;
            }
        }
        depths
    }

    pub fn has_evidence(&self, min_link_depth: usize) -> bool {
        !self.soft_clipped.is_empty()
            || !self.unmapped_mates.is_empty()
            || self
                .link_depths()
                .values()
                .any(|depth| *depth >= min_link_depth)
    }

    /// Templates whose reads suggest sequence beyond a contig end.
    pub fn extension_templates(&self) -> BTreeSet<String> {
        let clipped = self
            .soft_clipped
            .values()
            .flatten()
            .map(|e| e.read_name.clone());
        let unmapped = self
            .unmapped_mates
            .values()
            .flatten()
            .map(|e| e.read_name.clone());
        clipped.chain(unmapped).collect()
    }

    /// Writes the soft clipped, unmapped mate and scaffold link tables next to `bam_path`.
    pub fn write_artifacts(&self, bam_path: &Path) -> Result<()> {
        let mut writer = create_artifact(bam_path, "soft_clipped")?;
        for (contig, clips) in &self.soft_clipped {
            for clip in clips {
                writeln!(
                    writer.1,
                    "{}\t{}\t{}\t{}",
                    contig, clip.end, clip.read_name, clip.clip_len
                )
                .map_err(|e| format!("Failed to write {}: {}", writer.0.display(), e))?;
            }
        }
        finish_artifact(writer)?;

        let mut writer = create_artifact(bam_path, "unmapped_mates")?;
        for (contig, mates) in &self.unmapped_mates {
            for mate in mates {
                writeln!(writer.1, "{}\t{}\t{}", contig, mate.end, mate.read_name)
                    .map_err(|e| format!("Failed to write {}: {}", writer.0.display(), e))?;
            }
        }
        finish_artifact(writer)?;

        let mut writer = create_artifact(bam_path, "scaff")?;
        for ((c1, e1, c2, e2), depth) in self.link_depths() {
            writeln!(writer.1, "{}\t{}\t{}\t{}\t{}", c1, e1, c2, e2, depth)
                .map_err(|e| format!("Failed to write {}: {}", writer.0.display(), e))?;
        }
        finish_artifact(writer)
    }
}

pub fn artifact_path(bam_path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(bam_path.as_os_str());
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

fn create_artifact(bam_path: &Path, suffix: &str) -> Result<(PathBuf, BufWriter<File>)> {
    let path = artifact_path(bam_path, suffix);
    let file =
        File::create(&path).map_err(|e| format!("Failed to create {}: {}", path.display(), e))?;
    Ok((path, BufWriter::new(file)))
}

fn finish_artifact((path, mut writer): (PathBuf, BufWriter<File>)) -> Result<()> {
    writer
        .flush()
        .map_err(|e| format!("Failed to write {}: {}", path.display(), e))
}

fn classify(
    record: &AlignmentRecord,
    contig_lens: &HashMap<&str, i64>,
    params: &EvidenceParams,
) -> Option<Evidence> {
    let contig = record.contig.as_deref()?;
    let cigar = record.cigar.as_ref()?;
    let contig_len = *contig_lens.get(contig)?;
    let window = params.boundary_window as i64;
    let near_left = |start: i64| start < window;
    let near_right = |end: i64, len: i64| end > len - window;

    let mut clips = Vec::new();
    if cigar.leading_clip() >= params.min_clip && near_left(cigar.ref_pos) {
        clips.push(SoftClipEvidence {
            read_name: record.read_name.clone(),
            end: ContigEnd::Left,
            clip_len: cigar.leading_clip(),
        });
    }
    if cigar.trailing_clip() >= params.min_clip && near_right(cigar.ref_end(), contig_len) {
        clips.push(SoftClipEvidence {
            read_name: record.read_name.clone(),
            end: ContigEnd::Right,
            clip_len: cigar.trailing_clip(),
        });
    }
    if !clips.is_empty() {
        return Some(Evidence::SoftClip(clips));
    }

    // A read points past the end it faces: right when forward, left when reverse
    let end = if record.is_reverse {
        ContigEnd::Left
    } else {
        ContigEnd::Right
    };
    let mate = match &record.mate {
        None => {
            return Some(Evidence::UnmappedMate(UnmappedMateEvidence {
                read_name: record.read_name.clone(),
                end,
            }))
        }
        Some(mate) => mate,
    };

    // Each pair is counted once, from its first read
    if mate.contig == contig || !record.is_first {
        return None;
    }
    let mate_len = *contig_lens.get(mate.contig.as_str())?;
    let mate_end = if mate.is_reverse {
        ContigEnd::Left
    } else {
        ContigEnd::Right
    };
    let read_near_end = match end {
        ContigEnd::Left => near_left(cigar.ref_pos),
        ContigEnd::Right => near_right(cigar.ref_end(), contig_len),
    };
    let mate_near_end = match mate_end {
        ContigEnd::Left => near_left(mate.pos),
        ContigEnd::Right => near_right(mate.end.unwrap_or(mate.pos), mate_len),
    };
    if read_near_end && mate_near_end {
        Some(Evidence::ScaffoldLink(ScaffoldLink {
            read_name: record.read_name.clone(),
            end,
            mate_contig: mate.contig.clone(),
            mate_end,
        }))
    } else {
        None
    }
}

/// Sorts alignments of reads against `contigs` into extension evidence.
pub fn find_extension_evidence<I>(
    contigs: &HashMap<String, Vec<u8>>,
    records: I,
    params: &EvidenceParams,
) -> ExtensionEvidence
where
    I: IntoIterator<Item = AlignmentRecord>,
{
    let contig_lens: HashMap<&str, i64> = contigs
        .iter()
        .map(|(name, seq)| (name.as_str(), seq.len() as i64))
        .collect();

    let mut evidence = ExtensionEvidence::default();
    for record in records {
        if let Some(item) = classify(&record, &contig_lens, params) {
            if let Some(contig) = record.contig.as_deref() {
                evidence.add(contig, item);
            }
        }
    }
    evidence
}

/// Reads a BAM of reads mapped to `contigs`, returns the evidence found and
/// writes the per-category tables beside the BAM.
pub fn parse_bam(
    contigs: &HashMap<String, Vec<u8>>,
    bam_path: &Path,
    params: &EvidenceParams,
) -> Result<ExtensionEvidence> {
    let mut reader = bam::Reader::from_path(bam_path)
        .map_err(|e| format!("Failed to open {}: {}", bam_path.display(), e))?;
    let header = reader.header().clone();
    let records = reader
        .records()
        .map(|rec| {
            rec.map(|rec| AlignmentRecord::from_hts_rec(&rec, &header))
                .map_err(|e| format!("Failed to read {}: {}", bam_path.display(), e))
        })
        .collect::<Result<Vec<_>>>()?;

    let evidence = find_extension_evidence(contigs, records, params);
    evidence.write_artifacts(bam_path)?;
    log::debug!(
        "{}: {} soft clipped, {} unmapped mates, {} scaffold links",
        bam_path.display(),
        evidence.num_soft_clipped(),
        evidence.num_unmapped_mates(),
        evidence.num_scaffold_links()
    );
    Ok(evidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::align::{cigar::Cigar, cigar::CigarOp, MateLocation};

    fn contigs() -> HashMap<String, Vec<u8>> {
        [
            ("contig.1".to_string(), vec![b'A'; 1000]),
            ("contig.2".to_string(), vec![b'C'; 600]),
        ]
        .into_iter()
        .collect()
    }

    fn params() -> EvidenceParams {
        EvidenceParams {
            boundary_window: 100,
            min_clip: 10,
            min_link_depth: 2,
        }
    }

    fn mapped(name: &str, contig: &str, pos: i64, ops: Vec<CigarOp>) -> AlignmentRecord {
        AlignmentRecord {
            read_name: name.to_string(),
            contig: Some(contig.to_string()),
            cigar: Some(Cigar { ref_pos: pos, ops }),
            is_reverse: false,
            is_first: true,
            mate: Some(MateLocation {
                contig: contig.to_string(),
                pos: pos + 200,
                end: Some(pos + 300),
                is_reverse: true,
            }),
        }
    }

    fn mate_on(mut record: AlignmentRecord, contig: &str, pos: i64, is_reverse: bool) -> AlignmentRecord {
        record.mate = Some(MateLocation {
            contig: contig.to_string(),
            pos,
            end: Some(pos + 80),
            is_reverse,
        });
        record
    }

    #[test]
    fn clipped_read_near_left_end() {
        let record = mapped("r1", "contig.1", 0, vec![CigarOp::SoftClip(12), CigarOp::Match(88)]);
        let evidence = find_extension_evidence(&contigs(), vec![record], &params());
        assert_eq!(
            evidence.soft_clipped["contig.1"],
            vec![SoftClipEvidence {
                read_name: "r1".to_string(),
                end: ContigEnd::Left,
                clip_len: 12
            }]
        );
        assert!(evidence.unmapped_mates.is_empty());
        assert!(evidence.has_evidence(2));
    }

    #[test]
    fn clipped_read_near_right_end() {
        let record = mapped("r1", "contig.2", 520, vec![CigarOp::Match(80), CigarOp::SoftClip(20)]);
        let evidence = find_extension_evidence(&contigs(), vec![record], &params());
        assert_eq!(evidence.soft_clipped["contig.2"][0].end, ContigEnd::Right);
        assert_eq!(evidence.soft_clipped["contig.2"][0].clip_len, 20);
    }

    #[test]
    fn short_or_interior_clips_are_ignored() {
        let short_clip = mapped("r1", "contig.1", 0, vec![CigarOp::SoftClip(9), CigarOp::Match(91)]);
        let interior = mapped("r2", "contig.1", 400, vec![CigarOp::SoftClip(30), CigarOp::Match(70)]);
        let evidence = find_extension_evidence(&contigs(), vec![short_clip, interior], &params());
        assert_eq!(evidence, ExtensionEvidence::default());
        assert!(!evidence.has_evidence(2));
    }

    #[test]
    fn read_with_unmapped_mate_faces_an_end() {
        let mut forward = mapped("r1", "contig.1", 400, vec![CigarOp::Match(100)]);
        forward.mate = None;
        let mut reverse = mapped("r2", "contig.1", 300, vec![CigarOp::Match(100)]);
        reverse.mate = None;
        reverse.is_reverse = true;

        let evidence = find_extension_evidence(&contigs(), vec![forward, reverse], &params());
        let mates = &evidence.unmapped_mates["contig.1"];
        assert_eq!(mates.len(), 2);
        assert_eq!(mates[0].end, ContigEnd::Right);
        assert_eq!(mates[1].end, ContigEnd::Left);
        assert!(evidence.has_evidence(2));
        assert_eq!(
            evidence.extension_templates().into_iter().collect::<Vec<_>>(),
            vec!["r1".to_string(), "r2".to_string()]
        );
    }

    #[test]
    fn read_is_placed_in_one_category_only() {
        let mut record = mapped("r1", "contig.1", 0, vec![CigarOp::SoftClip(15), CigarOp::Match(85)]);
        record.mate = None;
        let evidence = find_extension_evidence(&contigs(), vec![record], &params());
        assert_eq!(evidence.num_soft_clipped(), 1);
        assert_eq!(evidence.num_unmapped_mates(), 0);
        assert_eq!(evidence.num_scaffold_links(), 0);
    }

    #[test]
    fn unmapped_reads_are_ignored() {
        let record = AlignmentRecord {
            read_name: "r1".to_string(),
            contig: None,
            cigar: None,
            is_reverse: false,
            is_first: true,
            mate: None,
        };
        let evidence = find_extension_evidence(&contigs(), vec![record], &params());
        assert_eq!(evidence, ExtensionEvidence::default());
    }

    #[test]
    fn mates_near_ends_of_different_contigs_link() {
        let link1 = mate_on(
            mapped("r1", "contig.1", 920, vec![CigarOp::Match(80)]),
            "contig.2",
            30,
            true,
        );
        let link2 = mate_on(
            mapped("r2", "contig.1", 900, vec![CigarOp::Match(80)]),
            "contig.2",
            10,
            true,
        );
        let mut second_read = mate_on(
            mapped("r1", "contig.2", 30, vec![CigarOp::Match(80)]),
            "contig.1",
            920,
            false,
        );
        second_read.is_first = false;
        second_read.is_reverse = true;
        let far_mate = mate_on(
            mapped("r3", "contig.1", 910, vec![CigarOp::Match(80)]),
            "contig.2",
            300,
            true,
        );

        let records = vec![link1.clone(), second_read, far_mate];
        let evidence = find_extension_evidence(&contigs(), records, &params());
        assert_eq!(evidence.num_scaffold_links(), 1);
        assert_eq!(
            evidence.scaffold_links["contig.1"][0],
            ScaffoldLink {
                read_name: "r1".to_string(),
                end: ContigEnd::Right,
                mate_contig: "contig.2".to_string(),
                mate_end: ContigEnd::Left,
            }
        );
        assert!(!evidence.has_evidence(2));

        let evidence = find_extension_evidence(&contigs(), vec![link1, link2], &params());
        let key = (
            "contig.1".to_string(),
            ContigEnd::Right,
            "contig.2".to_string(),
            ContigEnd::Left,
        );
        assert_eq!(evidence.link_depths()[&key], 2);
        assert!(evidence.has_evidence(2));
        assert!(evidence.extension_templates().is_empty());
    }

    #[test]
    fn forward_mate_reaching_into_window_links() {
        // Mate starts 120 bases before the end of contig.2, outside the window,
        // but its alignment runs up to 10 bases from the end
        let reaching = mate_on(
            mapped("r1", "contig.1", 920, vec![CigarOp::Match(80)]),
            "contig.2",
            480,
            false,
        );
        let evidence = find_extension_evidence(&contigs(), vec![reaching.clone()], &params());
        assert_eq!(
            evidence.scaffold_links["contig.1"],
            vec![ScaffoldLink {
                read_name: "r1".to_string(),
                end: ContigEnd::Right,
                mate_contig: "contig.2".to_string(),
                mate_end: ContigEnd::Right,
            }]
        );

        let mut short = reaching;
        if let Some(mate) = short.mate.as_mut() {
            mate.end = Some(490);
        }
        let evidence = find_extension_evidence(&contigs(), vec![short], &params());
        assert_eq!(evidence.num_scaffold_links(), 0);
    }

    #[test]
    fn artifacts_are_written_beside_bam() {
        let dir = tempfile::tempdir().unwrap();
        let bam_path = dir.path().join("contigs.bam");
        let mut unmapped_mate = mapped("r2", "contig.2", 100, vec![CigarOp::Match(100)]);
        unmapped_mate.mate = None;
        let records = vec![
            mapped("r1", "contig.1", 0, vec![CigarOp::SoftClip(12), CigarOp::Match(88)]),
            unmapped_mate,
            mate_on(
                mapped("r3", "contig.2", 550, vec![CigarOp::Match(50)]),
                "contig.1",
                10,
                true,
            ),
        ];
        let evidence = find_extension_evidence(&contigs(), records, &params());
        evidence.write_artifacts(&bam_path).unwrap();

        let read = |suffix: &str| std::fs::read_to_string(artifact_path(&bam_path, suffix)).unwrap();
        assert_eq!(read("soft_clipped"), "contig.1\tleft\tr1\t12\n");
        assert_eq!(read("unmapped_mates"), "contig.2\tright\tr2\n");
        assert_eq!(read("scaff"), "contig.1\tleft\tcontig.2\tright\t1\n");
    }
}
