//! Tunables for a single cluster run.

#[derive(Debug, Clone)]
pub struct KmerParams {
    /// Fraction of the mean read length used as the k-mer in auto mode.
    pub read_length_fraction: f64,
    pub min_kmer: usize,
    pub max_kmer: usize,
    /// Used when the read statistics cannot be computed.
    pub default_kmer: usize,
}

impl Default for KmerParams {
    fn default() -> Self {
        Self {
            read_length_fraction: 0.75,
            min_kmer: 5,
            max_kmer: 127,
            default_kmer: 21,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssemblerParams {
    /// K-mers seen fewer times than this are treated as sequencing noise.
    pub min_kmer_count: u32,
    pub min_contig_len: usize,
}

impl Default for AssemblerParams {
    fn default() -> Self {
        Self {
            min_kmer_count: 2,
            min_contig_len: 50,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MappingParams {
    pub match_scr: i32,
    pub mism_scr: i32,
    pub gapo_scr: i32,
    pub gape_scr: i32,
    /// A read is placed when its local score reaches this fraction of its length.
    pub min_score_frac: f64,
}

impl Default for MappingParams {
    fn default() -> Self {
        Self {
            match_scr: 1,
            mism_scr: 1,
            gapo_scr: 5,
            gape_scr: 1,
            min_score_frac: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EvidenceParams {
    /// Distance from a contig end within which reads count as boundary evidence.
    pub boundary_window: u64,
    pub min_clip: u32,
    pub min_link_depth: usize,
}

impl Default for EvidenceParams {
    fn default() -> Self {
        Self {
            boundary_window: 1000,
            min_clip: 10,
            min_link_depth: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrientationParams {
    pub min_hit_score: i32,
}

impl Default for OrientationParams {
    fn default() -> Self {
        Self { min_hit_score: 20 }
    }
}

#[derive(Debug, Clone)]
pub struct AssemblyParams {
    /// Requested k-mer size; zero selects one from the reads.
    pub kmer: usize,
    /// Maximum number of assembly rounds, including the first.
    pub max_iterations: usize,
    pub keep_work_dir: bool,
    pub kmer_params: KmerParams,
    pub assembler: AssemblerParams,
    pub mapping: MappingParams,
    pub evidence: EvidenceParams,
    pub orientation: OrientationParams,
}

impl Default for AssemblyParams {
    fn default() -> Self {
        Self {
            kmer: 0,
            max_iterations: 3,
            keep_work_dir: false,
            kmer_params: KmerParams::default(),
            assembler: AssemblerParams::default(),
            mapping: MappingParams::default(),
            evidence: EvidenceParams::default(),
            orientation: OrientationParams::default(),
        }
    }
}
