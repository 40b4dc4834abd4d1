//! Running the embedded assembler and enforcing its output contract.
//!
//! A successful run leaves a complete contig FASTA and a log; a failed run
//! leaves only the log. Partial FASTA output never reaches the destination path.
use super::dbg::KmerGraph;
use super::log_check::ASSEMBLY_FINISHED_MARKER;
use super::params::AssemblerParams;
use crate::utils::{read_fastq, Result};
use bio::io::fasta;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A de novo assembler that turns a read pair pool into contigs.
pub trait Assembler {
    fn name(&self) -> &str;

    /// Assembles `reads1`/`reads2` with the given k-mer, writing contigs to
    /// `contigs_out` and diagnostics to `log`. Returns the exit status, zero on success.
    fn assemble(
        &self,
        reads1: &Path,
        reads2: &Path,
        kmer: usize,
        contigs_out: &Path,
        log: &mut dyn Write,
    ) -> i32;
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssemblerOutcome {
    Success { contigs: PathBuf, log: PathBuf },
    Failure { status: i32, log: PathBuf },
}

impl AssemblerOutcome {
    pub fn exit_status(&self) -> i32 {
        match self {
            AssemblerOutcome::Success { .. } => 0,
            AssemblerOutcome::Failure { status, .. } => *status,
        }
    }

    pub fn log_path(&self) -> &Path {
        match self {
            AssemblerOutcome::Success { log, .. } | AssemblerOutcome::Failure { log, .. } => log,
        }
    }
}

/// Runs `assembler` and moves its contigs to `contigs_path` only when it succeeds.
pub fn run_assembler(
    assembler: &dyn Assembler,
    reads1: &Path,
    reads2: &Path,
    kmer: usize,
    contigs_path: &Path,
    log_path: &Path,
) -> AssemblerOutcome {
    const FAILED: i32 = 1;
    let failure = |status: i32| AssemblerOutcome::Failure {
        status,
        log: log_path.to_path_buf(),
    };

    // A stale file from an earlier attempt must not look like this run's output
    if contigs_path.exists() {
        if let Err(e) = fs::remove_file(contigs_path) {
            log::error!("Failed to remove {}: {}", contigs_path.display(), e);
        }
    }

    let mut log_file = match File::create(log_path) {
        Ok(file) => file,
        Err(e) => {
            log::error!("Failed to create {}: {}", log_path.display(), e);
            return failure(FAILED);
        }
    };

    let parent = match contigs_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let tmp = match NamedTempFile::new_in(parent) {
        Ok(tmp) => tmp,
        Err(e) => {
            let _ = writeln!(log_file, "[{}] error: {}", assembler.name(), e);
            return failure(FAILED);
        }
    };

    log::debug!(
        "Running {} assembler with k={} on {}",
        assembler.name(),
        kmer,
        reads1.display()
    );
    let status = assembler.assemble(reads1, reads2, kmer, tmp.path(), &mut log_file);
    if status != 0 {
        log::debug!("{} exited with status {}", assembler.name(), status);
        return failure(status);
    }

    match tmp.persist(contigs_path) {
        Ok(_) => AssemblerOutcome::Success {
            contigs: contigs_path.to_path_buf(),
            log: log_path.to_path_buf(),
        },
        Err(e) => {
            let _ = writeln!(log_file, "[{}] error: {}", assembler.name(), e);
            failure(FAILED)
        }
    }
}

/// The embedded de Bruijn graph assembler.
pub struct DeBruijnAssembler {
    params: AssemblerParams,
}

impl DeBruijnAssembler {
    pub fn new(params: AssemblerParams) -> Self {
        Self { params }
    }

    fn run(
        &self,
        reads1: &Path,
        reads2: &Path,
        kmer: usize,
        contigs_out: &Path,
        log: &mut dyn Write,
    ) -> Result<usize> {
        let mut reads = read_fastq(reads1)?;
        reads.extend(read_fastq(reads2)?);
        let write_err = |e: std::io::Error| format!("Failed to write assembler log: {}", e);
        writeln!(log, "[dbg] reads: {}", reads.len()).map_err(write_err)?;
        writeln!(log, "[dbg] k-mer size: {}", kmer).map_err(write_err)?;

        let graph = KmerGraph::from_reads(
            reads.iter().map(|r| r.seq()),
            kmer,
            self.params.min_kmer_count,
        );
        log::debug!("{} solid k-mers at k={}", graph.num_kmers(), kmer);
        let unitigs = graph.unitigs(self.params.min_contig_len);
        writeln!(log, "[dbg] contigs: {}", unitigs.len()).map_err(write_err)?;
        if unitigs.is_empty() {
            writeln!(log, "[dbg] no contigs assembled").map_err(write_err)?;
            return Ok(0);
        }

        let mut writer = fasta::Writer::to_file(contigs_out)
            .map_err(|e| format!("{}: {}", contigs_out.display(), e))?;
        for (index, unitig) in unitigs.iter().enumerate() {
            writer
                .write(&format!("contig.{}", index + 1), None, unitig)
                .map_err(|e| format!("{}: {}", contigs_out.display(), e))?;
        }
        writer
            .flush()
            .map_err(|e| format!("{}: {}", contigs_out.display(), e))?;

        let total_len: usize = unitigs.iter().map(|u| u.len()).sum();
        writeln!(log, "[dbg] total length: {}", total_len).map_err(write_err)?;
        writeln!(log, "{}", ASSEMBLY_FINISHED_MARKER).map_err(write_err)?;
        Ok(unitigs.len())
    }
}

impl Assembler for DeBruijnAssembler {
    fn name(&self) -> &str {
        "dbg"
    }

    fn assemble(
        &self,
        reads1: &Path,
        reads2: &Path,
        kmer: usize,
        contigs_out: &Path,
        log: &mut dyn Write,
    ) -> i32 {
        match self.run(reads1, reads2, kmer, contigs_out, log) {
            Ok(0) => 1,
            Ok(_) => 0,
            Err(err) => {
                let _ = writeln!(log, "[dbg] error: {}", err);
                1
            }
        }
    }
}
