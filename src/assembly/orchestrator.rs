//! Per-cluster assembly driver.
//!
//! A cluster moves through
//! `Init -> Assembling -> (Extending -> Assembling)* -> Orienting -> Renaming -> Done`,
//! ending in `Failed` when a stage cannot complete. Every transition appends a
//! fixed-format line to the caller's audit log so that runs can be compared
//! byte for byte.
use super::align::Aligner;
use super::assembler::{run_assembler, Assembler, AssemblerOutcome};
use super::error::AssemblyError;
use super::extend::{parse_bam, ExtensionEvidence};
use super::kmer::select_kmer;
use super::log_check::check_assembler_log;
use super::orient::{fix_contig_orientation, OrientationFlag};
use super::params::AssemblyParams;
use super::reads::ReadPairPool;
use super::rename::rename_scaffolds;
use crate::utils::{self, read_fasta};
use itertools::Itertools;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use tempfile::TempDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Assembling,
    Extending,
    Orienting,
    Renaming,
    Done,
    Failed,
}

/// Inputs and output locations of one cluster.
#[derive(Debug, Clone)]
pub struct ClusterJob {
    pub name: String,
    pub reads1: PathBuf,
    pub reads2: PathBuf,
    pub reference: PathBuf,
    /// Final contigs are written to `<prefix>.fa` and the read alignment to `<prefix>.bam`.
    pub output_prefix: String,
}

impl ClusterJob {
    pub fn contigs_path(&self) -> PathBuf {
        utils::output_path(&self.output_prefix, "fa")
    }

    pub fn bam_path(&self) -> PathBuf {
        utils::output_path(&self.output_prefix, "bam")
    }

    /// Everything the cluster writes next to its output prefix, excluding the log.
    fn outputs(&self) -> [PathBuf; 3] {
        [
            self.contigs_path(),
            self.bam_path(),
            utils::output_path(&self.output_prefix, "bam.bai"),
        ]
    }

    fn work_dir_parent(&self) -> PathBuf {
        match self.contigs_path().parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClusterStatus {
    Assembled,
    /// Assembled, but some contigs could not be oriented unambiguously.
    AssembledLowConfidence(BTreeSet<OrientationFlag>),
    Failed(AssemblyError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyReport {
    pub name: String,
    pub status: ClusterStatus,
    /// Number of assembly rounds that were started.
    pub iterations: usize,
    pub num_sequences: usize,
    pub contigs: Option<PathBuf>,
    pub bam: Option<PathBuf>,
    /// Location of the kept work directory, if one was requested.
    pub work_dir: Option<PathBuf>,
}

impl AssemblyReport {
    pub fn assembled_ok(&self) -> bool {
        !matches!(self.status, ClusterStatus::Failed(_))
    }

    pub fn flags(&self) -> BTreeSet<OrientationFlag> {
        match &self.status {
            ClusterStatus::AssembledLowConfidence(flags) => flags.clone(),
            _ => BTreeSet::new(),
        }
    }
}

#[derive(Debug)]
pub struct PipelineState {
    pub stage: Stage,
    pub assembled_ok: bool,
    pub iteration: usize,
    pub kmer: usize,
    /// Most recent draft contigs inside the work directory.
    pub draft_contigs: Option<PathBuf>,
    pub num_sequences: usize,
    folded: BTreeSet<String>,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            stage: Stage::Init,
            assembled_ok: false,
            iteration: 0,
            kmer: 0,
            draft_contigs: None,
            num_sequences: 0,
            folded: BTreeSet::new(),
        }
    }
}

enum ExtendDecision {
    Reassemble(ReadPairPool),
    Finish,
}

/// Assembles one cluster, writing audit lines to a log sink owned by the caller.
pub struct ClusterAssembly<'a, W: Write> {
    job: ClusterJob,
    params: &'a AssemblyParams,
    assembler: &'a dyn Assembler,
    aligner: &'a dyn Aligner,
    log: &'a mut W,
    state: PipelineState,
    work_dir: Option<PathBuf>,
}

impl<'a, W: Write> ClusterAssembly<'a, W> {
    pub fn new(
        job: ClusterJob,
        params: &'a AssemblyParams,
        assembler: &'a dyn Assembler,
        aligner: &'a dyn Aligner,
        log: &'a mut W,
    ) -> Self {
        Self {
            job,
            params,
            assembler,
            aligner,
            log,
            state: PipelineState::default(),
            work_dir: None,
        }
    }

    pub fn run(mut self) -> AssemblyReport {
        log::info!("{}: assembling with {}", self.job.name, self.assembler.name());
        self.remove_outputs();

        let result = self.audit(&format!("[cluster] {}", self.job.name));
        let (result, work_dir) = match result.and_then(|_| self.create_work_dir()) {
            Ok(work_dir) => {
                self.work_dir = Some(work_dir.path().to_path_buf());
                let result = self.execute(work_dir.path());
                (result, self.release_work_dir(work_dir))
            }
            Err(err) => (Err(err), None),
        };

        let status = match result {
            Ok(flags) if flags.is_empty() => ClusterStatus::Assembled,
            Ok(flags) => ClusterStatus::AssembledLowConfidence(flags),
            Err(err) => {
                log::warn!("{}: {}", self.job.name, err);
                self.state.stage = Stage::Failed;
                self.state.assembled_ok = false;
                ClusterStatus::Failed(err)
            }
        };
        if let Err(e) = self.log.flush() {
            log::error!("{}: failed to flush assembly log: {}", self.job.name, e);
        }

        let assembled = self.state.assembled_ok;
        AssemblyReport {
            name: self.job.name.clone(),
            status,
            iterations: self.state.iteration,
            num_sequences: self.state.num_sequences,
            contigs: assembled.then(|| self.job.contigs_path()),
            bam: assembled.then(|| self.job.bam_path()),
            work_dir,
        }
    }

    fn create_work_dir(&mut self) -> Result<TempDir, AssemblyError> {
        let parent = self.job.work_dir_parent();
        tempfile::Builder::new()
            .prefix(&format!("{}.", self.job.name))
            .tempdir_in(&parent)
            .map_err(|e| {
                AssemblyError::Io(format!(
                    "Failed to create work directory in {}: {}",
                    parent.display(),
                    e
                ))
            })
            .or_else(|err| self.fail("assemble", err))
    }

    fn release_work_dir(&self, work_dir: TempDir) -> Option<PathBuf> {
        if self.params.keep_work_dir {
            let path = work_dir.keep();
            log::info!("{}: kept work directory {}", self.job.name, path.display());
            Some(path)
        } else {
            if let Err(e) = work_dir.close() {
                log::warn!("{}: failed to remove work directory: {}", self.job.name, e);
            }
            None
        }
    }

    fn execute(&mut self, work_dir: &Path) -> Result<BTreeSet<OrientationFlag>, AssemblyError> {
        let recruited = ReadPairPool::from_paths(&self.job.reads1, &self.job.reads2)
            .map_err(AssemblyError::Io)
            .or_else(|err| self.fail("assemble", err))?;
        if recruited.is_empty() {
            log::warn!("{}: no read pairs recruited", self.job.name);
        }
        let mut pool = recruited.clone();
        let mut reads = (self.job.reads1.clone(), self.job.reads2.clone());
        self.state.kmer = select_kmer(
            self.params.kmer,
            &reads.0,
            &reads.1,
            &self.params.kmer_params,
        );

        loop {
            self.state.iteration += 1;
            let contigs = self.assemble(work_dir, &reads.0, &reads.1)?;
            self.state.draft_contigs = Some(contigs.clone());

            self.state.stage = Stage::Extending;
            match self.extend(work_dir, &contigs, &pool)? {
                ExtendDecision::Reassemble(folded) => {
                    let n = self.state.iteration + 1;
                    reads = (
                        work_dir.join(format!("reads.{}_1.fq", n)),
                        work_dir.join(format!("reads.{}_2.fq", n)),
                    );
                    folded.write(&reads.0, &reads.1)?;
                    pool = folded;
                }
                ExtendDecision::Finish => break,
            }
        }

        let flags = self.orient(work_dir)?;
        self.rename(&recruited)?;
        self.state.stage = Stage::Done;
        self.state.assembled_ok = true;
        self.audit("[done] assembled_ok=true")?;
        Ok(flags)
    }

    fn assemble(
        &mut self,
        work_dir: &Path,
        reads1: &Path,
        reads2: &Path,
    ) -> Result<PathBuf, AssemblyError> {
        self.state.stage = Stage::Assembling;
        let n = self.state.iteration;
        self.audit(&format!("[assemble] iteration {}, k={}", n, self.state.kmer))?;

        let contigs_path = work_dir.join(format!("contigs.{}.fa", n));
        let log_path = work_dir.join(format!("assembler.{}.log", n));
        let outcome = run_assembler(
            self.assembler,
            reads1,
            reads2,
            self.state.kmer,
            &contigs_path,
            &log_path,
        );
        self.append_file(outcome.log_path())?;

        let checked = match outcome {
            AssemblerOutcome::Failure { status, .. } => {
                Err(AssemblyError::AssemblerFailure { status })
            }
            AssemblerOutcome::Success { contigs, log } => {
                check_assembler_log(&log).map(|_| contigs)
            }
        };
        let contigs = match checked {
            Ok(contigs) => contigs,
            Err(err) => {
                if contigs_path.exists() {
                    fs::remove_file(&contigs_path).map_err(|e| {
                        AssemblyError::Io(format!(
                            "Failed to remove {}: {}",
                            contigs_path.display(),
                            e
                        ))
                    })?;
                }
                return self.fail("assemble", err);
            }
        };

        let num_contigs = read_fasta(&contigs)
            .map_err(AssemblyError::Io)
            .or_else(|err| self.fail("assemble", err))?
            .len();
        self.audit(&format!("[assemble] ok: {} contigs", num_contigs))?;
        Ok(contigs)
    }

    fn extend(
        &mut self,
        work_dir: &Path,
        contigs_path: &Path,
        pool: &ReadPairPool,
    ) -> Result<ExtendDecision, AssemblyError> {
        let n = self.state.iteration;
        let bam_path = work_dir.join(format!("contigs.{}.bam", n));
        let evidence = match self.find_evidence(contigs_path, pool, &bam_path) {
            Ok(evidence) => evidence,
            Err(e) => {
                let line = format!("[extend] skipped: {}", self.describe(&e));
                self.audit(&line)?;
                return Ok(ExtendDecision::Finish);
            }
        };
        self.audit(&format!(
            "[extend] iteration {}: soft-clipped={}, unmapped-mates={}, scaffold-links={}",
            n,
            evidence.num_soft_clipped(),
            evidence.num_unmapped_mates(),
            evidence.num_scaffold_links()
        ))?;

        // Scaffold links alone never add reads to the pool
        let min_link_depth = self.params.evidence.min_link_depth;
        let new_templates: BTreeSet<String> = if evidence.has_evidence(min_link_depth) {
            evidence
                .extension_templates()
                .difference(&self.state.folded)
                .cloned()
                .collect()
        } else {
            BTreeSet::new()
        };
        if new_templates.is_empty() {
            self.audit("[extend] no new evidence")?;
            return Ok(ExtendDecision::Finish);
        }
        if n >= self.params.max_iterations {
            self.audit("[extend] iteration budget exhausted")?;
            return Ok(ExtendDecision::Finish);
        }

        let folded = pool.fold(&new_templates);
        self.audit(&format!(
            "[extend] folding {} read pairs into pool",
            folded.len() - pool.len()
        ))?;
        self.state.folded.extend(new_templates);
        Ok(ExtendDecision::Reassemble(folded))
    }

    fn find_evidence(
        &self,
        contigs_path: &Path,
        pool: &ReadPairPool,
        bam_path: &Path,
    ) -> utils::Result<ExtensionEvidence> {
        let contigs = read_fasta(contigs_path)?;
        self.aligner.map_pairs(pool, &contigs, bam_path)?;
        let contig_seqs: HashMap<String, Vec<u8>> = contigs
            .iter()
            .map(|rec| (rec.id().to_string(), rec.seq().to_vec()))
            .collect();
        parse_bam(&contig_seqs, bam_path, &self.params.evidence)
    }

    fn orient(&mut self, work_dir: &Path) -> Result<BTreeSet<OrientationFlag>, AssemblyError> {
        self.state.stage = Stage::Orienting;
        let draft = match &self.state.draft_contigs {
            Some(path) => path.clone(),
            None => {
                let err = AssemblyError::Io("No draft contigs to orient".to_string());
                return self.fail("orient", err);
            }
        };
        let oriented = work_dir.join("contigs.oriented.fa");
        let flags = fix_contig_orientation(
            self.aligner,
            &draft,
            &self.job.reference,
            &oriented,
            &self.params.orientation,
        )
        .or_else(|err| self.fail("orient", err))?;

        let line = if flags.is_empty() {
            "none".to_string()
        } else {
            flags.iter().join(",")
        };
        self.audit(&format!("[orient] flags: {}", line))?;
        self.state.draft_contigs = Some(oriented);
        Ok(flags)
    }

    fn rename(&mut self, pool: &ReadPairPool) -> Result<(), AssemblyError> {
        self.state.stage = Stage::Renaming;
        let renamed = match self.write_final_outputs(pool) {
            Ok(renamed) => renamed,
            Err(e) => {
                self.remove_outputs();
                return self.fail("rename", AssemblyError::Io(e));
            }
        };
        self.state.num_sequences = renamed;
        self.audit(&format!("[rename] {} sequences", renamed))
    }

    fn write_final_outputs(&self, pool: &ReadPairPool) -> utils::Result<usize> {
        let oriented = self
            .state
            .draft_contigs
            .as_ref()
            .ok_or_else(|| "No oriented contigs to rename".to_string())?;
        let contigs_path = self.job.contigs_path();
        let renamed = rename_scaffolds(oriented, &contigs_path, &self.job.name)?;
        let contigs = read_fasta(&contigs_path)?;
        self.aligner.map_pairs(pool, &contigs, &self.job.bam_path())?;
        Ok(renamed)
    }

    fn remove_outputs(&self) {
        for path in self.job.outputs() {
            if path.exists() {
                if let Err(e) = fs::remove_file(&path) {
                    log::warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
        }
    }

    /// Appends the failure line for `stage` and returns `err`.
    fn fail<T>(&mut self, stage: &str, err: AssemblyError) -> Result<T, AssemblyError> {
        self.state.stage = Stage::Failed;
        self.state.assembled_ok = false;
        let line = format!("[{}] failed: {}", stage, self.describe(&err));
        self.audit(&line)?;
        Err(err)
    }

    /// Error text for the audit log, with work directory paths cut down to file names.
    fn describe(&self, err: &dyn fmt::Display) -> String {
        let message = err.to_string();
        match &self.work_dir {
            Some(dir) => message.replace(&format!("{}{}", dir.display(), MAIN_SEPARATOR), ""),
            None => message,
        }
    }

    fn audit(&mut self, line: &str) -> Result<(), AssemblyError> {
        writeln!(self.log, "{}", line)
            .map_err(|e| AssemblyError::Io(format!("Failed to write assembly log: {}", e)))
    }

    fn append_file(&mut self, path: &Path) -> Result<(), AssemblyError> {
        let mut file = File::open(path)
            .map_err(|e| AssemblyError::Io(format!("{}: {}", path.display(), e)))?;
        io::copy(&mut file, &mut self.log)
            .map_err(|e| AssemblyError::Io(format!("Failed to copy {}: {}", path.display(), e)))?;
        Ok(())
    }
}
