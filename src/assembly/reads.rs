//! The pool of read pairs recruited to one cluster.
use crate::utils::{read_fastq, template_name, Result};
use bio::io::fastq;
use std::collections::BTreeSet;
use std::fs::File;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct ReadPair {
    /// Read id shared by both mates, without the `/1` or `/2` suffix.
    pub template: String,
    pub read1: fastq::Record,
    pub read2: fastq::Record,
}

#[derive(Debug, Clone, Default)]
pub struct ReadPairPool {
    pairs: Vec<ReadPair>,
}

impl ReadPairPool {
    pub fn new(pairs: Vec<ReadPair>) -> Self {
        Self { pairs }
    }

    /// Loads a pool from two FASTQ files whose records are paired by position.
    pub fn from_paths(reads1: &Path, reads2: &Path) -> Result<Self> {
        let records1 = read_fastq(reads1)?;
        let records2 = read_fastq(reads2)?;
        if records1.len() != records2.len() {
            return Err(format!(
                "Read files have different numbers of records: {} has {}, {} has {}",
                reads1.display(),
                records1.len(),
                reads2.display(),
                records2.len()
            ));
        }

        let pairs = records1
            .into_iter()
            .zip(records2)
            .map(|(read1, read2)| ReadPair {
                template: template_name(read1.id()).to_string(),
                read1,
                read2,
            })
            .collect();
        Ok(Self { pairs })
    }

    pub fn pairs(&self) -> &[ReadPair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Returns a new pool with one extra copy of every pair whose template is in `templates`.
    pub fn fold(&self, templates: &BTreeSet<String>) -> ReadPairPool {
        let extra = self
            .pairs
            .iter()
            .filter(|pair| templates.contains(&pair.template))
            .cloned();
        let pairs = self.pairs.iter().cloned().chain(extra).collect();
        ReadPairPool { pairs }
    }

    pub fn write(&self, reads1: &Path, reads2: &Path) -> Result<()> {
        let open = |path: &Path| {
            File::create(path)
                .map(fastq::Writer::new)
                .map_err(|e| format!("Failed to create {}: {}", path.display(), e))
        };
        let mut writer1 = open(reads1)?;
        let mut writer2 = open(reads2)?;
        for pair in &self.pairs {
            writer1
                .write_record(&pair.read1)
                .map_err(|e| format!("Failed to write {}: {}", reads1.display(), e))?;
            writer2
                .write_record(&pair.read2)
                .map_err(|e| format!("Failed to write {}: {}", reads2.display(), e))?;
        }
        writer1
            .flush()
            .map_err(|e| format!("Failed to write {}: {}", reads1.display(), e))?;
        writer2
            .flush()
            .map_err(|e| format!("Failed to write {}: {}", reads2.display(), e))?;
        Ok(())
    }
}
