//! A small de Bruijn graph assembler for single-locus read pools.
//!
//! Canonical k-mers are counted over all reads, rare k-mers are discarded, and
//! every maximal non-branching path through the remaining k-mers becomes a contig.
use bio::alphabets::dna::revcomp;
use std::collections::{HashMap, HashSet};

const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

fn is_acgt(seq: &[u8]) -> bool {
    seq.iter().all(|b| BASES.contains(b))
}

fn canonical(kmer: &[u8]) -> Vec<u8> {
    let rc = revcomp(kmer);
    if rc.as_slice() < kmer {
        rc
    } else {
        kmer.to_vec()
    }
}

pub struct KmerGraph {
    k: usize,
    solid: HashSet<Vec<u8>>,
}

impl KmerGraph {
    pub fn from_reads<'a, I>(reads: I, k: usize, min_count: u32) -> KmerGraph
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut counts: HashMap<Vec<u8>, u32> = HashMap::new();
        if k > 0 {
            for read in reads {
                let read = read.to_ascii_uppercase();
                for window in read.windows(k).filter(|w| is_acgt(w)) {
                    *counts.entry(canonical(window)).or_insert(0) += 1;
                }
            }
        }

        let solid = counts
            .into_iter()
            .filter(|(_, count)| *count >= min_count)
            .map(|(kmer, _)| kmer)
            .collect();
        KmerGraph { k, solid }
    }

    pub fn num_kmers(&self) -> usize {
        self.solid.len()
    }

    fn contains(&self, kmer: &[u8]) -> bool {
        self.solid.contains(&canonical(kmer))
    }

    fn successors(&self, kmer: &[u8]) -> Vec<Vec<u8>> {
        BASES
            .iter()
            .map(|base| {
                let mut next = kmer[1..].to_vec();
                next.push(*base);
                next
            })
            .filter(|next| self.contains(next))
            .collect()
    }

    fn num_predecessors(&self, kmer: &[u8]) -> usize {
        BASES
            .iter()
            .filter(|base| {
                let mut prev = vec![**base];
                prev.extend_from_slice(&kmer[..self.k - 1]);
                self.contains(&prev)
            })
            .count()
    }

    /// Walks right from `start` while the path neither branches nor merges.
    fn extend(&self, start: &[u8], visited: &mut HashSet<Vec<u8>>) -> Vec<u8> {
        let mut extension = Vec::new();
        let mut current = start.to_vec();
        loop {
            let next = match self.successors(&current).as_slice() {
                [next] => next.clone(),
                _ => break,
            };
            if self.num_predecessors(&next) != 1 || !visited.insert(canonical(&next)) {
                break;
            }
            extension.push(next[self.k - 1]);
            current = next;
        }
        extension
    }

    /// Returns every unitig of at least `min_len` bases, seeded in lexicographic k-mer order.
    pub fn unitigs(&self, min_len: usize) -> Vec<Vec<u8>> {
        let mut seeds: Vec<&Vec<u8>> = self.solid.iter().collect();
        seeds.sort();

        let mut visited = HashSet::with_capacity(self.solid.len());
        let mut unitigs = Vec::new();
        for seed in seeds {
            if !visited.insert(seed.clone()) {
                continue;
            }
            let right = self.extend(seed, &mut visited);
            let left = self.extend(&revcomp(seed), &mut visited);

            let mut unitig = revcomp(&left);
            unitig.extend_from_slice(seed);
            unitig.extend_from_slice(&right);
            if unitig.len() >= min_len {
                unitigs.push(unitig);
            }
        }
        unitigs
    }
}
