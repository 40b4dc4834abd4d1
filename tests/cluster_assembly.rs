use bio::alphabets::dna::revcomp;
use clap::Parser;
use locasm::assembly::{
    align::PairwiseAligner, assembler::DeBruijnAssembler, AssemblyError, AssemblyParams,
    ClusterAssembly, ClusterJob, ClusterStatus,
};
use locasm::cli::{Cli, Command};
use rust_htslib::bam::{self, Read};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

const GENOME_120: &str = "TATGATCTCCCGTCGCTCATCTTCATCCAGCGAAGAGGACGTGCCGTAGTTGTGTGAACTACGAGCCCGGGGTCTACCGGTGACATTTTTAGAACCAGCCAACGCGACACCGCATGCCGA";
const GENOME_200: &str = "CAGATTTTCATATTATGCAGAAAATCTACTTCGCCTGATACGAGTCGGTTATCTTCGGATACTGTATAGTCCCACCTGGTGATCCTATGCTTGTGAGTACCCAGAAAATAGCGACGGACCGCGGTGTTAAGTGTCGAGCTACATCACTTCTCATGTAGCCAGAAGGCTGCAACTCATCGACTCTATGTAGTGACCGCGTC";

/// Writes read pairs tiled along `genome`: read 1 at `step * i`, read 2 on the
/// opposite strand starting `mate_offset` bases later.
fn write_pairs(
    dir: &Path,
    genome: &str,
    num_pairs: usize,
    step: usize,
    mate_offset: usize,
    read_len: usize,
) {
    let genome = genome.as_bytes();
    let qual = "I".repeat(read_len);
    let mut reads1 = String::new();
    let mut reads2 = String::new();
    for i in 0..num_pairs {
        let start = step * i;
        let r1 = String::from_utf8(genome[start..start + read_len].to_vec()).unwrap();
        let mate_start = start + mate_offset;
        let r2 = String::from_utf8(revcomp(&genome[mate_start..mate_start + read_len])).unwrap();
        reads1.push_str(&format!("@p{}/1\n{}\n+\n{}\n", i, r1, qual));
        reads2.push_str(&format!("@p{}/2\n{}\n+\n{}\n", i, r2, qual));
    }
    fs::write(dir.join("reads_1.fq"), reads1).unwrap();
    fs::write(dir.join("reads_2.fq"), reads2).unwrap();
}

fn write_reference(dir: &Path, genome: &str) {
    fs::write(dir.join("ref.fa"), format!(">chr1\n{}\n", genome)).unwrap();
}

fn job(dir: &Path, name: &str) -> ClusterJob {
    ClusterJob {
        name: name.to_string(),
        reads1: dir.join("reads_1.fq"),
        reads2: dir.join("reads_2.fq"),
        reference: dir.join("ref.fa"),
        output_prefix: dir.join(name).to_string_lossy().into_owned(),
    }
}

fn run(job: &ClusterJob, params: &AssemblyParams) -> (locasm::assembly::AssemblyReport, String) {
    let assembler = DeBruijnAssembler::new(params.assembler.clone());
    let aligner = PairwiseAligner::new(params.mapping);
    let mut log = Vec::new();
    let report = ClusterAssembly::new(job.clone(), params, &assembler, &aligner, &mut log).run();
    (report, String::from_utf8(log).unwrap())
}

/// Read name and first-in-pair flag of every record in a BAM.
fn bam_reads(path: &Path) -> Vec<(String, bool)> {
    let mut reader = bam::Reader::from_path(path).unwrap();
    reader
        .records()
        .map(|rec| {
            let rec = rec.unwrap();
            (
                String::from_utf8(rec.qname().to_vec()).unwrap(),
                rec.is_first_in_template(),
            )
        })
        .collect()
}

fn no_work_dirs_left(dir: &Path, name: &str) -> bool {
    fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap())
        .filter(|entry| entry.path().is_dir())
        .all(|entry| !entry.file_name().to_string_lossy().starts_with(&format!("{}.", name)))
}

#[test]
fn clean_pool_assembles_in_one_round() {
    let dir = tempfile::tempdir().unwrap();
    write_pairs(dir.path(), GENOME_120, 6, 10, 20, 50);
    write_reference(dir.path(), GENOME_120);
    let job = job(dir.path(), "locus1");
    let mut params = AssemblyParams::default();
    params.assembler.min_kmer_count = 1;

    let (report, log) = run(&job, &params);

    assert_eq!(
        log,
        "[cluster] locus1\n\
         [assemble] iteration 1, k=37\n\
         [dbg] reads: 12\n\
         [dbg] k-mer size: 37\n\
         [dbg] contigs: 1\n\
         [dbg] total length: 120\n\
         [dbg] assembly finished\n\
         [assemble] ok: 1 contigs\n\
         [extend] iteration 1: soft-clipped=0, unmapped-mates=0, scaffold-links=0\n\
         [extend] no new evidence\n\
         [orient] flags: none\n\
         [rename] 1 sequences\n\
         [done] assembled_ok=true\n"
    );
    assert!(report.assembled_ok());
    assert_eq!(report.status, ClusterStatus::Assembled);
    assert_eq!(report.iterations, 1);
    assert_eq!(
        fs::read_to_string(job.contigs_path()).unwrap(),
        format!(">locus1.1\n{}\n", GENOME_120)
    );
    assert!(job.bam_path().exists());
    assert!(no_work_dirs_left(dir.path(), "locus1"));
}

#[test]
fn assembler_failure_leaves_no_contigs() {
    let dir = tempfile::tempdir().unwrap();
    let read = "N".repeat(40);
    let qual = "#".repeat(40);
    fs::write(
        dir.path().join("reads_1.fq"),
        format!("@a/1\n{}\n+\n{}\n@b/1\n{}\n+\n{}\n", read, qual, read, qual),
    )
    .unwrap();
    fs::write(
        dir.path().join("reads_2.fq"),
        format!("@a/2\n{}\n+\n{}\n@b/2\n{}\n+\n{}\n", read, qual, read, qual),
    )
    .unwrap();
    write_reference(dir.path(), GENOME_120);
    let job = job(dir.path(), "locus2");

    let (report, log) = run(&job, &AssemblyParams::default());

    assert_eq!(
        log,
        "[cluster] locus2\n\
         [assemble] iteration 1, k=30\n\
         [dbg] reads: 4\n\
         [dbg] k-mer size: 30\n\
         [dbg] contigs: 0\n\
         [dbg] no contigs assembled\n\
         [assemble] failed: assembler exited with status 1\n"
    );
    assert!(!report.assembled_ok());
    assert_eq!(
        report.status,
        ClusterStatus::Failed(AssemblyError::AssemblerFailure { status: 1 })
    );
    assert_eq!(report.contigs, None);
    assert!(!job.contigs_path().exists());
    assert!(!job.bam_path().exists());
    assert!(no_work_dirs_left(dir.path(), "locus2"));
}

#[test]
fn clipped_reads_extend_contig_ends() {
    let dir = tempfile::tempdir().unwrap();
    write_pairs(dir.path(), GENOME_200, 13, 10, 30, 50);
    write_reference(dir.path(), GENOME_200);
    let job = job(dir.path(), "locus3");
    let params = AssemblyParams {
        kmer: 25,
        ..AssemblyParams::default()
    };

    let (report, log) = run(&job, &params);

    assert_eq!(
        log,
        "[cluster] locus3\n\
         [assemble] iteration 1, k=25\n\
         [dbg] reads: 26\n\
         [dbg] k-mer size: 25\n\
         [dbg] contigs: 1\n\
         [dbg] total length: 180\n\
         [dbg] assembly finished\n\
         [assemble] ok: 1 contigs\n\
         [extend] iteration 1: soft-clipped=2, unmapped-mates=0, scaffold-links=0\n\
         [extend] folding 2 read pairs into pool\n\
         [assemble] iteration 2, k=25\n\
         [dbg] reads: 30\n\
         [dbg] k-mer size: 25\n\
         [dbg] contigs: 1\n\
         [dbg] total length: 200\n\
         [dbg] assembly finished\n\
         [assemble] ok: 1 contigs\n\
         [extend] iteration 2: soft-clipped=0, unmapped-mates=0, scaffold-links=0\n\
         [extend] no new evidence\n\
         [orient] flags: none\n\
         [rename] 1 sequences\n\
         [done] assembled_ok=true\n"
    );
    assert_eq!(report.iterations, 2);
    assert_eq!(
        fs::read_to_string(job.contigs_path()).unwrap(),
        format!(">locus3.1\n{}\n", GENOME_200)
    );
}

#[test]
fn final_alignment_holds_each_input_read_once() {
    let dir = tempfile::tempdir().unwrap();
    write_pairs(dir.path(), GENOME_200, 13, 10, 30, 50);
    write_reference(dir.path(), GENOME_200);
    let job = job(dir.path(), "locus6");
    let params = AssemblyParams {
        kmer: 25,
        ..AssemblyParams::default()
    };

    let (report, log) = run(&job, &params);

    assert!(log.contains("[extend] folding 2 read pairs into pool\n"));
    assert_eq!(report.iterations, 2);
    let reads = bam_reads(&job.bam_path());
    assert_eq!(reads.len(), 26);
    let distinct: BTreeSet<_> = reads.into_iter().collect();
    assert_eq!(distinct.len(), 26);
    assert!(distinct.contains(&("p0".to_string(), true)));
    assert!(distinct.contains(&("p12".to_string(), false)));
}

#[test]
fn iteration_budget_limits_reassembly() {
    let dir = tempfile::tempdir().unwrap();
    write_pairs(dir.path(), GENOME_200, 13, 10, 30, 50);
    write_reference(dir.path(), GENOME_200);
    let job = job(dir.path(), "locus4");
    let params = AssemblyParams {
        kmer: 25,
        max_iterations: 1,
        keep_work_dir: true,
        ..AssemblyParams::default()
    };

    let (report, log) = run(&job, &params);

    assert!(log.contains(
        "[extend] iteration 1: soft-clipped=2, unmapped-mates=0, scaffold-links=0\n\
         [extend] iteration budget exhausted\n\
         [orient] flags: none\n"
    ));
    assert_eq!(report.iterations, 1);
    assert_eq!(
        fs::read_to_string(job.contigs_path()).unwrap(),
        format!(">locus4.1\n{}\n", &GENOME_200[10..190])
    );

    let work_dir = report.work_dir.unwrap();
    for name in [
        "contigs.1.fa",
        "assembler.1.log",
        "contigs.1.bam",
        "contigs.1.bam.soft_clipped",
        "contigs.1.bam.unmapped_mates",
        "contigs.1.bam.scaff",
    ] {
        assert!(work_dir.join(name).exists(), "{} is missing", name);
    }
    let clipped = fs::read_to_string(work_dir.join("contigs.1.bam.soft_clipped")).unwrap();
    assert_eq!(clipped, "contig.1\tleft\tp0\t10\ncontig.1\tright\tp12\t10\n");
}

#[test]
fn assemble_command_writes_outputs() {
    let dir = tempfile::tempdir().unwrap();
    write_pairs(dir.path(), GENOME_120, 6, 10, 20, 50);
    write_reference(dir.path(), GENOME_120);
    let path = |name: &str| dir.path().join(name).to_string_lossy().into_owned();

    let cli = Cli::try_parse_from([
        "locasm".to_string(),
        "assemble".to_string(),
        "--reads1".to_string(),
        path("reads_1.fq"),
        "--reads2".to_string(),
        path("reads_2.fq"),
        "--reference".to_string(),
        path("ref.fa"),
        "--name".to_string(),
        "locus5".to_string(),
        "--output-prefix".to_string(),
        path("locus5"),
        "--min-kmer-count".to_string(),
        "1".to_string(),
    ])
    .unwrap();
    let Command::Assemble(args) = cli.command;
    locasm::commands::assemble::assemble(args).unwrap();

    let log = fs::read_to_string(dir.path().join("locus5.log")).unwrap();
    assert!(log.starts_with("[cluster] locus5\n"));
    assert!(log.ends_with("[done] assembled_ok=true\n"));
    assert_eq!(
        fs::read_to_string(dir.path().join("locus5.fa")).unwrap(),
        format!(">locus5.1\n{}\n", GENOME_120)
    );
    assert!(dir.path().join("locus5.bam").exists());
    assert!(dir.path().join("locus5.bam.bai").exists());
}
