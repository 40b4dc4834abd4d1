use crate::assembly::{
    align::PairwiseAligner,
    assembler::DeBruijnAssembler,
    params::{
        AssemblerParams, AssemblyParams, EvidenceParams, KmerParams, MappingParams,
        OrientationParams,
    },
    ClusterAssembly, ClusterJob, ClusterStatus,
};
use crate::cli::AssembleArgs;
use crate::utils::{create_writer, Result};
use itertools::Itertools;
use std::fs::File;
use std::io::{BufWriter, Write};

fn params_from_args(args: &AssembleArgs) -> AssemblyParams {
    AssemblyParams {
        kmer: args.kmer,
        max_iterations: args.max_iterations,
        keep_work_dir: args.keep_work_dir,
        kmer_params: KmerParams {
            read_length_fraction: args.kmer_fraction,
            ..KmerParams::default()
        },
        assembler: AssemblerParams {
            min_kmer_count: args.min_kmer_count,
            min_contig_len: args.min_contig_len,
        },
        mapping: MappingParams {
            min_score_frac: args.min_score_frac,
            ..MappingParams::default()
        },
        evidence: EvidenceParams {
            boundary_window: args.boundary_window,
            min_clip: args.min_clip,
            min_link_depth: args.min_link_depth,
        },
        orientation: OrientationParams {
            min_hit_score: args.min_hit_score,
        },
    }
}

pub fn assemble(args: AssembleArgs) -> Result<()> {
    let params = params_from_args(&args);
    let job = ClusterJob {
        name: args.name.clone(),
        reads1: args.reads1_path.clone(),
        reads2: args.reads2_path.clone(),
        reference: args.reference_path.clone(),
        output_prefix: args.output_prefix.clone(),
    };

    let mut log_writer = create_writer(&args.output_prefix, "log", |path| {
        File::create(path)
            .map(BufWriter::new)
            .map_err(|e| format!("Failed to create {}: {}", path.display(), e))
    })?;

    let assembler = DeBruijnAssembler::new(params.assembler.clone());
    let aligner = PairwiseAligner::new(params.mapping);
    log::debug!("{}: {:?}", job.name, params);
    let report = ClusterAssembly::new(job, &params, &assembler, &aligner, &mut log_writer).run();
    log_writer
        .flush()
        .map_err(|e| format!("Failed to write assembly log: {}", e))?;

    match report.status {
        ClusterStatus::Assembled => {
            log::info!(
                "{}: {} sequences after {} iterations",
                report.name,
                report.num_sequences,
                report.iterations
            );
            Ok(())
        }
        ClusterStatus::AssembledLowConfidence(flags) => {
            log::warn!(
                "{}: {} sequences assembled with flags {}",
                report.name,
                report.num_sequences,
                flags.iter().join(",")
            );
            Ok(())
        }
        ClusterStatus::Failed(err) if err.is_assembler_failure() => Err(format!(
            "Cluster {} produced no assembly: {}",
            report.name, err
        )),
        ClusterStatus::Failed(err) => Err(format!("Cluster {} failed: {}", report.name, err)),
    }
}
