use crate::utils::Result;
use clap::{ArgAction, ArgGroup, Parser, Subcommand};
use env_logger::fmt::Color;
use log::{Level, LevelFilter};
use once_cell::sync::Lazy;
use std::{
    io::Write,
    path::{Path, PathBuf},
};

pub static FULL_VERSION: Lazy<String> = Lazy::new(|| {
    format!(
        "{}-{}",
        env!("CARGO_PKG_VERSION"),
        env!("VERGEN_GIT_DESCRIBE")
    )
});

#[derive(Parser)]
#[command(name="locasm",
          version=&**FULL_VERSION,
          about="Local assembly of paired reads recruited to a single locus",
          long_about = None,
          disable_help_subcommand = true,
          help_template = "{name} {version}\n{about-section}\n{usage-heading}\n    {usage}\n\n{all-args}{after-help}",
          )]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = ArgAction::Count, help = "Specify multiple times to increase verbosity level (e.g., -vv for more verbosity)")]
    pub verbosity: u8,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Assemble and orient contigs for one cluster")]
    Assemble(AssembleArgs),
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("assemble")))]
#[command(arg_required_else_help(true))]
pub struct AssembleArgs {
    #[clap(required = true)]
    #[clap(long = "reads1")]
    #[clap(help = "FASTQ file with the first read of each pair")]
    #[clap(value_name = "FASTQ")]
    #[arg(value_parser = check_file_exists)]
    pub reads1_path: PathBuf,

    #[clap(required = true)]
    #[clap(long = "reads2")]
    #[clap(help = "FASTQ file with the second read of each pair")]
    #[clap(value_name = "FASTQ")]
    #[arg(value_parser = check_file_exists)]
    pub reads2_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'r')]
    #[clap(long = "reference")]
    #[clap(help = "Reference FASTA used to orient contigs")]
    #[clap(value_name = "FASTA")]
    #[arg(value_parser = check_file_exists)]
    pub reference_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'n')]
    #[clap(long = "name")]
    #[clap(help = "Cluster name, used as the prefix of final sequence names")]
    #[clap(value_name = "NAME")]
    #[arg(value_parser = check_cluster_name)]
    pub name: String,

    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output-prefix")]
    #[clap(help = "Prefix for output files")]
    #[clap(value_name = "OUTPUT_PREFIX")]
    #[arg(value_parser = check_prefix_path)]
    pub output_prefix: String,

    #[clap(short = 'k')]
    #[clap(long = "kmer")]
    #[clap(value_name = "KMER")]
    #[clap(help = "K-mer size for assembly, 0 to pick one from read lengths")]
    #[clap(default_value = "0")]
    pub kmer: usize,

    #[clap(long = "max-iterations")]
    #[clap(value_name = "ITERATIONS")]
    #[clap(help = "Maximum number of assembly rounds")]
    #[clap(default_value = "3")]
    #[arg(value_parser = at_least_one)]
    pub max_iterations: usize,

    #[clap(long = "keep-work-dir")]
    #[clap(help = "Keep intermediate files")]
    pub keep_work_dir: bool,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "kmer-fraction")]
    #[clap(value_name = "FRAC")]
    #[clap(help = "Fraction of the mean read length used as automatic k-mer size")]
    #[clap(default_value = "0.75")]
    #[arg(value_parser = ensure_unit_float)]
    pub kmer_fraction: f64,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "min-kmer-count")]
    #[clap(value_name = "COUNT")]
    #[clap(help = "Minimum number of occurrences of a k-mer used in assembly")]
    #[clap(default_value = "2")]
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    pub min_kmer_count: u32,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "min-contig-len")]
    #[clap(value_name = "LENGTH")]
    #[clap(help = "Minimum length of reported contigs")]
    #[clap(default_value = "50")]
    pub min_contig_len: usize,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "min-read-score")]
    #[clap(value_name = "FRAC")]
    #[clap(help = "Minimum alignment score, as a fraction of read length, for a read to be placed")]
    #[clap(default_value = "0.5")]
    #[arg(value_parser = ensure_unit_float)]
    pub min_score_frac: f64,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "boundary-window")]
    #[clap(value_name = "LENGTH")]
    #[clap(help = "Distance from a contig end within which reads count as extension evidence")]
    #[clap(default_value = "1000")]
    pub boundary_window: u64,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "min-clip")]
    #[clap(value_name = "LENGTH")]
    #[clap(help = "Minimum soft clip length counted as extension evidence")]
    #[clap(default_value = "10")]
    pub min_clip: u32,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "min-link-depth")]
    #[clap(value_name = "PAIRS")]
    #[clap(help = "Minimum number of read pairs supporting a scaffold link")]
    #[clap(default_value = "10")]
    pub min_link_depth: usize,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "min-hit-score")]
    #[clap(value_name = "SCORE")]
    #[clap(help = "Minimum alignment score of a contig against the reference")]
    #[clap(default_value = "20")]
    pub min_hit_score: i32,
}

pub fn init_verbose(args: &Cli) {
    let filter_level: LevelFilter = match args.verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            let level = record.level();
            let mut style = buf.style();
            match record.level() {
                Level::Error => style.set_color(Color::Red),
                Level::Warn => style.set_color(Color::Yellow),
                Level::Info => style.set_color(Color::Green),
                Level::Debug => style.set_color(Color::Blue),
                Level::Trace => style.set_color(Color::Cyan),
            };

            writeln!(
                buf,
                "{} [{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                style.value(level),
                record.args()
            )
        })
        .filter_level(filter_level)
        .init();
}

fn check_prefix_path(s: &str) -> Result<String> {
    let path = Path::new(s);
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            return Err(format!("Path does not exist: {}", parent_dir.display()));
        }
    }
    Ok(s.to_string())
}

fn check_file_exists(s: &str) -> Result<PathBuf> {
    let path = Path::new(s);
    if !path.exists() {
        Err(format!("File does not exist: {}", path.display()))
    } else {
        Ok(path.to_path_buf())
    }
}

fn check_cluster_name(s: &str) -> Result<String> {
    if s.trim().is_empty() {
        Err("Cluster name cannot be an empty string".to_string())
    } else if s.contains(char::is_whitespace) {
        Err(format!("Cluster name cannot contain whitespace: `{}`", s))
    } else {
        Ok(s.to_string())
    }
}

fn at_least_one(s: &str) -> Result<usize> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("`{}` is not a valid count", s))?;
    if value >= 1 {
        Ok(value)
    } else {
        Err("Value must be at least 1".into())
    }
}

fn ensure_unit_float(s: &str) -> Result<f64> {
    let value = s
        .parse::<f64>()
        .map_err(|e| format!("Could not parse float: {}", e))?;
    if !(0.0..=1.0).contains(&value) {
        Err(format!(
            "The value must be between 0.0 and 1.0, got: {}",
            value
        ))
    } else {
        Ok(value)
    }
}
