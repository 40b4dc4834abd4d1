//! Per-cluster local assembly: k-mer selection, de novo assembly, iterative
//! contig extension, orientation against the reference and final naming.
pub mod align;
pub mod assembler;
pub mod dbg;
pub mod error;
pub mod extend;
pub mod kmer;
pub mod log_check;
pub mod orchestrator;
pub mod orient;
pub mod params;
pub mod reads;
pub mod rename;

pub use error::AssemblyError;
pub use orchestrator::{AssemblyReport, ClusterAssembly, ClusterJob, ClusterStatus, Stage};
pub use params::AssemblyParams;
