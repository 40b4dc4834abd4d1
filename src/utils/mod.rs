mod io_utils;
mod readers;
mod util;

pub use io_utils::{create_writer, output_path, write_fasta_atomically};
pub use readers::{open_reads_reader, read_fasta, read_fastq};
pub use util::{handle_error_and_exit, template_name, Result};
