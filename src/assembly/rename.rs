use crate::utils::{read_fasta, write_fasta_atomically, Result};
use bio::io::fasta;
use std::path::Path;

/// Renames the records of `input_path` to `<prefix>.1`, `<prefix>.2`, ... in file order.
/// Returns the number of records written.
pub fn rename_scaffolds(input_path: &Path, output_path: &Path, prefix: &str) -> Result<usize> {
    let renamed: Vec<fasta::Record> = read_fasta(input_path)?
        .iter()
        .enumerate()
        .map(|(index, rec)| {
            fasta::Record::with_attrs(&format!("{}.{}", prefix, index + 1), None, rec.seq())
        })
        .collect();
    write_fasta_atomically(output_path, &renamed)?;
    Ok(renamed.len())
}
