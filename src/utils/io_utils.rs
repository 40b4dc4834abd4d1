use crate::utils::Result;
use bio::io::fasta;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub fn output_path(output_prefix: &str, output_suffix: &str) -> PathBuf {
    PathBuf::from(format!("{}.{}", output_prefix, output_suffix))
}

pub fn create_writer<T, F>(output_prefix: &str, output_suffix: &str, f: F) -> Result<T>
where
    F: FnOnce(&Path) -> Result<T>,
{
    let output_path = output_path(output_prefix, output_suffix);
    f(&output_path)
}

/// Writes FASTA records to `path` so that the file either appears complete or not at all.
///
/// Records go to a named temporary file in the destination directory, which is
/// renamed over `path` once every record has been flushed.
pub fn write_fasta_atomically(path: &Path, records: &[fasta::Record]) -> Result<()> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(parent)
        .map_err(|e| format!("Failed to create temporary file in {}: {}", parent.display(), e))?;
    {
        let mut writer = fasta::Writer::new(tmp.as_file_mut());
        for record in records {
            writer
                .write_record(record)
                .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
        }
        writer
            .flush()
            .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
    }
    tmp.persist(path)
        .map_err(|e| format!("Failed to persist {}: {}", path.display(), e))?;
    Ok(())
}
