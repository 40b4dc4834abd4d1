use super::error::AssemblyError;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Line the embedded assembler writes once it has produced its contigs.
pub const ASSEMBLY_FINISHED_MARKER: &str = "[dbg] assembly finished";

/// Accepts an assembler log only if it contains the completion marker.
///
/// The exit status is not consulted, so a log cut short after a nominally
/// successful run is still rejected.
pub fn check_assembler_log(log_path: &Path) -> Result<(), AssemblyError> {
    let file = File::open(log_path)
        .map_err(|e| AssemblyError::Io(format!("{}: {}", log_path.display(), e)))?;
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| AssemblyError::Io(format!("{}: {}", log_path.display(), e)))?;
        if line.trim() == ASSEMBLY_FINISHED_MARKER {
            return Ok(());
        }
    }
    log::warn!("{}: completion marker not found", log_path.display());
    Err(AssemblyError::MalformedLog(log_path.to_path_buf()))
}
