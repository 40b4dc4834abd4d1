use super::Result;
use bio::io::{fasta, fastq};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufReader, Read as ioRead};
use std::path::Path;

pub fn open_reads_reader(path: &Path) -> Result<BufReader<Box<dyn ioRead>>> {
    fn is_gzipped(path: &Path) -> bool {
        let path_str = path.to_string_lossy().to_lowercase();
        path_str.ends_with(".gz") || path_str.ends_with(".gzip")
    }
    let file = File::open(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    if is_gzipped(path) {
        let gz_decoder = MultiGzDecoder::new(file);
        if gz_decoder.header().is_some() {
            Ok(BufReader::new(Box::new(gz_decoder)))
        } else {
            Err(format!("Invalid gzip header: {}", path.to_string_lossy()))
        }
    } else {
        Ok(BufReader::new(Box::new(file)))
    }
}

pub fn read_fastq(path: &Path) -> Result<Vec<fastq::Record>> {
    let reader = fastq::Reader::new(open_reads_reader(path)?);
    reader
        .records()
        .enumerate()
        .map(|(index, record)| {
            record.map_err(|e| format!("{}: record {}: {}", path.display(), index + 1, e))
        })
        .collect()
}

pub fn read_fasta(path: &Path) -> Result<Vec<fasta::Record>> {
    let reader = fasta::Reader::new(open_reads_reader(path)?);
    let mut records = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record =
            record.map_err(|e| format!("{}: record {}: {}", path.display(), index + 1, e))?;
        record
            .check()
            .map_err(|e| format!("{}: record {}: {}", path.display(), index + 1, e))?;
        records.push(record);
    }
    Ok(records)
}
