// ========================================================================================
//
//                          Locus & per-sample report writers
//
// ========================================================================================

use crate::types::{LocusRecord, SampleTally};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const WITHIN_SAMPLE_SUFFIX: &str = "_gatkS3.csv";
pub const ACROSS_SAMPLE_LOCI_SUFFIX: &str = "_gatkS7_samples_snps_per_locus.csv";
pub const ACROSS_SAMPLE_TALLY_SUFFIX: &str = "_gatkS7_loci_per_sample.csv";

const WITHIN_SAMPLE_HEADER: [&str; 6] = ["Locus", "Chromosome", "Depth", "Length", "Start", "End"];
const ACROSS_SAMPLE_HEADER: [&str; 7] = [
    "Locus",
    "Chromosome",
    "numSamples",
    "numSNPs",
    "Length",
    "Start",
    "End",
];

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("I/O error writing '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error writing '{path}': {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("Could not derive an output name from input path '{0}'")]
    NoStem(String),
}

/// Everything in the input file name before its first `.`.
pub fn output_stem(input: &Path) -> Result<String, OutputError> {
    let stem = input
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('.').next())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| OutputError::NoStem(input.display().to_string()))?;
    Ok(stem.to_string())
}

/// Places `<stem><suffix>` in `output_dir`, or next to the input when no directory
/// is given.
pub fn output_path(
    input: &Path,
    output_dir: Option<&Path>,
    suffix: &str,
) -> Result<PathBuf, OutputError> {
    let file_name = format!("{}{suffix}", output_stem(input)?);
    let dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    Ok(dir.join(file_name))
}

#[derive(Serialize)]
struct WithinSampleRow<'a> {
    locus: u64,
    chromosome: &'a str,
    depth: u32,
    length: u64,
    start: u64,
    end: u64,
}

#[derive(Serialize)]
struct AcrossSampleRow<'a> {
    locus: u64,
    chromosome: &'a str,
    samples: u32,
    snps: u32,
    length: u64,
    start: u64,
    end: u64,
}

/// Writes `Locus,Chromosome,Depth,Length,Start,End`, one line per locus.
pub fn write_within_sample(path: &Path, records: &[LocusRecord]) -> Result<(), OutputError> {
    let mut writer = csv_writer(path, b',')?;
    writer
        .write_record(WITHIN_SAMPLE_HEADER)
        .map_err(|source| csv_error(path, source))?;
    for record in records {
        writer
            .serialize(WithinSampleRow {
                locus: record.id,
                chromosome: &record.chromosome,
                depth: record.statistic,
                length: record.length,
                start: record.start,
                end: record.end,
            })
            .map_err(|source| csv_error(path, source))?;
    }
    finish(path, writer).map(drop)
}

/// Writes the per-locus sample/SNP table followed by a `Total SNPs:<N>` line.
pub fn write_across_sample(
    path: &Path,
    records: &[LocusRecord],
    total_snps: u64,
) -> Result<(), OutputError> {
    let mut writer = csv_writer(path, b',')?;
    writer
        .write_record(ACROSS_SAMPLE_HEADER)
        .map_err(|source| csv_error(path, source))?;
    for record in records {
        writer
            .serialize(AcrossSampleRow {
                locus: record.id,
                chromosome: &record.chromosome,
                samples: record.statistic,
                snps: record.snp_count,
                length: record.length,
                start: record.start,
                end: record.end,
            })
            .map_err(|source| csv_error(path, source))?;
    }

    let mut inner = finish(path, writer)?;
    writeln!(inner, "Total SNPs:{total_snps}").map_err(|source| io_error(path, source))?;
    inner.flush().map_err(|source| io_error(path, source))
}

/// Writes `sample<TAB>count` lines in header order.
pub fn write_sample_tally(path: &Path, tally: &SampleTally) -> Result<(), OutputError> {
    let mut writer = csv_writer(path, b'\t')?;
    for (sample, count) in tally.iter() {
        writer
            .serialize((sample, count))
            .map_err(|source| csv_error(path, source))?;
    }
    finish(path, writer).map(drop)
}

fn csv_writer(path: &Path, delimiter: u8) -> Result<csv::Writer<BufWriter<File>>, OutputError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
        }
    }
    let file = File::create(path).map_err(|source| io_error(path, source))?;
    Ok(csv::WriterBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .from_writer(BufWriter::new(file)))
}

fn finish(
    path: &Path,
    writer: csv::Writer<BufWriter<File>>,
) -> Result<BufWriter<File>, OutputError> {
    let mut inner = writer
        .into_inner()
        .map_err(|err| io_error(path, err.into_error()))?;
    inner.flush().map_err(|source| io_error(path, source))?;
    Ok(inner)
}

fn io_error(path: &Path, source: std::io::Error) -> OutputError {
    OutputError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn csv_error(path: &Path, source: csv::Error) -> OutputError {
    OutputError::Csv {
        path: path.display().to_string(),
        source,
    }
}
