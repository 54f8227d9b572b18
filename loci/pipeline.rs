// ========================================================================================
//
//                        Per-mode orchestration of a locus scan
//
// ========================================================================================
//
// Each entry point resolves its output paths, opens the table (failing before any
// processing if it is missing), streams every line through the parser and the
// segmenter in a single pass, and writes the reports once the scan is complete.

use crate::config::{ConfigError, SegmentConfig};
use crate::output::{self, OutputError};
use crate::parse::{ParseError, RowParser, TableLayout, is_header, parse_header};
use crate::segment::{
    AcrossSamplePolicy, ScanSummary, Segmentation, Segmenter, WithinSamplePolicy,
};
use crate::source::{SourceError, TextSource, open_text_source};
use crate::types::{LocusRecord, SampleTally};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::info;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Lines between progress bar refreshes.
const PROGRESS_INTERVAL_LINES: usize = 16_384;

#[derive(Debug, Error)]
pub enum LociError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Output(#[from] OutputError),
}

#[derive(Debug)]
pub struct WithinSampleReport {
    pub loci_path: PathBuf,
    pub records: Vec<LocusRecord>,
    pub summary: ScanSummary,
}

#[derive(Debug)]
pub struct AcrossSampleReport {
    pub loci_path: PathBuf,
    pub tally_path: PathBuf,
    pub records: Vec<LocusRecord>,
    pub tally: SampleTally,
    pub summary: ScanSummary,
}

/// Segments a single-individual table and writes `<stem>_gatkS3.csv`.
pub fn run_within_sample(
    input: &Path,
    output_dir: Option<&Path>,
    config: &SegmentConfig,
) -> Result<WithinSampleReport, LociError> {
    config.validate_within_sample()?;
    let loci_path = output::output_path(input, output_dir, output::WITHIN_SAMPLE_SUFFIX)?;
    let mut source = open_text_source(input)?;

    info!(
        "Segmenting {} (within sample, min depth {}, mean locus length {})",
        input.display(),
        config.min_depth,
        config.mean_locus_length
    );
    let segmentation = segment_within_sample(source.as_mut(), config)?;
    log_summary(&segmentation.summary);

    output::write_within_sample(&loci_path, &segmentation.records)?;
    info!(
        "Wrote {} loci to {}",
        segmentation.records.len(),
        loci_path.display()
    );

    Ok(WithinSampleReport {
        loci_path,
        records: segmentation.records,
        summary: segmentation.summary,
    })
}

/// Segments a multi-sample table and writes the per-locus and per-sample reports.
pub fn run_across_sample(
    input: &Path,
    output_dir: Option<&Path>,
    config: &SegmentConfig,
) -> Result<AcrossSampleReport, LociError> {
    config.validate_across_sample()?;
    let loci_path = output::output_path(input, output_dir, output::ACROSS_SAMPLE_LOCI_SUFFIX)?;
    let tally_path = output::output_path(input, output_dir, output::ACROSS_SAMPLE_TALLY_SUFFIX)?;
    let mut source = open_text_source(input)?;

    info!(
        "Segmenting {} (across samples, min depth {}, min samples {}, mean locus length {})",
        input.display(),
        config.min_depth,
        config.min_samples,
        config.mean_locus_length
    );
    let segmentation = segment_across_sample(source.as_mut(), config)?;
    log_summary(&segmentation.summary);

    let tally = segmentation.policy.into_tally();
    output::write_across_sample(
        &loci_path,
        &segmentation.records,
        segmentation.summary.qualifying_rows,
    )?;
    output::write_sample_tally(&tally_path, &tally)?;
    info!(
        "Wrote {} loci to {} and {} sample counts to {}",
        segmentation.records.len(),
        loci_path.display(),
        tally.len(),
        tally_path.display()
    );

    Ok(AcrossSampleReport {
        loci_path,
        tally_path,
        records: segmentation.records,
        tally,
        summary: segmentation.summary,
    })
}

/// Streams a within-sample table through the segmenter. Header lines are optional
/// and carry no information for this layout.
pub fn segment_within_sample(
    source: &mut dyn TextSource,
    config: &SegmentConfig,
) -> Result<Segmentation<WithinSamplePolicy>, LociError> {
    let parser = RowParser::within_sample();
    let mut segmenter = Segmenter::new(WithinSamplePolicy::new(config), config);

    scan_lines(source, |line, line_number| {
        if is_header(line) {
            parse_header(line, line_number, TableLayout::WithinSample)?;
            return Ok(());
        }
        let row = parser.parse(line, line_number)?;
        segmenter.push(&row);
        Ok(())
    })?;

    Ok(segmenter.finish())
}

/// Streams an across-sample table through the segmenter. The header must come
/// before any data row because it fixes the column count and the sample names.
pub fn segment_across_sample(
    source: &mut dyn TextSource,
    config: &SegmentConfig,
) -> Result<Segmentation<AcrossSamplePolicy>, LociError> {
    let mut state: Option<(RowParser, Segmenter<AcrossSamplePolicy>)> = None;

    scan_lines(source, |line, line_number| {
        if is_header(line) {
            if state.is_some() {
                return Err(ParseError::MalformedHeader {
                    line: line_number,
                    message: "header line repeated inside the table".into(),
                }
                .into());
            }
            let header = parse_header(line, line_number, TableLayout::AcrossSample)?;
            info!("Found {} samples in header", header.sample_names.len());
            let policy = AcrossSamplePolicy::new(config, &header.sample_names);
            state = Some((RowParser::across_sample(&header), Segmenter::new(policy, config)));
            return Ok(());
        }

        let Some((parser, segmenter)) = state.as_mut() else {
            return Err(ParseError::MissingHeader { line: line_number }.into());
        };
        let row = parser.parse(line, line_number)?;
        segmenter.push(&row);
        Ok(())
    })?;

    let (_, segmenter) = state.ok_or(ParseError::NoHeader)?;
    Ok(segmenter.finish())
}

/// Drives `on_line` over every line with its 1-based line number.
fn scan_lines<F>(source: &mut dyn TextSource, mut on_line: F) -> Result<(), LociError>
where
    F: FnMut(&str, usize) -> Result<(), LociError>,
{
    let pb = create_progress_bar(source.len(), "scanning variant table");
    let mut line_number = 0usize;

    while let Some(bytes) = source.next_line()? {
        line_number += 1;
        let line =
            std::str::from_utf8(bytes).map_err(|_| ParseError::NotUtf8 { line: line_number })?;
        on_line(line, line_number)?;
        if line_number % PROGRESS_INTERVAL_LINES == 0 {
            pb.set_position(source.consumed());
        }
    }

    pb.finish_and_clear();
    Ok(())
}

fn create_progress_bar(len: Option<u64>, message: &str) -> ProgressBar {
    let draw_target = if std::io::stderr().is_terminal() {
        ProgressDrawTarget::stderr_with_hz(20)
    } else {
        ProgressDrawTarget::hidden()
    };

    let pb = ProgressBar::with_draw_target(len, draw_target);
    if let Ok(style) = ProgressStyle::with_template(
        "> [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta}) {msg}",
    ) {
        pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
    }
    pb.set_message(message.to_string());
    pb
}

fn log_summary(summary: &ScanSummary) {
    info!(
        "Scanned {} rows ({} qualifying): {} loci emitted, {} discarded",
        summary.rows, summary.qualifying_rows, summary.emitted, summary.discarded
    );
    if summary.dropped_final {
        info!("The locus open at the end of the table was not flushed (see --flush-final)");
    }
}
