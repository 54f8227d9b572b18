#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use log::info;
use radloci::{LociError, SegmentConfig, run_across_sample, run_within_sample};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(
    name = "radloci",
    version,
    about = "RAD locus statistics from GATK variant tables",
    long_about = "Groups variant sites from a GATK VariantsToTable export into RAD loci \
                 and reports per-locus depth or sample support, plus per-sample locus \
                 counts for multi-sample tables."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Loci from a single individual's table (CHROM POS REF DP)
    #[command(about = "Segment a within-sample table (outputs: <stem>_gatkS3.csv)")]
    Within(CommonArgs),

    /// Loci supported across samples of a multi-sample table
    #[command(
        about = "Segment an across-sample table (outputs: <stem>_gatkS7_samples_snps_per_locus.csv, <stem>_gatkS7_loci_per_sample.csv)"
    )]
    Across(AcrossArgs),
}

#[derive(Args)]
struct CommonArgs {
    /// Variant table exported by GATK (plain text or .gz)
    #[arg(short = 'i', long = "input", value_name = "PATH")]
    input: PathBuf,

    /// Minimum number of reads in a RAD locus [default: 6]
    #[arg(short = 'd', long = "min-locus-depth", value_name = "N")]
    min_locus_depth: Option<u32>,

    /// Mean RAD locus length in basepairs [default: 270]
    #[arg(short = 'l', long = "mean-locus-length", value_name = "BP")]
    mean_locus_length: Option<u64>,

    /// TOML file with segmentation parameters; flags take precedence
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory for the reports (defaults to the input's directory)
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Also report the locus still open when the table ends
    #[arg(long)]
    flush_final: bool,
}

#[derive(Args)]
struct AcrossArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Minimum number of samples in a locus [default: 4]
    #[arg(short = 's', long = "min-samples", value_name = "N")]
    min_samples: Option<u32>,
}

impl CommonArgs {
    /// Defaults, then the config file, then explicit flags.
    fn resolve_config(&self) -> Result<SegmentConfig, LociError> {
        let mut config = match &self.config {
            Some(path) => SegmentConfig::load(path)?,
            None => SegmentConfig::default(),
        };
        if let Some(min_depth) = self.min_locus_depth {
            config.min_depth = min_depth;
        }
        if let Some(length) = self.mean_locus_length {
            config.mean_locus_length = length;
        }
        if self.flush_final {
            config.flush_final = true;
        }
        Ok(config)
    }
}

fn run_within(args: CommonArgs) -> Result<(), LociError> {
    let config = args.resolve_config()?;
    let report = run_within_sample(&args.input, args.output_dir.as_deref(), &config)?;
    info!("Done: {}", report.loci_path.display());
    Ok(())
}

fn run_across(args: AcrossArgs) -> Result<(), LociError> {
    let mut config = args.common.resolve_config()?;
    if let Some(min_samples) = args.min_samples {
        config.min_samples = min_samples;
    }
    let report = run_across_sample(&args.common.input, args.common.output_dir.as_deref(), &config)?;
    info!(
        "Done: {} and {}",
        report.loci_path.display(),
        report.tally_path.display()
    );
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Within(args) => run_within(args),
        Commands::Across(args) => run_across(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
