//! Paired-end FASTQ dereplication utility
//!
//! Remove read pairs whose forward and reverse sequences both duplicate an
//! earlier pair, keeping the copy with the highest mean quality.
//! Outputs are written next to the inputs with a name prefix.
//!
//! **Memory**: O(distinct pairs) - offsets and hashes only
//! **Streaming**: Yes - two passes over the inputs
//!
//! # Examples
//!
//! ```bash
//! # Writes derep_R1.fastq and derep_R2.fastq
//! fastq-derep R1.fastq R2.fastq
//!
//! # Validate record structure and use a custom prefix
//! fastq-derep R1.fastq R2.fastq --check -o dedup.
//! ```

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::error;

use paired_derep::{dereplicate_files, DerepOptions, DEFAULT_OUT_PREFIX};

/// Dereplicate paired-end FASTQ files
#[derive(Parser)]
#[command(name = "fastq-derep")]
#[command(version, about = "Remove duplicate read pairs from paired-end FASTQ files")]
#[command(
    long_about = "Remove duplicate read pairs from paired-end FASTQ files.\nPairs match when both forward and reverse sequences are identical;\nthe pair with the highest mean raw quality is kept.\nInput order is preserved."
)]
struct Args {
    /// Forward (R1) FASTQ file
    forward_reads: PathBuf,

    /// Reverse (R2) FASTQ file
    reverse_reads: PathBuf,

    /// Run sanity checks on input
    #[arg(short, long)]
    check: bool,

    /// Prefix attached to output files
    #[arg(short, long, default_value = DEFAULT_OUT_PREFIX)]
    out_prefix: String,

    /// Read inputs through a buffer instead of memory-mapping them
    #[arg(long)]
    no_mmap: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn run(args: &Args) -> Result<()> {
    let options = DerepOptions {
        validate: args.check,
        out_prefix: args.out_prefix.clone(),
        use_mmap: !args.no_mmap,
        ..DerepOptions::default()
    };

    let report = dereplicate_files(&args.forward_reads, &args.reverse_reads, &options)
        .with_context(|| {
            format!(
                "Failed to dereplicate {} and {}",
                args.forward_reads.display(),
                args.reverse_reads.display()
            )
        })?;

    let summary = report.summary;
    println!(
        "total read count: {}, duplicates: {}",
        summary.total_pairs, summary.duplicates
    );
    println!("filter length: {}", summary.excluded);
    println!(
        "wrote {} pairs to {} and {}",
        summary.written,
        report.forward_output.display(),
        report.reverse_output.display()
    );
    Ok(())
}

fn main() {
    let args = Args::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or(&args.log_level)).init();

    if let Err(e) = run(&args) {
        error!("{:#}", e);
        process::exit(1);
    }
}
