//! Paired Derep - two-pass dereplication of paired-end FASTQ files
//!
//! Finds read pairs whose forward and reverse sequences are both identical
//! and keeps only the pair with the highest raw mean quality. The inputs are
//! scanned twice: the first pass indexes fingerprints and byte offsets, the
//! second rewinds and rewrites both files without the duplicates.
//!
//! **Memory**: O(distinct pairs) - hashes, qualities and offsets only
//! **Streaming**: Yes - record bodies are never held beyond the current pair
//!
//! # Examples
//!
//! ```bash
//! # Writes derep_R1.fastq and derep_R2.fastq next to the inputs
//! fastq-derep R1.fastq R2.fastq --check
//! ```

use std::io::{BufRead, Seek, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

pub mod error;
pub mod index;
pub mod scanner;
pub mod shared;
pub mod writer;

pub use error::{DerepError, Result};
pub use index::{
    build_filter, find_duplicates, DuplicateGroup, DuplicateIndex, ExclusionSet, Fingerprint,
};
pub use scanner::{PairScanner, PairedRecord, Position, Record, ScanConfig, ScanState, Truncation};
pub use writer::{filter_write, WriteStats};

/// Default prefix for output file names
pub const DEFAULT_OUT_PREFIX: &str = "derep_";

/// Runtime switches for a dereplication run
#[derive(Debug, Clone)]
pub struct DerepOptions {
    /// Check header sigils and separator lines in both passes
    pub validate: bool,
    /// First byte of every header line
    pub sigil: u8,
    /// Prepended to each input's file name to form the output name
    pub out_prefix: String,
    /// Memory-map the inputs instead of reading through a buffer
    pub use_mmap: bool,
}

impl Default for DerepOptions {
    fn default() -> Self {
        Self {
            validate: false,
            sigil: b'@',
            out_prefix: DEFAULT_OUT_PREFIX.to_string(),
            use_mmap: true,
        }
    }
}

/// Counts from one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DerepSummary {
    /// Pairs scanned in the first pass
    pub total_pairs: u64,
    /// Distinct fingerprints
    pub distinct: u64,
    /// `total_pairs - distinct`
    pub duplicates: u64,
    /// Size of the exclusion set
    pub excluded: u64,
    /// Pairs written in the second pass
    pub written: u64,
}

/// Summary plus the files written by [`dereplicate_files`]
#[derive(Debug, Clone)]
pub struct DerepReport {
    pub summary: DerepSummary,
    pub forward_output: PathBuf,
    pub reverse_output: PathBuf,
}

/// Dereplicate two seekable streams
///
/// Both inputs are rewound to offset 0 before each pass. `open_outputs` is
/// called only after the first pass succeeded, so malformed input never
/// creates output.
pub fn dereplicate<F, R, W1, W2, O>(
    forward: &mut F,
    reverse: &mut R,
    config: &ScanConfig,
    open_outputs: O,
) -> Result<DerepSummary>
where
    F: BufRead + Seek,
    R: BufRead + Seek,
    W1: Write,
    W2: Write,
    O: FnOnce() -> Result<(W1, W2)>,
{
    forward.rewind()?;
    reverse.rewind()?;
    let index = {
        let mut scanner = PairScanner::new(&mut *forward, &mut *reverse, config.clone());
        let index = find_duplicates(&mut scanner)?;
        match scanner.truncation() {
            Some(Truncation::TrailingData { stream }) => warn!(
                "{} has records past the end of its mate file; they are discarded",
                stream
            ),
            Some(Truncation::IncompleteRecord) => {
                warn!("Input ends inside a record; the incomplete pair is discarded")
            }
            None => {}
        }
        index
    };

    let total_pairs = index.total_pairs();
    let distinct = index.distinct();
    info!(
        "total read count: {}, duplicates: {}",
        total_pairs,
        index.duplicate_count()
    );

    let refuse = build_filter(&index);
    drop(index);
    info!("filter length: {}", refuse.len());

    let (fwd_out, rev_out) = open_outputs()?;
    forward.rewind()?;
    reverse.rewind()?;
    let mut scanner = PairScanner::new(forward, reverse, config.clone());
    let stats = filter_write(&refuse, &mut scanner, fwd_out, rev_out)?;
    debug!("second pass: {:?}", stats);

    if stats.scanned != total_pairs {
        return Err(DerepError::State(format!(
            "second pass saw {} pairs, first pass saw {}",
            stats.scanned, total_pairs
        )));
    }
    if stats.dropped != refuse.len() as u64 {
        return Err(DerepError::State(format!(
            "second pass dropped {} pairs, filter holds {}",
            stats.dropped,
            refuse.len()
        )));
    }

    Ok(DerepSummary {
        total_pairs,
        distinct,
        duplicates: total_pairs - distinct,
        excluded: refuse.len() as u64,
        written: stats.written,
    })
}

/// Dereplicate a pair of FASTQ files into prefixed outputs
///
/// Outputs go next to their inputs. If the second pass fails, partially
/// written outputs are removed.
pub fn dereplicate_files(
    forward: &Path,
    reverse: &Path,
    options: &DerepOptions,
) -> Result<DerepReport> {
    let forward_output = shared::prefixed_output_path(forward, &options.out_prefix);
    let reverse_output = shared::prefixed_output_path(reverse, &options.out_prefix);
    check_not_input(&forward_output, &[forward, reverse])?;
    check_not_input(&reverse_output, &[forward, reverse])?;

    let mut fwd_in = shared::get_input(forward, options.use_mmap)?;
    let mut rev_in = shared::get_input(reverse, options.use_mmap)?;
    debug!(
        "inputs opened: {} ({:?} mapped bytes), {} ({:?} mapped bytes)",
        forward.display(),
        fwd_in.mapped_len(),
        reverse.display(),
        rev_in.mapped_len()
    );

    let config = ScanConfig {
        sigil: options.sigil,
        validate: options.validate,
        forward_name: forward.display().to_string(),
        reverse_name: reverse.display().to_string(),
    };

    let mut outputs_created = false;
    let result = dereplicate(&mut fwd_in, &mut rev_in, &config, || {
        info!(
            "writing dereplicated output to {} and {}",
            forward_output.display(),
            reverse_output.display()
        );
        let fwd_out = shared::create_output(&forward_output)?;
        outputs_created = true;
        let rev_out = shared::create_output(&reverse_output)?;
        Ok((fwd_out, rev_out))
    });

    match result {
        Ok(summary) => Ok(DerepReport {
            summary,
            forward_output,
            reverse_output,
        }),
        Err(e) => {
            if outputs_created {
                remove_partial(&forward_output);
                remove_partial(&reverse_output);
            }
            Err(e)
        }
    }
}

fn check_not_input(output: &Path, inputs: &[&Path]) -> Result<()> {
    let Ok(output_real) = output.canonicalize() else {
        // Output does not exist yet, so it cannot be an input
        return Ok(());
    };
    for input in inputs {
        if input.canonicalize()? == output_real {
            return Err(DerepError::OutputClobbersInput(output.to_path_buf()));
        }
    }
    Ok(())
}

fn remove_partial(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("removed partial output {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove partial output {}: {}", path.display(), e),
    }
}
