//! Filtered rewrite of both input streams (pass 2)
//!
//! Re-scans the inputs and copies every pair whose forward offset is not in
//! the exclusion set. Records are written byte-for-byte, so the outputs are
//! order-preserving subsequences of the inputs.
//!
//! **Memory**: O(1) beyond the exclusion set
//! **Streaming**: Yes

use std::io::{BufRead, Write};

use crate::error::Result;
use crate::index::ExclusionSet;
use crate::scanner::PairScanner;

/// Pair counts from one filtering pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub scanned: u64,
    pub written: u64,
    pub dropped: u64,
}

/// Write all pairs not listed in `refuse` to the two outputs
///
/// The scanner must start at offset 0 of both inputs, as in the pass that
/// produced `refuse`.
pub fn filter_write<F: BufRead, R: BufRead>(
    refuse: &ExclusionSet,
    scanner: &mut PairScanner<F, R>,
    mut fwd_out: impl Write,
    mut rev_out: impl Write,
) -> Result<WriteStats> {
    let mut stats = WriteStats::default();

    while let Some(pair) = scanner.next_pair()? {
        stats.scanned += 1;
        if refuse.contains(&pair.position.forward) {
            stats.dropped += 1;
            continue;
        }
        pair.forward.write_to(&mut fwd_out)?;
        pair.reverse.write_to(&mut rev_out)?;
        stats.written += 1;
    }

    fwd_out.flush()?;
    rev_out.flush()?;
    Ok(stats)
}
