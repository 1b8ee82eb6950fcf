//! Lockstep record scanner for paired FASTQ streams
//!
//! Walks a forward and a reverse stream line by line through a four-state
//! machine (header, sequence, separator, quality), yielding one complete
//! record pair at a time together with the byte offsets where both records
//! start. Lines are kept verbatim, terminators included, and offsets are
//! counted from raw bytes consumed, so a second scan over the same streams
//! rewound to offset 0 reproduces exactly the same boundaries.
//!
//! **Memory**: O(1) - only the current pair is buffered
//! **Streaming**: Yes
//!
//! Streams are paired strictly by position. When one stream runs out
//! first, scanning stops there and the remaining records of the other
//! stream are never yielded; [`PairScanner::truncation`] reports it.

use std::io::{self, BufRead, Write};

use crate::error::{DerepError, Result};
use crate::shared::quality;

/// Byte offsets of the start of a record pair in both input streams
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Position {
    pub forward: u64,
    pub reverse: u64,
}

/// Scanner state; each state consumes exactly one line from each stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Header,
    Sequence,
    Separator,
    Score,
}

impl ScanState {
    #[inline]
    fn next(self) -> Self {
        match self {
            ScanState::Header => ScanState::Sequence,
            ScanState::Sequence => ScanState::Separator,
            ScanState::Separator => ScanState::Score,
            ScanState::Score => ScanState::Header,
        }
    }

    #[inline]
    fn line_index(self) -> usize {
        match self {
            ScanState::Header => 0,
            ScanState::Sequence => 1,
            ScanState::Separator => 2,
            ScanState::Score => 3,
        }
    }
}

/// One FASTQ record as its four raw lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    lines: [Vec<u8>; 4],
}

impl Record {
    /// Build a record from raw lines, terminators included
    pub fn from_lines(header: &[u8], sequence: &[u8], separator: &[u8], quality: &[u8]) -> Self {
        Self {
            lines: [
                header.to_vec(),
                sequence.to_vec(),
                separator.to_vec(),
                quality.to_vec(),
            ],
        }
    }

    pub fn header(&self) -> &[u8] {
        &self.lines[0]
    }

    pub fn sequence(&self) -> &[u8] {
        &self.lines[1]
    }

    pub fn separator(&self) -> &[u8] {
        &self.lines[2]
    }

    pub fn quality(&self) -> &[u8] {
        &self.lines[3]
    }

    /// Total size of the record in bytes
    pub fn byte_len(&self) -> usize {
        self.lines.iter().map(Vec::len).sum()
    }

    /// Write the record exactly as it was read
    pub fn write_to(&self, mut output: impl Write) -> io::Result<()> {
        for line in &self.lines {
            output.write_all(line)?;
        }
        Ok(())
    }

    fn clear(&mut self) {
        for line in &mut self.lines {
            line.clear();
        }
    }
}

/// Forward and reverse mates, kept or dropped together
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairedRecord {
    pub forward: Record,
    pub reverse: Record,
    pub position: Position,
}

impl PairedRecord {
    /// Raw mean quality over both quality lines
    pub fn mean_quality(&self) -> f64 {
        quality::mean_raw_quality(self.forward.quality(), self.reverse.quality())
    }
}

/// Scanner settings
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// First byte expected on every header line
    pub sigil: u8,
    /// Check header sigils and separator lines
    pub validate: bool,
    /// Stream names used in error messages
    pub forward_name: String,
    pub reverse_name: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            sigil: b'@',
            validate: false,
            forward_name: "forward".to_string(),
            reverse_name: "reverse".to_string(),
        }
    }
}

/// Why scanning stopped before both streams were fully consumed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Truncation {
    /// The named stream still had data when its mate stream ended
    TrailingData { stream: String },
    /// A stream ended in the middle of a record
    IncompleteRecord,
}

/// Lockstep scanner over a forward and a reverse stream
pub struct PairScanner<F, R> {
    forward: F,
    reverse: R,
    config: ScanConfig,
    state: ScanState,
    offsets: Position,
    pair: PairedRecord,
    pairs_scanned: u64,
    exhausted: bool,
    truncation: Option<Truncation>,
}

impl<F: BufRead, R: BufRead> PairScanner<F, R> {
    /// Create a scanner; offsets are counted from the streams' current position as 0
    pub fn new(forward: F, reverse: R, config: ScanConfig) -> Self {
        Self {
            forward,
            reverse,
            config,
            state: ScanState::Header,
            offsets: Position::default(),
            pair: PairedRecord::default(),
            pairs_scanned: 0,
            exhausted: false,
            truncation: None,
        }
    }

    /// Number of complete pairs yielded so far
    pub fn pairs_scanned(&self) -> u64 {
        self.pairs_scanned
    }

    /// Set once scanning stopped with unconsumed or partial input
    pub fn truncation(&self) -> Option<&Truncation> {
        self.truncation.as_ref()
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Advance to the next complete record pair
    ///
    /// Returns `Ok(None)` once either stream is exhausted.
    pub fn next_pair(&mut self) -> Result<Option<&PairedRecord>> {
        if self.exhausted {
            return Ok(None);
        }

        loop {
            if self.state == ScanState::Header {
                self.pair.position = self.offsets;
                self.pair.forward.clear();
                self.pair.reverse.clear();
            }

            let idx = self.state.line_index();
            let fwd_read = self
                .forward
                .read_until(b'\n', &mut self.pair.forward.lines[idx])?;
            let rev_read = self
                .reverse
                .read_until(b'\n', &mut self.pair.reverse.lines[idx])?;

            if fwd_read == 0 || rev_read == 0 {
                self.finish(fwd_read, rev_read);
                return Ok(None);
            }

            self.offsets.forward += fwd_read as u64;
            self.offsets.reverse += rev_read as u64;

            match self.state {
                ScanState::Header => {
                    if self.config.validate {
                        self.check_header(&self.config.forward_name, self.pair.forward.header())?;
                        self.check_header(&self.config.reverse_name, self.pair.reverse.header())?;
                    }
                }
                ScanState::Sequence => {}
                ScanState::Separator => {
                    if self.config.validate {
                        check_separator(&self.config.forward_name, self.pair.forward.separator())?;
                        check_separator(&self.config.reverse_name, self.pair.reverse.separator())?;
                    }
                }
                ScanState::Score => {
                    self.state = self.state.next();
                    self.pairs_scanned += 1;
                    return Ok(Some(&self.pair));
                }
            }
            self.state = self.state.next();
        }
    }

    fn finish(&mut self, fwd_read: usize, rev_read: usize) {
        self.exhausted = true;
        self.truncation = match (self.state, fwd_read, rev_read) {
            (ScanState::Header, 0, 0) => None,
            (ScanState::Header, _, 0) => Some(Truncation::TrailingData {
                stream: self.config.forward_name.clone(),
            }),
            (ScanState::Header, 0, _) => Some(Truncation::TrailingData {
                stream: self.config.reverse_name.clone(),
            }),
            _ => Some(Truncation::IncompleteRecord),
        };
    }

    fn check_header(&self, stream: &str, line: &[u8]) -> Result<()> {
        match line.first() {
            Some(&b) if b == self.config.sigil => Ok(()),
            Some(b'>') => Err(DerepError::UnsupportedFormat {
                stream: stream.to_string(),
            }),
            _ => Err(DerepError::Format {
                stream: stream.to_string(),
                line: line.to_vec(),
            }),
        }
    }
}

fn check_separator(stream: &str, line: &[u8]) -> Result<()> {
    if trim_terminator(line) == b"+" {
        Ok(())
    } else {
        Err(DerepError::Format {
            stream: stream.to_string(),
            line: line.to_vec(),
        })
    }
}

/// Strip a trailing LF or CRLF
#[inline]
fn trim_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
