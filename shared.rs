//! Shared I/O utilities and the raw quality metric
//!
//! Inputs are opened as seekable byte streams, either memory-mapped or
//! buffered, so the dereplication passes can rewind them to offset 0.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use memmap2::Mmap;

/// Represents the input source - either a memory-mapped file or a buffered file reader
pub enum InputSource {
    /// Memory-mapped file for zero-copy access
    MappedFile(Cursor<Mmap>),
    /// Buffered reader over the open file
    Buffered(BufReader<File>),
}

impl InputSource {
    /// Size of the underlying data in bytes, if known without I/O
    pub fn mapped_len(&self) -> Option<usize> {
        match self {
            InputSource::MappedFile(cursor) => Some(cursor.get_ref().len()),
            InputSource::Buffered(_) => None,
        }
    }
}

impl Read for InputSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            InputSource::MappedFile(cursor) => cursor.read(buf),
            InputSource::Buffered(reader) => reader.read(buf),
        }
    }
}

impl BufRead for InputSource {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            InputSource::MappedFile(cursor) => cursor.fill_buf(),
            InputSource::Buffered(reader) => reader.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            InputSource::MappedFile(cursor) => cursor.consume(amt),
            InputSource::Buffered(reader) => reader.consume(amt),
        }
    }
}

impl Seek for InputSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            InputSource::MappedFile(cursor) => cursor.seek(pos),
            InputSource::Buffered(reader) => reader.seek(pos),
        }
    }
}

/// Open an input file as a seekable source
///
/// Empty files always use the buffered reader since they cannot be mapped.
pub fn get_input(path: &Path, use_mmap: bool) -> io::Result<InputSource> {
    let file = File::open(path)?;
    if use_mmap && file.metadata()?.len() > 0 {
        // SAFETY: the map is read-only and the file is not modified while
        // the source is alive; outputs are refused if they alias an input.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(InputSource::MappedFile(Cursor::new(mmap)))
    } else {
        Ok(InputSource::Buffered(BufReader::new(file)))
    }
}

/// Create a buffered output writer for a file path
pub fn create_output(path: &Path) -> io::Result<BufWriter<File>> {
    let file = File::create(path)?;
    Ok(BufWriter::new(file))
}

/// Output path for `input`: `prefix` prepended to the base name, same directory
pub fn prefixed_output_path(input: &Path, prefix: &str) -> PathBuf {
    let mut name = std::ffi::OsString::from(prefix);
    if let Some(base) = input.file_name() {
        name.push(base);
    }
    input.with_file_name(name)
}

/// Quality metric used to rank duplicate pairs
pub mod quality {
    /// Mean of the raw byte values of both quality lines taken together
    ///
    /// This is deliberately not a Phred score: bytes are averaged as-is,
    /// line terminators included, so results stay comparable with existing
    /// pipelines. Returns 0.0 when both lines are empty.
    #[inline]
    pub fn mean_raw_quality(forward: &[u8], reverse: &[u8]) -> f64 {
        let len = forward.len() + reverse.len();
        if len == 0 {
            return 0.0;
        }
        let sum: u64 = forward
            .iter()
            .chain(reverse.iter())
            .map(|&b| u64::from(b))
            .sum();
        sum as f64 / len as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_raw_quality() {
        assert_eq!(quality::mean_raw_quality(b"IIII", b"IIII"), 73.0);
        assert_eq!(quality::mean_raw_quality(b"##", b"##"), 35.0);
        // Terminators count as bytes
        assert_eq!(quality::mean_raw_quality(b"I\n", b""), 41.5);
        assert_eq!(quality::mean_raw_quality(b"", b""), 0.0);
    }

    #[test]
    fn test_mean_matches_concatenation() {
        let fwd = b"ABCDE\n";
        let rev = b"!!~~\n";
        let joined: Vec<u8> = fwd.iter().chain(rev.iter()).copied().collect();
        let expected = joined.iter().map(|&b| b as f64).sum::<f64>() / joined.len() as f64;
        assert_eq!(quality::mean_raw_quality(fwd, rev), expected);
    }

    #[test]
    fn test_prefixed_output_path() {
        let out = prefixed_output_path(Path::new("/data/sample/R1.fastq"), "derep_");
        assert_eq!(out, PathBuf::from("/data/sample/derep_R1.fastq"));

        let out = prefixed_output_path(Path::new("R2.fq"), "x.");
        assert_eq!(out, PathBuf::from("x.R2.fq"));
    }

    #[test]
    fn test_input_sources_rewind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reads.fastq");
        std::fs::write(&path, b"@r1\nACGT\n+\nIIII\n").unwrap();

        for use_mmap in [true, false] {
            let mut input = get_input(&path, use_mmap).unwrap();
            assert_eq!(input.mapped_len().is_some(), use_mmap);
            let mut line = Vec::new();
            input.read_until(b'\n', &mut line).unwrap();
            assert_eq!(line, b"@r1\n");

            input.rewind().unwrap();
            let mut all = Vec::new();
            input.read_to_end(&mut all).unwrap();
            assert_eq!(all, b"@r1\nACGT\n+\nIIII\n");
        }
    }

    #[test]
    fn test_empty_file_uses_buffered_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.fastq");
        std::fs::write(&path, b"").unwrap();

        let input = get_input(&path, true).unwrap();
        assert!(matches!(input, InputSource::Buffered(_)));
    }
}
