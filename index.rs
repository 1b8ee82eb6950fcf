//! Duplicate index (pass 1) and exclusion set builder
//!
//! Pairs are keyed by a StringZilla hash of the forward and reverse
//! sequence lines. Each group remembers its best raw quality and every
//! position ever seen, best first. Hash collisions are treated as equal
//! sequences.
//!
//! **Memory**: O(pairs) offsets - one hash, one quality and the positions
//! per distinct fingerprint; record bodies are never stored

use std::collections::{HashMap, HashSet, VecDeque};
use std::io::BufRead;

use stringzilla::sz::{hash, BuildSzHasher};

use crate::error::Result;
use crate::scanner::{PairScanner, PairedRecord, Position};

/// Hash of the sequence lines of both mates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub u64);

impl Fingerprint {
    /// Fingerprint a pair, using `scratch` to join the two sequence lines
    pub fn of_pair(pair: &PairedRecord, scratch: &mut Vec<u8>) -> Self {
        scratch.clear();
        scratch.extend_from_slice(pair.forward.sequence());
        scratch.extend_from_slice(pair.reverse.sequence());
        Fingerprint(hash(scratch.as_slice()))
    }
}

/// All pairs sharing one fingerprint
///
/// Positions are kept in a deque so a new best is pushed to the front in
/// constant time, however large the group grows.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateGroup {
    best_quality: f64,
    positions: VecDeque<Position>,
}

impl DuplicateGroup {
    fn new(quality: f64, position: Position) -> Self {
        Self {
            best_quality: quality,
            positions: VecDeque::from([position]),
        }
    }

    /// Record another pair; only a strictly better quality takes the lead
    fn insert(&mut self, quality: f64, position: Position) {
        if quality > self.best_quality {
            self.positions.push_front(position);
            self.best_quality = quality;
        } else {
            self.positions.push_back(position);
        }
    }

    pub fn best_quality(&self) -> f64 {
        self.best_quality
    }

    /// Position of the pair to keep
    pub fn best(&self) -> Position {
        self.positions[0]
    }

    /// All positions, best first
    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter()
    }

    /// Positions of the pairs to drop
    pub fn duplicates(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter().skip(1)
    }
}

/// Fingerprint-to-group map built by the first pass
#[derive(Debug, Default)]
pub struct DuplicateIndex {
    groups: HashMap<Fingerprint, DuplicateGroup, BuildSzHasher>,
    total_pairs: u64,
}

impl DuplicateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one scanned pair with its fingerprint and quality
    pub fn insert(&mut self, fingerprint: Fingerprint, quality: f64, position: Position) {
        self.total_pairs += 1;
        self.groups
            .entry(fingerprint)
            .and_modify(|group| group.insert(quality, position))
            .or_insert_with(|| DuplicateGroup::new(quality, position));
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&DuplicateGroup> {
        self.groups.get(fingerprint)
    }

    pub fn groups(&self) -> impl Iterator<Item = &DuplicateGroup> {
        self.groups.values()
    }

    /// Number of pairs indexed
    pub fn total_pairs(&self) -> u64 {
        self.total_pairs
    }

    /// Number of distinct fingerprints
    pub fn distinct(&self) -> u64 {
        self.groups.len() as u64
    }

    /// Pairs beyond the first of each fingerprint
    pub fn duplicate_count(&self) -> u64 {
        self.total_pairs - self.distinct()
    }
}

/// Scan every pair and build the duplicate index
pub fn find_duplicates<F: BufRead, R: BufRead>(
    scanner: &mut PairScanner<F, R>,
) -> Result<DuplicateIndex> {
    let mut index = DuplicateIndex::new();
    let mut scratch = Vec::new();

    while let Some(pair) = scanner.next_pair()? {
        let fingerprint = Fingerprint::of_pair(pair, &mut scratch);
        index.insert(fingerprint, pair.mean_quality(), pair.position);
    }

    Ok(index)
}

/// Forward offsets of every pair to drop
pub type ExclusionSet = HashSet<u64, BuildSzHasher>;

/// Reduce the index to the forward offsets of all non-best group members
pub fn build_filter(index: &DuplicateIndex) -> ExclusionSet {
    let mut refuse = ExclusionSet::with_capacity_and_hasher(
        index.duplicate_count() as usize,
        BuildSzHasher::default(),
    );
    for group in index.groups() {
        refuse.extend(group.duplicates().map(|pos| pos.forward));
    }
    refuse
}
