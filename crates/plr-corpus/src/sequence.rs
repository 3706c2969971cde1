//! Corpus storage: one prime per line.
//!
//! The portable interchange format for the prime sequence. Every value is a
//! single decimal line; blank lines and `#` comments are skipped. Reading
//! validates the collaborator contract so downstream scoring never sees a
//! malformed sequence.

use crate::primality::{PrimalitySource, is_prime_u64};
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Largest value a corpus may contain. Anchors (`p + q`) must fit in u64.
pub const MAX_CORPUS_VALUE: u64 = u64::MAX / 2;

/// Ordered, immutable sequence of primes, indexed by position.
///
/// Invariant: strictly increasing, every value in `1..=MAX_CORPUS_VALUE`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PrimeSequence {
    primes: Vec<u64>,
}

impl PrimeSequence {
    /// Build a sequence from values already in memory.
    pub fn new(primes: Vec<u64>) -> Result<Self, CorpusError> {
        validate_order(&primes)?;
        Ok(Self { primes })
    }

    /// Read a sequence from a line-oriented reader.
    pub fn read(reader: impl BufRead) -> Result<Self, CorpusError> {
        let mut primes = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| CorpusError::Io {
                context: format!("line {}", line_no + 1),
                message: e.to_string(),
            })?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let value: u64 = trimmed.parse().map_err(|e| CorpusError::Parse {
                line: line_no + 1,
                message: format!("`{trimmed}`: {e}"),
            })?;
            primes.push(value);
        }
        Self::new(primes)
    }

    /// Read a sequence from a file path.
    pub fn read_from_path(path: impl AsRef<Path>) -> Result<Self, CorpusError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| CorpusError::Io {
            context: path.display().to_string(),
            message: e.to_string(),
        })?;
        validate_substrate_bytes(path, &bytes)?;
        let sequence = Self::read(BufReader::new(bytes.as_slice()))?;
        tracing::debug!(
            path = %path.display(),
            primes = sequence.len(),
            "loaded prime corpus"
        );
        Ok(sequence)
    }

    /// Check that every value is actually prime.
    ///
    /// Reading only checks order; callers that cannot trust the source
    /// run this once before building tables.
    pub fn verify_primality(&self) -> Result<(), CorpusError> {
        match self.primes.iter().position(|&p| !is_prime_u64(p)) {
            Some(index) => Err(CorpusError::NotPrime {
                index,
                value: self.primes[index],
            }),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.primes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<u64> {
        self.primes.get(index).copied()
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.primes
    }

    pub fn first(&self) -> Option<u64> {
        self.primes.first().copied()
    }

    pub fn last(&self) -> Option<u64> {
        self.primes.last().copied()
    }

    /// The `k` primes following position `index`, if the corpus has them.
    pub fn successors(&self, index: usize, k: usize) -> Option<&[u64]> {
        let start = index.checked_add(1)?;
        let end = start.checked_add(k)?;
        self.primes.get(start..end)
    }

    /// Membership by binary search.
    pub fn contains(&self, n: u64) -> bool {
        self.primes.binary_search(&n).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.primes.iter().copied()
    }
}

/// The corpus answers primality inside its own range and defers to
/// Miller–Rabin outside it.
impl PrimalitySource for PrimeSequence {
    fn is_prime(&self, n: u64) -> bool {
        match (self.first(), self.last()) {
            (Some(first), Some(last)) if (first..=last).contains(&n) => self.contains(n),
            _ => is_prime_u64(n),
        }
    }
}

fn validate_order(primes: &[u64]) -> Result<(), CorpusError> {
    let mut previous: Option<u64> = None;
    for (index, &value) in primes.iter().enumerate() {
        if value == 0 || value > MAX_CORPUS_VALUE {
            return Err(CorpusError::OutOfRange { index, value });
        }
        if let Some(previous) = previous
            && value <= previous
        {
            return Err(CorpusError::NonIncreasing {
                index,
                previous,
                value,
            });
        }
        previous = Some(value);
    }
    Ok(())
}

fn validate_substrate_bytes(path: &Path, bytes: &[u8]) -> Result<(), CorpusError> {
    if bytes.contains(&0) {
        return Err(CorpusError::Corrupt(format!(
            "{}: contains NUL byte(s)",
            path.display()
        )));
    }
    if std::str::from_utf8(bytes).is_err() {
        return Err(CorpusError::Corrupt(format!(
            "{}: contains non-UTF-8 byte sequence(s)",
            path.display()
        )));
    }
    Ok(())
}

/// Errors from reading or validating a corpus.
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("{context}: I/O error: {message}")]
    Io { context: String, message: String },

    #[error("line {line}: parse error: {message}")]
    Parse { line: usize, message: String },

    #[error("index {index}: {value} does not exceed previous value {previous}")]
    NonIncreasing {
        index: usize,
        previous: u64,
        value: u64,
    },

    #[error("index {index}: {value} is not prime")]
    NotPrime { index: usize, value: u64 },

    #[error("index {index}: {value} is outside 1..={max}", max = MAX_CORPUS_VALUE)]
    OutOfRange { index: usize, value: u64 },

    #[error("corrupted corpus: {0}")]
    Corrupt(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_lines_skipping_blanks_and_comments() {
        let text = "# first primes\n2\n3\n\n  5  \n7\n";
        let sequence = PrimeSequence::read(text.as_bytes()).expect("valid corpus");
        assert_eq!(sequence.as_slice(), &[2, 3, 5, 7]);
    }

    #[test]
    fn parse_error_reports_line_number() {
        let err = PrimeSequence::read("2\n3\nfive\n".as_bytes()).unwrap_err();
        match err {
            CorpusError::Parse { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_increasing_reports_offending_index() {
        let err = PrimeSequence::new(vec![2, 3, 5, 5, 7]).unwrap_err();
        match err {
            CorpusError::NonIncreasing {
                index,
                previous,
                value,
            } => assert_eq!((index, previous, value), (3, 5, 5)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn zero_is_out_of_range() {
        let err = PrimeSequence::new(vec![0, 2]).unwrap_err();
        assert!(matches!(err, CorpusError::OutOfRange { index: 0, .. }));
    }

    #[test]
    fn verify_primality_finds_first_composite() {
        let sequence = PrimeSequence::new(vec![2, 3, 5, 9, 11, 15]).expect("ordered");
        let err = sequence.verify_primality().unwrap_err();
        assert!(matches!(err, CorpusError::NotPrime { index: 3, value: 9 }));
    }

    #[test]
    fn successors_respect_corpus_end() {
        let sequence = PrimeSequence::new(vec![2, 3, 5, 7, 11]).expect("ordered");
        assert_eq!(sequence.successors(1, 3), Some(&[5, 7, 11][..]));
        assert_eq!(sequence.successors(2, 3), None);
    }

    #[test]
    fn corpus_primality_falls_back_outside_range() {
        let sequence = PrimeSequence::new(vec![11, 13, 17, 19]).expect("ordered");
        assert!(sequence.is_prime(13));
        assert!(!sequence.is_prime(15));
        assert!(sequence.is_prime(7));
        assert!(sequence.is_prime(23));
        assert!(!sequence.is_prime(25));
    }
}
