//! Candidate Enumerator.
//!
//! For a reference prime `p_n`, produce the ordered successor candidates:
//! the next K primes of the corpus (closed pool) or the next N integers,
//! optionally filtered to primes (open pool).

use crate::config::{CandidatePool, OpenPoolFilter};
use crate::error::PlrError;
use plr_corpus::{Anchor, MAX_CORPUS_VALUE, PrimalitySource, PrimeSequence};
use serde::{Deserialize, Serialize};

/// One hypothetical successor. Ephemeral: built and dropped per prime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// 1-based enumeration order.
    pub position: usize,
    pub value: u64,
    pub gap: u64,
    pub anchor: Anchor,
}

impl Candidate {
    pub fn new(position: usize, reference: u64, value: u64) -> Self {
        let anchor = Anchor::new(reference, value);
        Self {
            position,
            value,
            gap: anchor.gap(),
            anchor,
        }
    }
}

/// The raw candidate pool for the prime at `index`, in increasing order.
///
/// A closed pool needs all K successors inside the corpus. An open pool
/// may come back short (or empty) when its window holds few primes; values
/// above `MAX_CORPUS_VALUE` are never produced, so every anchor sum fits.
pub fn candidate_pool(
    corpus: &PrimeSequence,
    index: usize,
    pool: CandidatePool,
    filter: OpenPoolFilter,
) -> Result<Vec<Candidate>, PlrError> {
    let reference = corpus.get(index).ok_or(PlrError::IndexOutOfRange {
        index,
        start: 0,
        end: corpus.len(),
    })?;

    let candidates = match pool {
        CandidatePool::Closed(k) => corpus
            .successors(index, k)
            .ok_or(PlrError::IndexOutOfRange {
                index,
                start: 0,
                end: corpus.len().saturating_sub(k),
            })?
            .iter()
            .enumerate()
            .map(|(i, &value)| Candidate::new(i + 1, reference, value))
            .collect(),
        CandidatePool::Open(n) => (1..=n as u64)
            .map_while(|offset| reference.checked_add(offset))
            .take_while(|&value| value <= MAX_CORPUS_VALUE)
            .filter(|&value| filter == OpenPoolFilter::Integers || corpus.is_prime(value))
            .enumerate()
            .map(|(i, value)| Candidate::new(i + 1, reference, value))
            .collect(),
    };
    Ok(candidates)
}

/// Candidates for one prediction: the pool, holding at least two entries.
///
/// Fewer than two is `InsufficientCandidates`: rank-1 vs rank-2 logic has
/// nothing to compare.
pub fn enumerate_candidates(
    corpus: &PrimeSequence,
    index: usize,
    pool: CandidatePool,
    filter: OpenPoolFilter,
) -> Result<Vec<Candidate>, PlrError> {
    let candidates = candidate_pool(corpus, index, pool, filter)?;
    if candidates.len() < 2 {
        return Err(PlrError::InsufficientCandidates {
            index,
            prime: corpus.get(index).unwrap_or_default(),
            count: candidates.len(),
        });
    }
    Ok(candidates)
}
