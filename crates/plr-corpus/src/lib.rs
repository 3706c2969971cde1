//! # plr-corpus
//!
//! Corpus layer for the ranking engine.
//!
//! This crate provides:
//! - `PrimeSequence` (the ordered, validated corpus)
//! - line-oriented corpus reading with index-precise errors
//! - `PrimalitySource` and a deterministic Miller–Rabin oracle
//! - `Anchor` and the stability signature that classifies it Clean/Messy
//!
//! It does not score or rank anything. That lives in `plr-kernel`.
//!
//! ## Data model
//!
//! ```text
//! primes.txt (one integer per line)
//!     │  read + validate
//! PrimeSequence (immutable, strictly increasing)
//!     │  pairs (p_n, q)
//! Anchor S = p_n + q  ──►  AnchorSignature { k_min, class }
//! ```

pub mod anchor;
pub mod primality;
pub mod sequence;

pub use anchor::{
    ANCHOR_MODULI, Anchor, AnchorClass, AnchorSignature, DEFAULT_SIGNATURE_SEARCH_LIMIT,
    minimal_completing_distance,
};
pub use primality::{MillerRabin, PrimalitySource, is_prime_u64};
pub use sequence::{CorpusError, MAX_CORPUS_VALUE, PrimeSequence};
