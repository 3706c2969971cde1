//! Primality oracle.
//!
//! The engine never generates primes itself; it only asks whether a number
//! is prime. `MillerRabin` answers for every u64 using the first twelve prime
//! bases, which is deterministic below 3.3 × 10^24.

/// Anything that can decide primality for a u64.
pub trait PrimalitySource {
    fn is_prime(&self, n: u64) -> bool;
}

/// Deterministic Miller–Rabin for the full u64 range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MillerRabin;

impl PrimalitySource for MillerRabin {
    fn is_prime(&self, n: u64) -> bool {
        is_prime_u64(n)
    }
}

const WITNESS_BASES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

/// Deterministic primality test for u64.
pub fn is_prime_u64(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    for p in WITNESS_BASES {
        if n == p {
            return true;
        }
        if n % p == 0 {
            return false;
        }
    }

    let mut d = n - 1;
    let mut s = 0u32;
    while d % 2 == 0 {
        d /= 2;
        s += 1;
    }

    'witness: for a in WITNESS_BASES {
        let mut x = mod_pow_u64(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..s {
            x = mul_mod_u64(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Overflow-safe modular multiplication via u128.
#[inline]
fn mul_mod_u64(a: u64, b: u64, m: u64) -> u64 {
    ((a as u128 * b as u128) % m as u128) as u64
}

fn mod_pow_u64(mut base: u64, mut exp: u64, modulus: u64) -> u64 {
    if modulus == 1 {
        return 0;
    }
    let mut result: u64 = 1;
    base %= modulus;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mul_mod_u64(result, base, modulus);
        }
        exp >>= 1;
        base = mul_mod_u64(base, base, modulus);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial_division(n: u64) -> bool {
        if n < 2 {
            return false;
        }
        let mut d = 2;
        while d * d <= n {
            if n % d == 0 {
                return false;
            }
            d += 1;
        }
        true
    }

    #[test]
    fn agrees_with_trial_division_below_ten_thousand() {
        for n in 0..10_000u64 {
            assert_eq!(is_prime_u64(n), trial_division(n), "n = {n}");
        }
    }

    #[test]
    fn rejects_strong_pseudoprimes() {
        // Strong pseudoprimes to base 2 and to bases 2..=7.
        for n in [2047u64, 3_215_031_751, 3_825_123_056_546_413_051] {
            assert!(!is_prime_u64(n), "n = {n}");
        }
    }

    #[test]
    fn accepts_large_primes() {
        assert!(is_prime_u64(1_000_000_007));
        assert!(is_prime_u64(18_446_744_073_709_551_557));
        assert!(!is_prime_u64(18_446_744_073_709_551_555));
    }

    #[test]
    fn oracle_delegates_to_free_function() {
        assert!(MillerRabin.is_prime(97));
        assert!(!MillerRabin.is_prime(91));
    }
}
