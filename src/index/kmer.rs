//! K-mer primitives.
//!
//! A [`Kmer`] is a fixed-length DNA word packed two bits per base into a
//! `u64`, with the base at offset `i` stored in bits `2i..2i+2` (little-endian
//! within the word). The k-mer length is a runtime value carried on the k-mer
//! itself: `k` is read from an index file header at load time, so it can be
//! neither a const generic nor process-global state.
//!
//! Encoding:
//! - A (65/97)  -> 00
//! - C (67/99)  -> 01
//! - G (71/103) -> 11
//! - T (84/116) -> 10
//!
//! With this table the complement of a base is `bits ^ 0b10`, so the reverse
//! complement of a whole word is an XOR followed by a bit-parallel 2-bit-pair
//! reversal.

use std::fmt;
use thiserror::Error;

/// Smallest supported k-mer length.
pub const MIN_K: usize = 3;
/// Largest supported k-mer length (2 bits per base in a `u64`).
pub const MAX_K: usize = 31;

/// Error type for k-mer encoding operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KmerError {
    /// The input byte is not a valid DNA base (A/C/G/T).
    #[error("invalid DNA base: {0:?}")]
    InvalidBase(u8),
    /// The input length does not match the requested k-mer length.
    #[error("k-mer length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Expected k-mer length.
        expected: usize,
        /// Actual input length.
        actual: usize,
    },
}

/// Encode a single DNA nucleotide to 2 bits.
#[inline]
pub const fn encode_base(base: u8) -> Result<u8, KmerError> {
    match base {
        b'A' | b'a' => Ok(0b00),
        b'C' | b'c' => Ok(0b01),
        b'G' | b'g' => Ok(0b11),
        b'T' | b't' => Ok(0b10),
        _ => Err(KmerError::InvalidBase(base)),
    }
}

/// Decode a 2-bit value to an uppercase DNA nucleotide.
#[inline]
pub const fn decode_base(bits: u8) -> u8 {
    match bits & 0b11 {
        0b00 => b'A',
        0b01 => b'C',
        0b11 => b'G',
        _ => b'T',
    }
}

/// Whether a byte is a valid DNA base (A, C, G, T, case-insensitive).
#[inline]
pub const fn is_base(b: u8) -> bool {
    matches!(b, b'A' | b'C' | b'G' | b'T' | b'a' | b'c' | b'g' | b't')
}

/// Reverse-complement a nucleotide string. Bases outside ACGT map to `N`.
pub fn revcomp(s: &str) -> String {
    s.bytes()
        .rev()
        .map(|b| match b {
            b'A' => 'T',
            b'C' => 'G',
            b'G' => 'C',
            b'T' => 'A',
            _ => 'N',
        })
        .collect()
}

/// A DNA k-mer packed two bits per base into a `u64`.
///
/// Ordering and equality compare the packed word (k-mers of equal length
/// only ever meet in practice), which makes [`Kmer::rep`] a simple `min`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Kmer {
    bits: u64,
    k: u32,
}

impl Kmer {
    /// Build a k-mer from the first `k` bytes of `seq`.
    ///
    /// # Errors
    /// Fails if `seq` is shorter than `k` or contains an invalid base.
    pub fn from_bytes(seq: &[u8], k: usize) -> Result<Self, KmerError> {
        if seq.len() < k {
            return Err(KmerError::LengthMismatch {
                expected: k,
                actual: seq.len(),
            });
        }
        let mut bits = 0u64;
        for (i, &b) in seq[..k].iter().enumerate() {
            bits |= (encode_base(b)? as u64) << (2 * i);
        }
        Ok(Self { bits, k: k as u32 })
    }

    /// Build a k-mer from a string slice (see [`Kmer::from_bytes`]).
    pub fn from_str(s: &str, k: usize) -> Result<Self, KmerError> {
        Self::from_bytes(s.as_bytes(), k)
    }

    /// Reconstitute a k-mer from its packed representation.
    ///
    /// Bits above position `2k` are masked off.
    #[inline]
    pub fn from_bits(bits: u64, k: usize) -> Self {
        let mask = if k >= 32 { u64::MAX } else { (1u64 << (2 * k)) - 1 };
        Self {
            bits: bits & mask,
            k: k as u32,
        }
    }

    /// The packed 2-bit representation.
    #[inline]
    pub fn bits(&self) -> u64 {
        self.bits
    }

    /// K-mer length.
    #[inline]
    pub fn k(&self) -> usize {
        self.k as usize
    }

    /// The 2-bit code of the base at offset `i` (0-based).
    #[inline]
    pub fn base_code(&self, i: usize) -> u8 {
        debug_assert!(i < self.k as usize);
        ((self.bits >> (2 * i)) & 0b11) as u8
    }

    /// The ASCII base at offset `i` (0-based).
    #[inline]
    pub fn base(&self, i: usize) -> u8 {
        decode_base(self.base_code(i))
    }

    /// The reverse complement ("twin") of this k-mer.
    #[inline]
    pub fn twin(&self) -> Self {
        let k = self.k as usize;
        // Complement every base, then reverse the 2-bit pairs of the word and
        // shift the payload back down to the low 2k bits.
        let mut x = self.bits ^ 0xAAAA_AAAA_AAAA_AAAA;
        x = ((x >> 2) & 0x3333_3333_3333_3333) | ((x & 0x3333_3333_3333_3333) << 2);
        x = ((x >> 4) & 0x0F0F_0F0F_0F0F_0F0F) | ((x & 0x0F0F_0F0F_0F0F_0F0F) << 4);
        x = x.swap_bytes();
        x >>= 64 - 2 * k;
        Self {
            bits: x,
            k: self.k,
        }
    }

    /// The canonical representative: the smaller of this k-mer and its twin.
    #[inline]
    pub fn rep(&self) -> Self {
        let tw = self.twin();
        if self.bits <= tw.bits { *self } else { tw }
    }

    /// Whether this k-mer is its own canonical representative.
    #[inline]
    pub fn is_rep(&self) -> bool {
        self.bits <= self.twin().bits
    }

    /// Shift one base forward: drop the first base, append `code` at the end.
    #[inline]
    pub fn forward_base_code(&self, code: u8) -> Self {
        debug_assert!(code <= 0b11);
        Self {
            bits: (self.bits >> 2) | ((code as u64) << (2 * (self.k as usize - 1))),
            k: self.k,
        }
    }

    /// Shift one base backward: prepend `code`, drop the last base.
    #[inline]
    pub fn backward_base_code(&self, code: u8) -> Self {
        debug_assert!(code <= 0b11);
        let mask = (1u64 << (2 * self.k as usize)) - 1;
        Self {
            bits: ((self.bits << 2) & mask) | code as u64,
            k: self.k,
        }
    }

    /// Shift one base forward, appending the ASCII base `b`.
    ///
    /// # Errors
    /// Fails if `b` is not a valid base.
    pub fn forward_base(&self, b: u8) -> Result<Self, KmerError> {
        Ok(self.forward_base_code(encode_base(b)?))
    }

    /// Shift one base backward, prepending the ASCII base `b`.
    ///
    /// # Errors
    /// Fails if `b` is not a valid base.
    pub fn backward_base(&self, b: u8) -> Result<Self, KmerError> {
        Ok(self.backward_base_code(encode_base(b)?))
    }
}

impl fmt::Display for Kmer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.k as usize {
            write!(f, "{}", self.base(i) as char)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Kmer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Kmer<{}>(\"{}\")", self.k, self)
    }
}

// ---------------------------------------------------------------------------
// KmerScanner
// ---------------------------------------------------------------------------

/// Iterator over the k-mers of a sequence, with jump support.
///
/// Yields `(kmer, position)` for every window of `seq` that contains only
/// valid DNA bases; windows containing other characters are skipped. `Clone`
/// so query code can save the scanner, probe ahead, and either adopt the
/// probe position or fall back.
#[derive(Clone)]
pub struct KmerScanner<'a> {
    seq: &'a [u8],
    k: usize,
    pos: usize,
}

impl<'a> KmerScanner<'a> {
    /// Create a scanner positioned at the start of `seq`.
    pub fn new(seq: &'a [u8], k: usize) -> Self {
        Self { seq, k, pos: 0 }
    }

    /// Yield the k-mer at the current position (or the next valid one) and
    /// advance by one base.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<(Kmer, usize)> {
        'window: while self.pos + self.k <= self.seq.len() {
            let window = &self.seq[self.pos..self.pos + self.k];
            // Scan right-to-left so a single invalid byte skips the whole
            // window past it.
            for (j, &b) in window.iter().enumerate().rev() {
                if !is_base(b) {
                    self.pos += j + 1;
                    continue 'window;
                }
            }
            let mut bits = 0u64;
            for (i, &b) in window.iter().enumerate() {
                // window is validated above
                bits |= (match b {
                    b'A' | b'a' => 0u64,
                    b'C' | b'c' => 1,
                    b'G' | b'g' => 3,
                    _ => 2,
                }) << (2 * i);
            }
            let p = self.pos;
            self.pos += 1;
            return Some((
                Kmer {
                    bits,
                    k: self.k as u32,
                },
                p,
            ));
        }
        None
    }

    /// Move the scanner forward so the next yield starts at `pos` (or at the
    /// first valid window after it). Backward jumps are ignored.
    pub fn jump_to(&mut self, pos: usize) {
        if pos > self.pos {
            self.pos = pos;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_roundtrip() {
        let km = Kmer::from_str("ACGTG", 5).unwrap();
        assert_eq!(km.to_string(), "ACGTG");
        assert_eq!(km.k(), 5);

        let km = Kmer::from_str("acgtg", 5).unwrap();
        assert_eq!(km.to_string(), "ACGTG");
    }

    #[test]
    fn test_invalid_input() {
        assert!(Kmer::from_str("ACGN", 4).is_err());
        assert!(matches!(
            Kmer::from_str("ACG", 5),
            Err(KmerError::LengthMismatch {
                expected: 5,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_twin() {
        let km = Kmer::from_str("ACGTG", 5).unwrap();
        assert_eq!(km.twin().to_string(), "CACGT");
        assert_eq!(km.twin().twin(), km);

        let km = Kmer::from_str("AAACC", 5).unwrap();
        assert_eq!(km.twin().to_string(), "GGTTT");
    }

    #[test]
    fn test_rep_is_min() {
        let km = Kmer::from_str("ACGTG", 5).unwrap();
        let tw = km.twin();
        let rep = km.rep();
        assert!(rep == km || rep == tw);
        assert!(rep.bits() <= km.bits() && rep.bits() <= tw.bits());
        assert_eq!(km.rep(), tw.rep());
    }

    #[test]
    fn test_forward_backward() {
        let km = Kmer::from_str("ACGTG", 5).unwrap();
        assert_eq!(km.forward_base(b'T').unwrap().to_string(), "CGTGT");
        assert_eq!(km.backward_base(b'T').unwrap().to_string(), "TACGT");
        // forward then backward with the dropped base restores the k-mer
        let fwd = km.forward_base(b'C').unwrap();
        assert_eq!(fwd.backward_base(b'A').unwrap(), km);
    }

    #[test]
    fn test_base_accessors() {
        let km = Kmer::from_str("GATTC", 5).unwrap();
        assert_eq!(km.base(0), b'G');
        assert_eq!(km.base(3), b'T');
        assert_eq!(km.base(4), b'C');
    }

    #[test]
    fn test_from_bits_masks_high_bits() {
        let km = Kmer::from_str("TTT", 3).unwrap();
        let dirty = km.bits() | (0xFFu64 << 40);
        assert_eq!(Kmer::from_bits(dirty, 3), km);
    }

    #[test]
    fn test_revcomp_string() {
        assert_eq!(revcomp("ACGTG"), "CACGT");
        assert_eq!(revcomp(""), "");
        assert_eq!(revcomp("ACGNT"), "ANCGT");
    }

    #[test]
    fn test_scanner_plain() {
        let seq = b"ACGTACG";
        let mut it = KmerScanner::new(seq, 5);
        let mut got = Vec::new();
        while let Some((km, p)) = it.next() {
            got.push((km.to_string(), p));
        }
        assert_eq!(
            got,
            vec![
                ("ACGTA".to_string(), 0),
                ("CGTAC".to_string(), 1),
                ("GTACG".to_string(), 2)
            ]
        );
    }

    #[test]
    fn test_scanner_skips_invalid() {
        // N at offset 3 invalidates windows 0..=3
        let seq = b"ACGNACGTACG";
        let mut it = KmerScanner::new(seq, 5);
        let (km, p) = it.next().unwrap();
        assert_eq!(p, 4);
        assert_eq!(km.to_string(), "ACGTA");
    }

    #[test]
    fn test_scanner_jump_to() {
        let seq = b"ACGTACGTACGT";
        let mut it = KmerScanner::new(seq, 5);
        it.next().unwrap();
        it.jump_to(6);
        let (_, p) = it.next().unwrap();
        assert_eq!(p, 6);
        // backward jumps are ignored
        it.jump_to(2);
        let (_, p) = it.next().unwrap();
        assert_eq!(p, 7);
    }

    #[test]
    fn test_scanner_short_sequence() {
        let mut it = KmerScanner::new(b"ACG", 5);
        assert!(it.next().is_none());
    }
}
