//! Transcript FASTA ingestion.
//!
//! Reads one or more FASTA files (plain or compressed, via `niffler`
//! auto-detection) with `paraseq`, and normalizes each sequence for
//! indexing:
//!
//! - bases uppercased, `U` replaced with `T`;
//! - other non-ACGT characters replaced with pseudo-random nucleotides from
//!   a fixed-seed RNG, so ingestion stays deterministic;
//! - poly-A tails (a run of at least [`POLYA_MIN`] trailing `A`s) clipped,
//!   while the recorded target length keeps the pre-clip value;
//! - names truncated at the first whitespace; duplicates are an error unless
//!   `make_unique` renames them `name_1`, `name_2`, ….

use anyhow::{Context, Result};
use paraseq::fasta;
use paraseq::Record;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use tracing::{info, warn};

use crate::error::IndexError;

/// Seed for the replacement RNG; fixed so ingestion is reproducible.
const NORMALIZE_SEED: u64 = 42;

/// Minimum trailing-`A` run that counts as a poly-A tail.
const POLYA_MIN: usize = 10;

const DNA: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// A normalized transcript record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    /// Target name (first whitespace-delimited token of the FASTA header).
    pub name: String,
    /// Normalized ACGT sequence, poly-A clipped.
    pub seq: String,
    /// Sequence length as read, before poly-A clipping.
    pub len: i32,
}

impl Transcript {
    /// A transcript from an already-normalized sequence.
    pub fn new(name: impl Into<String>, seq: impl Into<String>) -> Self {
        let seq = seq.into();
        Self {
            name: name.into(),
            len: seq.len() as i32,
            seq,
        }
    }
}

/// Running totals of normalization fixes, reported once after ingestion.
#[derive(Debug, Default)]
struct IngestCounters {
    non_nucl: usize,
    u_bases: usize,
    polya: usize,
}

/// Read and normalize the transcripts of one or more FASTA files.
///
/// # Errors
/// Fails on unreadable or malformed input, on a duplicate name when
/// `make_unique` is off, or when no sequences are found at all.
pub fn read_transcripts(paths: &[String], make_unique: bool) -> Result<Vec<Transcript>> {
    let mut rng = StdRng::seed_from_u64(NORMALIZE_SEED);
    let mut counters = IngestCounters::default();
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for path in paths {
        info!("loading transcript fasta {}", path);
        let (reader, _format) = niffler::send::from_path(path)
            .with_context(|| format!("failed to open {path}"))?;
        let mut rdr = fasta::Reader::new(reader);
        let mut record_set = rdr.new_record_set();

        while record_set.fill(&mut rdr)? {
            for rec in record_set.iter() {
                let rec = rec.with_context(|| format!("malformed FASTA record in {path}"))?;

                let header = String::from_utf8_lossy(rec.id());
                let name = header.split_whitespace().next().unwrap_or("").to_string();
                let name = resolve_name(name, &mut seen, make_unique)?;

                let mut seq = rec.seq().into_owned();
                let len = seq.len() as i32;
                normalize(&mut seq, &mut rng, &mut counters);
                clip_polya(&mut seq, &mut counters);

                // normalize() leaves only ACGT behind
                let seq = String::from_utf8(seq)
                    .map_err(|_| anyhow::anyhow!("non-UTF-8 sequence in {path}"))?;
                out.push(Transcript { name, seq, len });
            }
        }
    }

    if counters.polya > 0 {
        warn!(
            "clipped poly-A tails (longer than {}) from {} target sequences",
            POLYA_MIN, counters.polya
        );
    }
    if counters.non_nucl > 0 {
        warn!(
            "replaced {} non-ACGUT characters in the input with pseudo-random nucleotides",
            counters.non_nucl
        );
    }
    if counters.u_bases > 0 {
        warn!("replaced {} U characters with Ts", counters.u_bases);
    }

    if out.is_empty() {
        return Err(IndexError::EmptyInput.into());
    }
    Ok(out)
}

/// Uppercase and force every byte to ACGT.
fn normalize(seq: &mut [u8], rng: &mut StdRng, counters: &mut IngestCounters) {
    for b in seq.iter_mut() {
        let c = b.to_ascii_uppercase();
        *b = match c {
            b'A' | b'C' | b'G' | b'T' => c,
            b'U' => {
                counters.u_bases += 1;
                b'T'
            }
            _ => {
                counters.non_nucl += 1;
                DNA[(rng.gen::<u32>() & 0x3) as usize]
            }
        };
    }
}

/// Remove a trailing poly-A run of at least [`POLYA_MIN`] bases.
fn clip_polya(seq: &mut Vec<u8>, counters: &mut IngestCounters) {
    if seq.len() >= POLYA_MIN && seq[seq.len() - POLYA_MIN..].iter().all(|&b| b == b'A') {
        counters.polya += 1;
        let end = seq.iter().rposition(|&b| b != b'A').map_or(0, |j| j + 1);
        seq.truncate(end);
    }
}

/// Check a name for uniqueness, renaming when `make_unique` is set.
fn resolve_name(
    name: String,
    seen: &mut HashSet<String>,
    make_unique: bool,
) -> Result<String, IndexError> {
    if !seen.contains(&name) {
        seen.insert(name.clone());
        return Ok(name);
    }
    if !make_unique {
        return Err(IndexError::DuplicateName(name));
    }
    for i in 1.. {
        let candidate = format!("{name}_{i}");
        if !seen.contains(&candidate) {
            seen.insert(candidate.clone());
            return Ok(candidate);
        }
    }
    unreachable!("suffix space exhausted");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
