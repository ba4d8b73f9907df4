//! The transcriptome k-mer index.
//!
//! Assembles the compacted de Bruijn graph, the equivalence-class tables,
//! and the target metadata into a single buildable/loadable object. All
//! structures are built once and queried read-only afterwards; the query
//! paths ([`KmerIndex::match_read`] and friends) take `&self` and are safe to
//! call from many threads at once.

pub mod build;
pub mod dbg;
pub mod equiv;
pub mod kmer;
pub mod storage;

use ahash::RandomState;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::info;

use crate::error::IndexError;
use crate::io::transcripts::Transcript;
use self::dbg::{deterministic_state, Contig, DbGraph};
use self::kmer::{revcomp, MAX_K, MIN_K};

/// On-disk format version. Bump on every change to the file format.
pub const INDEX_VERSION: u64 = 10;

/// Default probe stride for the back-off phase of [`KmerIndex::match_read`].
pub const DEFAULT_SKIP: i32 = 1;

/// The complete transcriptome index.
pub struct KmerIndex {
    /// K-mer length.
    pub(crate) k: usize,
    /// Number of target transcripts.
    pub(crate) num_trans: i32,
    /// Probe stride used when the match scan backs off. Not serialized.
    pub(crate) skip: i32,
    /// Canonical k-mer map and contig table.
    pub(crate) dbg: DbGraph,
    /// Equivalence classes: `ecmap[i]` is the sorted transcript set of class `i`.
    pub(crate) ecmap: Vec<Vec<i32>>,
    /// Inverse interning map, rebuilt from `ecmap` on load.
    pub(crate) ecmapinv: HashMap<Vec<i32>, i32, RandomState>,
    /// Target names, in input order.
    pub(crate) target_names: Vec<String>,
    /// Target lengths as ingested (before poly-A clipping).
    pub(crate) target_lens: Vec<i32>,
    /// Target sequences, reconstructed from contigs on first use.
    pub(crate) target_seqs: OnceLock<Vec<String>>,
}

impl KmerIndex {
    /// Build an index over `transcripts` with k-mer length `k`.
    ///
    /// # Errors
    /// Fails on an unsupported `k`, empty input, or a violated internal
    /// invariant.
    pub fn build(k: usize, skip: i32, transcripts: &[Transcript]) -> Result<Self, IndexError> {
        check_k(k)?;
        if transcripts.is_empty() {
            return Err(IndexError::EmptyInput);
        }

        info!("k-mer length: {}", k);
        let num_trans = transcripts.len() as i32;
        let target_names: Vec<String> = transcripts.iter().map(|t| t.name.clone()).collect();
        let target_lens: Vec<i32> = transcripts.iter().map(|t| t.len).collect();
        let seqs: Vec<String> = transcripts.iter().map(|t| t.seq.clone()).collect();

        // every target starts out in its own singleton class
        let mut ecmap: Vec<Vec<i32>> = (0..num_trans).map(|i| vec![i]).collect();
        let mut ecmapinv = HashMap::with_hasher(deterministic_state());
        for (i, v) in ecmap.iter().enumerate() {
            ecmapinv.insert(v.clone(), i as i32);
        }

        let mut dbg = DbGraph::new();
        build::build_de_bruijn_graph(&mut dbg, k, &seqs)?;
        equiv::build_equivalence_classes(&mut dbg, k, &seqs, &mut ecmap, &mut ecmapinv)?;

        Ok(Self {
            k,
            num_trans,
            skip: skip.max(1),
            dbg,
            ecmap,
            ecmapinv,
            target_names,
            target_lens,
            target_seqs: OnceLock::new(),
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// K-mer length.
    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Number of target transcripts.
    #[inline]
    pub fn num_trans(&self) -> i32 {
        self.num_trans
    }

    /// Probe stride used by the match back-off scan.
    #[inline]
    pub fn skip(&self) -> i32 {
        self.skip
    }

    /// Set the probe stride (clamped to at least 1). The stride is a query
    /// parameter and is not stored in the index file.
    pub fn set_skip(&mut self, skip: i32) {
        self.skip = skip.max(1);
    }

    /// Number of distinct canonical k-mers.
    #[inline]
    pub fn nb_kmers(&self) -> usize {
        self.dbg.nb_kmers()
    }

    /// Number of contigs.
    #[inline]
    pub fn num_contigs(&self) -> usize {
        self.dbg.num_contigs()
    }

    /// The graph store.
    #[inline]
    pub fn graph(&self) -> &DbGraph {
        &self.dbg
    }

    /// Contig with id `id`.
    #[inline]
    pub fn contig(&self, id: i32) -> &Contig {
        &self.dbg.contigs[id as usize]
    }

    /// All equivalence classes.
    #[inline]
    pub fn ecmap(&self) -> &[Vec<i32>] {
        &self.ecmap
    }

    /// Members of equivalence class `ec`, or an empty slice for an unknown id.
    #[inline]
    pub fn ec_members(&self, ec: i32) -> &[i32] {
        self.ecmap
            .get(ec as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Target names, in id order.
    #[inline]
    pub fn target_names(&self) -> &[String] {
        &self.target_names
    }

    /// Target lengths, in id order.
    #[inline]
    pub fn target_lens(&self) -> &[i32] {
        &self.target_lens
    }

    // -----------------------------------------------------------------------
    // Lazy target sequences
    // -----------------------------------------------------------------------

    /// Target sequences, reconstructed from contig substrings on first call
    /// and cached.
    ///
    /// Each transcript is the concatenation, in occurrence order, of its
    /// contigs (reverse-complemented for antisense occurrences), trimming the
    /// leading `k - 1` overlap bases of every contig but the first.
    pub fn target_seqs(&self) -> &[String] {
        self.target_seqs.get_or_init(|| self.reconstruct_targets())
    }

    fn reconstruct_targets(&self) -> Vec<String> {
        let k = self.k;
        let mut per_target: Vec<Vec<(i32, dbg::ContigToTranscript)>> =
            vec![Vec::new(); self.num_trans as usize];
        for c in &self.dbg.contigs {
            for occ in &c.transcripts {
                per_target[occ.trid as usize].push((c.id, *occ));
            }
        }

        let mut out = Vec::with_capacity(per_target.len());
        for (trid, mut occs) in per_target.into_iter().enumerate() {
            occs.sort_by_key(|(_, occ)| occ.pos);
            let mut seq = String::with_capacity(self.target_lens[trid] as usize);
            for (cid, occ) in occs {
                let contig = &self.dbg.contigs[cid as usize];
                let start = if occ.pos == 0 { 0 } else { k - 1 };
                if occ.sense {
                    seq.push_str(&contig.seq[start..]);
                } else {
                    seq.push_str(&revcomp(&contig.seq)[start..]);
                }
            }
            out.push(seq);
        }
        out
    }
}

/// Validate a k-mer length: odd, within `3..=31`.
///
/// Odd k guarantees no k-mer equals its own reverse complement, which the
/// canonical-form bookkeeping relies on.
pub(crate) fn check_k(k: usize) -> Result<(), IndexError> {
    if !(MIN_K..=MAX_K).contains(&k) || k % 2 == 0 {
        return Err(IndexError::InvalidK(k));
    }
    Ok(())
}

impl PartialEq for KmerIndex {
    fn eq(&self, other: &Self) -> bool {
        self.k == other.k
            && self.num_trans == other.num_trans
            && self.dbg == other.dbg
            && self.ecmap == other.ecmap
            && self.target_names == other.target_names
            && self.target_lens == other.target_lens
    }
}

impl Eq for KmerIndex {}

impl std::fmt::Debug for KmerIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KmerIndex")
            .field("k", &self.k)
            .field("num_trans", &self.num_trans)
            .field("nb_kmers", &self.nb_kmers())
            .field("num_contigs", &self.num_contigs())
            .field("num_ecs", &self.ecmap.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
