//! Compacted de Bruijn graph store.
//!
//! Two parallel arenas indexed by integer id: a hash map from canonical
//! k-mer to [`KmerEntry`], and the contig (unitig) table. Entries reference
//! contigs by id and contigs reference transcripts by id, so no ownership
//! cycles arise.
//!
//! Iteration over the k-mer map follows first-insertion order (a side
//! vector of keys), so contig ids, equivalence-class ids, and the serialized
//! byte stream are all deterministic for a fixed input order.

use ahash::RandomState;
use std::collections::HashMap;

use super::kmer::Kmer;

/// Seed for every hash table in the index. Hashing must be stable across
/// processes: raw k-mer words are written to disk and rehashed on load.
const HASH_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

/// A seeded, process-stable hasher state.
pub(crate) fn deterministic_state() -> RandomState {
    RandomState::with_seeds(HASH_SEED, !HASH_SEED, HASH_SEED, !HASH_SEED)
}

// ---------------------------------------------------------------------------
// KmerEntry
// ---------------------------------------------------------------------------

/// Per-k-mer record stored in the graph hash.
///
/// `pos_word` packs the 0-based offset of the k-mer within its contig
/// (low 28 bits) with the direction flag (high nibble: `0x0` when the
/// canonical form equals the in-contig orientation, `0xF` otherwise). The
/// packed layout is part of the on-disk format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KmerEntry {
    pos_word: u32,
    /// Number of k-mers in the contig.
    pub length: i32,
    /// Contig id, `-1` while unassigned.
    pub id: i32,
    /// Equivalence-class id of the contig, `-1` while unassigned.
    pub ec: i32,
}

const POS_MASK: u32 = 0x0FFF_FFFF;
const DIR_MASK: u32 = 0xF000_0000;

impl KmerEntry {
    /// A fresh entry with no contig assignment.
    pub fn unassigned() -> Self {
        Self {
            pos_word: POS_MASK,
            length: 0,
            id: -1,
            ec: -1,
        }
    }

    /// Entry for the k-mer at `pos` within contig `id` of `length` k-mers.
    pub fn new(id: i32, length: i32, pos: i32, is_fw: bool) -> Self {
        let mut e = Self {
            pos_word: 0,
            length,
            id,
            ec: -1,
        };
        e.set_pos(pos);
        e.set_dir(is_fw);
        e
    }

    /// Rebuild an entry from its serialized fields.
    pub(crate) fn from_raw(pos_word: u32, length: i32, id: i32, ec: i32) -> Self {
        Self {
            pos_word,
            length,
            id,
            ec,
        }
    }

    /// The packed position/direction word, as serialized.
    #[inline]
    pub(crate) fn pos_word(&self) -> u32 {
        self.pos_word
    }

    /// 0-based offset of this k-mer within its contig.
    #[inline]
    pub fn pos(&self) -> i32 {
        (self.pos_word & POS_MASK) as i32
    }

    /// Whether the canonical form equals the in-contig orientation.
    #[inline]
    pub fn is_fw(&self) -> bool {
        (self.pos_word & DIR_MASK) == 0
    }

    #[inline]
    fn set_pos(&mut self, pos: i32) {
        self.pos_word = (self.pos_word & DIR_MASK) | (pos as u32 & POS_MASK);
    }

    #[inline]
    fn set_dir(&mut self, is_fw: bool) {
        self.pos_word = (self.pos_word & POS_MASK) | if is_fw { 0 } else { DIR_MASK };
    }

    /// Distance, in k-mers, from this entry to the far junction end of its
    /// contig when the k-mer was read in orientation `fw` relative to
    /// canonical.
    #[inline]
    pub fn dist_to_end(&self, fw: bool) -> i32 {
        if self.is_fw() == fw {
            self.length - 1 - self.pos()
        } else {
            self.pos()
        }
    }
}

// ---------------------------------------------------------------------------
// Contig
// ---------------------------------------------------------------------------

/// One occurrence of a contig on a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContigToTranscript {
    /// Transcript id.
    pub trid: i32,
    /// 0-based start of the contig within the transcript (in the contig's
    /// stored orientation).
    pub pos: i32,
    /// Whether the transcript occurrence matches the contig's stored strand.
    pub sense: bool,
}

/// A maximal unambiguous path in the graph, stored as one sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contig {
    /// Dense id, equal to the contig's index in the table.
    pub id: i32,
    /// Number of k-mers; `seq.len() == length + k - 1`.
    pub length: i32,
    /// Nucleotide sequence in the contig's stored orientation.
    pub seq: String,
    /// Equivalence class assigned to the contig, `-1` until EC construction.
    pub ec: i32,
    /// Every transcript occurrence of this contig.
    pub transcripts: Vec<ContigToTranscript>,
}

// ---------------------------------------------------------------------------
// DbGraph
// ---------------------------------------------------------------------------

/// The compacted de Bruijn graph: canonical k-mer map plus contig table.
#[derive(Debug)]
pub struct DbGraph {
    kmap: HashMap<Kmer, KmerEntry, RandomState>,
    /// Keys of `kmap` in first-insertion order.
    order: Vec<Kmer>,
    /// Contig table, indexed by contig id.
    pub contigs: Vec<Contig>,
}

impl DbGraph {
    /// An empty graph.
    pub fn new() -> Self {
        Self {
            kmap: HashMap::with_hasher(deterministic_state()),
            order: Vec::new(),
            contigs: Vec::new(),
        }
    }

    /// Record a canonical k-mer, leaving it unassigned. No-op if present.
    pub fn insert_kmer(&mut self, rep: Kmer) {
        if let std::collections::hash_map::Entry::Vacant(v) = self.kmap.entry(rep) {
            v.insert(KmerEntry::unassigned());
            self.order.push(rep);
        }
    }

    /// Insert a k-mer with a pre-built entry (used when loading from disk).
    pub(crate) fn insert_raw(&mut self, rep: Kmer, entry: KmerEntry) {
        if self.kmap.insert(rep, entry).is_none() {
            self.order.push(rep);
        }
    }

    /// Look up a canonical k-mer.
    #[inline]
    pub fn find(&self, rep: &Kmer) -> Option<&KmerEntry> {
        self.kmap.get(rep)
    }

    /// Mutable lookup of a canonical k-mer.
    #[inline]
    pub fn find_mut(&mut self, rep: &Kmer) -> Option<&mut KmerEntry> {
        self.kmap.get_mut(rep)
    }

    /// Whether a canonical k-mer is present.
    #[inline]
    pub fn contains(&self, rep: &Kmer) -> bool {
        self.kmap.contains_key(rep)
    }

    /// Number of distinct canonical k-mers.
    #[inline]
    pub fn nb_kmers(&self) -> usize {
        self.kmap.len()
    }

    /// Number of contigs.
    #[inline]
    pub fn num_contigs(&self) -> usize {
        self.contigs.len()
    }

    /// The `i`-th k-mer in insertion order.
    #[inline]
    pub(crate) fn kmer_at(&self, i: usize) -> Kmer {
        self.order[i]
    }

    /// Iterate `(canonical k-mer, entry)` pairs in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&Kmer, &KmerEntry)> {
        self.order.iter().map(move |km| (km, &self.kmap[km]))
    }

    /// Copy each contig's equivalence class onto its k-mer entries.
    pub(crate) fn sync_entry_ecs(&mut self) {
        let contigs = &self.contigs;
        for e in self.kmap.values_mut() {
            if e.id >= 0 {
                e.ec = contigs[e.id as usize].ec;
            }
        }
    }

    /// The unique forward extension of `km`, if any.
    ///
    /// Succeeds only when exactly one of the four forward neighbors of `km`
    /// is present and that neighbor has exactly one backward neighbor (the
    /// symmetric test that stops a walk at branching nodes), and the
    /// extension is not `km` itself.
    pub fn fw_step(&self, km: Kmer) -> Option<Kmer> {
        let mut fw = None;
        for code in 0..4u8 {
            let cand = km.forward_base_code(code);
            if self.contains(&cand.rep()) {
                if fw.is_some() {
                    return None;
                }
                fw = Some(cand);
            }
        }
        let fw = fw?;

        let mut bw_count = 0;
        for code in 0..4u8 {
            if self.contains(&fw.backward_base_code(code).rep()) {
                bw_count += 1;
                if bw_count > 1 {
                    return None;
                }
            }
        }

        if bw_count == 1 && fw != km { Some(fw) } else { None }
    }
}

impl Default for DbGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for DbGraph {
    fn eq(&self, other: &Self) -> bool {
        self.kmap == other.kmap && self.order == other.order && self.contigs == other.contigs
    }
}

impl Eq for DbGraph {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
