//! Graph construction — partitions the canonical k-mer set into contigs.
//!
//! Every k-mer of every transcript is first recorded in the graph hash, then
//! each unvisited k-mer seeds a walk that extends forward and backward while
//! [`DbGraph::fw_step`] finds a unique continuation. The collected k-mer list
//! becomes one contig; each of its k-mers gets an entry recording the contig
//! id, its offset, and its orientation relative to canonical.

use tracing::info;

use super::dbg::{Contig, DbGraph, KmerEntry};
use super::kmer::{Kmer, KmerScanner};
use crate::error::IndexError;

/// Build the compacted de Bruijn graph over the k-mers of `seqs`.
pub(crate) fn build_de_bruijn_graph(
    dbg: &mut DbGraph,
    k: usize,
    seqs: &[String],
) -> Result<(), IndexError> {
    info!("counting k-mers");
    for seq in seqs {
        let mut kit = KmerScanner::new(seq.as_bytes(), k);
        while let Some((x, _)) = kit.next() {
            dbg.insert_kmer(x.rep());
        }
    }
    info!("{} distinct k-mers", dbg.nb_kmers());

    info!("building target de Bruijn graph");
    for i in 0..dbg.nb_kmers() {
        let km = dbg.kmer_at(i);
        let assigned = dbg
            .find(&km)
            .ok_or_else(|| IndexError::invariant("k-mer vanished during graph walk"))?
            .id
            >= 0;
        if assigned {
            continue;
        }

        let klist = walk_contig(dbg, km);

        let contig_len = klist.len() as i32;
        let id = dbg.num_contigs() as i32;
        let mut seq = String::with_capacity(klist.len() + k - 1);
        seq.push_str(&klist[0].to_string());
        for x in &klist[1..] {
            seq.push(x.base(k - 1) as char);
        }

        for (pos, x) in klist.iter().enumerate() {
            let xr = x.rep();
            let forward = *x == xr;
            let entry = dbg
                .find_mut(&xr)
                .ok_or_else(|| IndexError::invariant("k-mer missing during contig assignment"))?;
            debug_assert_eq!(entry.id, -1);
            *entry = KmerEntry::new(id, contig_len, pos as i32, forward);
        }

        dbg.contigs.push(Contig {
            id,
            length: contig_len,
            seq,
            ec: -1,
            transcripts: Vec::new(),
        });
    }

    Ok(())
}

/// Walk the maximal unambiguous path through `km`.
///
/// Returns the contig's k-mers in walk orientation. Extension stops at
/// branches (via `fw_step`), at self-loops (the walk returns to its start),
/// at Möbius loops (the walk reaches the start's twin), and at hairpins (the
/// walk reaches the previous k-mer's twin, i.e. the path turns back on
/// itself).
fn walk_contig(dbg: &DbGraph, km: Kmer) -> Vec<Kmer> {
    let twin = km.twin();
    let mut flist = vec![km];
    let mut self_loop = false;

    let mut end = km;
    let mut last = end;
    while let Some(next) = dbg.fw_step(end) {
        end = next;
        if end == km {
            self_loop = true;
            break;
        } else if end == twin {
            // Möbius loop; a hairpin at the very first step is not a loop
            self_loop = flist.len() > 1;
            break;
        } else if end == last.twin() {
            break;
        }
        flist.push(end);
        last = end;
    }

    // Extend backward by walking forward from the twin.
    let mut blist = Vec::new();
    if !self_loop {
        let mut front = twin;
        let mut first = front;
        while let Some(next) = dbg.fw_step(front) {
            front = next;
            if front == twin || front == km || front == first.twin() {
                break;
            }
            blist.push(front);
            first = front;
        }
    }

    let mut klist = Vec::with_capacity(blist.len() + flist.len());
    klist.extend(blist.iter().rev().map(Kmer::twin));
    klist.extend(flist);
    klist
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_of(seqs: &[&str], k: usize) -> DbGraph {
        let seqs: Vec<String> = seqs.iter().map(|s| s.to_string()).collect();
        let mut dbg = DbGraph::new();
        build_de_bruijn_graph(&mut dbg, k, &seqs).unwrap();
        dbg
    }

    #[test]
    fn test_single_contig_spans_transcript() {
        // non-repetitive 10-mer: all six 5-mers extend uniquely
        let dbg = graph_of(&["ACCGTTAGCA"], 5);
        assert_eq!(dbg.num_contigs(), 1);
        assert_eq!(dbg.nb_kmers(), 6);
        let c = &dbg.contigs[0];
        assert_eq!(c.length, 6);
        assert!(c.seq == "ACCGTTAGCA" || c.seq == "TGCTAACGGT");
    }

    #[test]
    fn test_every_kmer_assigned() {
        let dbg = graph_of(&["ACCGTTAGCA", "AAAAACCCCC"], 5);
        for (_, e) in dbg.entries() {
            assert!(e.id >= 0);
            assert!(e.pos() < e.length);
            let c = &dbg.contigs[e.id as usize];
            assert_eq!(c.length, e.length);
        }
    }

    #[test]
    fn test_contig_positions_hold_their_kmers() {
        let dbg = graph_of(&["ACCGTTAGCA"], 5);
        for (km, e) in dbg.entries() {
            let c = &dbg.contigs[e.id as usize];
            let p = e.pos() as usize;
            let stored = Kmer::from_bytes(&c.seq.as_bytes()[p..p + 5], 5).unwrap();
            let expect = if e.is_fw() { *km } else { km.twin() };
            assert_eq!(stored, expect);
        }
    }

    #[test]
    fn test_branch_splits_contigs() {
        // shared AAAAA prefix, then divergent C/G tails
        let dbg = graph_of(&["AAAAACCCCC", "AAAAAGGGGG"], 5);
        // AAAAA alone; AAAAC..ACCCC; CCCCC (canonical with GGGGG); AAAAG..AGGGG
        assert_eq!(dbg.num_contigs(), 4);
        let km = Kmer::from_str("AAAAA", 5).unwrap();
        let e = dbg.find(&km.rep()).unwrap();
        assert_eq!(e.length, 1);
    }

    #[test]
    fn test_contig_seq_concatenates_kmers() {
        let dbg = graph_of(&["ACCGTTAGCA", "AAAAACCCCC"], 5);
        for c in &dbg.contigs {
            assert_eq!(c.seq.len(), c.length as usize + 4);
            // each window of the contig sequence is a k-mer of the graph
            for p in 0..c.length as usize {
                let km = Kmer::from_bytes(&c.seq.as_bytes()[p..p + 5], 5).unwrap();
                let e = dbg.find(&km.rep()).unwrap();
                assert_eq!(e.id, c.id);
                assert_eq!(e.pos(), p as i32);
            }
        }
    }
}
