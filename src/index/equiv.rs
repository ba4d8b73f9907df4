//! Equivalence-class construction.
//!
//! Proceeds in four passes over the freshly built graph:
//!
//! 1. **Coverage**: walk each transcript and record, per contig, which
//!    interval of the contig the transcript covers and in which orientation
//!    (`TrInfo`). The walk jumps a whole contig at a time.
//! 2. **Split**: a contig whose coverage intervals do not all span it exactly
//!    is cut at every interval endpoint, so that afterwards every k-mer of a
//!    contig is covered by the same transcript set.
//! 3. **Intern**: the sorted, deduplicated transcript set of each contig is
//!    interned into `ecmap`/`ecmapinv`; the contig records its class id.
//! 4. **Occurrences**: walk each transcript again, recording the contig
//!    occurrence list and re-deriving the transcript from contig sequences as
//!    a consistency check.

use ahash::RandomState;
use std::collections::HashMap;
use tracing::info;

use super::dbg::{ContigToTranscript, Contig, DbGraph};
use super::kmer::{revcomp, KmerScanner};
use crate::error::IndexError;

/// Transient per-contig coverage record: transcript `trid` covers contig
/// positions `[start, stop)` in orientation `sense`.
#[derive(Debug, Clone, Copy)]
struct TrInfo {
    trid: i32,
    start: i32,
    stop: i32,
    sense: bool,
}

/// Compute per-contig equivalence classes for the graph.
///
/// `ecmap` must already hold the singleton classes `{0}, {1}, …` for every
/// transcript, with `ecmapinv` mirroring them.
pub(crate) fn build_equivalence_classes(
    dbg: &mut DbGraph,
    k: usize,
    seqs: &[String],
    ecmap: &mut Vec<Vec<i32>>,
    ecmapinv: &mut HashMap<Vec<i32>, i32, RandomState>,
) -> Result<(), IndexError> {
    info!("creating equivalence classes");

    let mut trinfos = compute_coverage(dbg, k, seqs)?;
    fix_split_contigs(dbg, k, &mut trinfos)?;
    intern_classes(dbg, &trinfos, ecmap, ecmapinv)?;
    dbg.sync_entry_ecs();
    populate_occurrences(dbg, k, seqs)?;

    info!(
        "target de Bruijn graph has {} contigs and contains {} k-mers",
        dbg.num_contigs(),
        dbg.nb_kmers()
    );
    Ok(())
}

/// Pass 1: record which contig intervals each transcript covers.
fn compute_coverage(
    dbg: &DbGraph,
    k: usize,
    seqs: &[String],
) -> Result<Vec<Vec<TrInfo>>, IndexError> {
    let mut trinfos: Vec<Vec<TrInfo>> = vec![Vec::new(); dbg.num_contigs()];

    for (i, seq) in seqs.iter().enumerate() {
        let bytes = seq.as_bytes();
        if bytes.len() < k {
            continue;
        }
        // number of k-mers in the transcript
        let seqlen = (bytes.len() - k + 1) as i32;

        let mut kit = KmerScanner::new(bytes, k);
        while let Some((x, posu)) = kit.next() {
            let pos = posu as i32;
            let xr = x.rep();
            let val = dbg
                .find(&xr)
                .ok_or_else(|| IndexError::invariant("transcript k-mer absent from graph"))?;
            let forward = x == xr;

            let (tr, jump) = if forward == val.is_fw() {
                let start = val.pos();
                if val.length - start > seqlen - pos {
                    // transcript ends inside the contig
                    (
                        TrInfo {
                            trid: i as i32,
                            start,
                            stop: start + seqlen - pos,
                            sense: true,
                        },
                        seqlen,
                    )
                } else {
                    let stop = val.length;
                    (
                        TrInfo {
                            trid: i as i32,
                            start,
                            stop,
                            sense: true,
                        },
                        pos + (stop - start) - 1,
                    )
                }
            } else {
                let stop = val.pos() + 1;
                let stpos = stop - (seqlen - pos);
                if stpos > 0 {
                    (
                        TrInfo {
                            trid: i as i32,
                            start: stpos,
                            stop,
                            sense: false,
                        },
                        seqlen,
                    )
                } else {
                    (
                        TrInfo {
                            trid: i as i32,
                            start: 0,
                            stop,
                            sense: false,
                        },
                        pos + stop - 1,
                    )
                }
            };

            trinfos[val.id as usize].push(tr);
            // resume at the first k-mer past the covered stretch
            kit.jump_to((jump + 1) as usize);
        }
    }

    Ok(trinfos)
}

/// Pass 2: split contigs at coverage-interval endpoints.
///
/// Every interval endpoint of every `TrInfo` of a contig becomes a breakpoint;
/// the slices between consecutive breakpoints become contigs of their own (the
/// first slice keeps the original id), their k-mer entries are re-keyed, and
/// the coverage records are narrowed to full slices.
fn fix_split_contigs(
    dbg: &mut DbGraph,
    k: usize,
    trinfos: &mut Vec<Vec<TrInfo>>,
) -> Result<(), IndexError> {
    let original = dbg.num_contigs();
    for ind in 0..original {
        let contig_len = dbg.contigs[ind].length;
        let mut all = true;
        for x in &trinfos[ind] {
            debug_assert!(x.start < x.stop && x.stop <= contig_len);
            if x.start != 0 || x.stop != contig_len {
                all = false;
            }
        }
        if all {
            continue;
        }

        let mut brpoints: Vec<i32> = Vec::with_capacity(2 * trinfos[ind].len());
        for x in &trinfos[ind] {
            brpoints.push(x.start);
            brpoints.push(x.stop);
        }
        brpoints.sort_unstable();
        brpoints.dedup();
        if brpoints.first() != Some(&0) || brpoints.last() != Some(&contig_len) {
            return Err(IndexError::invariant(
                "contig coverage does not reach both contig ends",
            ));
        }

        let seq = dbg.contigs[ind].seq.clone();
        let old = std::mem::take(&mut trinfos[ind]);

        for j in 1..brpoints.len() {
            let (lo, hi) = (brpoints[j - 1], brpoints[j]);
            let new_length = hi - lo;
            let sub = &seq[lo as usize..hi as usize + k - 1];
            let new_id = if j == 1 {
                ind as i32
            } else {
                dbg.num_contigs() as i32
            };

            // re-key the slice's k-mers
            let mut kit = KmerScanner::new(sub.as_bytes(), k);
            while let Some((x, p)) = kit.next() {
                let xr = x.rep();
                let forward = x == xr;
                let entry = dbg
                    .find_mut(&xr)
                    .ok_or_else(|| IndexError::invariant("k-mer missing during contig split"))?;
                *entry = super::dbg::KmerEntry::new(new_id, new_length, p as i32, forward);
            }

            let newc = Contig {
                id: new_id,
                length: new_length,
                seq: sub.to_string(),
                ec: -1,
                transcripts: Vec::new(),
            };
            let newtr: Vec<TrInfo> = old
                .iter()
                .filter(|x| !(x.stop <= lo || x.start >= hi))
                .map(|x| TrInfo {
                    trid: x.trid,
                    start: 0,
                    stop: new_length,
                    sense: x.sense,
                })
                .collect();

            if j == 1 {
                dbg.contigs[ind] = newc;
                trinfos[ind] = newtr;
            } else {
                dbg.contigs.push(newc);
                trinfos.push(newtr);
            }
        }
    }
    Ok(())
}

/// Pass 3: intern each contig's transcript set as an equivalence class.
fn intern_classes(
    dbg: &mut DbGraph,
    trinfos: &[Vec<TrInfo>],
    ecmap: &mut Vec<Vec<i32>>,
    ecmapinv: &mut HashMap<Vec<i32>, i32, RandomState>,
) -> Result<(), IndexError> {
    for ind in 0..dbg.num_contigs() {
        let mut u: Vec<i32> = trinfos[ind].iter().map(|x| x.trid).collect();
        u.sort_unstable();
        u.dedup();
        if u.is_empty() {
            return Err(IndexError::invariant("contig covered by no transcript"));
        }

        let next_ec = ecmap.len() as i32;
        let ec = *ecmapinv.entry(u.clone()).or_insert_with(|| {
            ecmap.push(u);
            next_ec
        });
        dbg.contigs[ind].ec = ec;
    }
    Ok(())
}

/// Pass 4: record contig occurrences on each transcript and verify that the
/// contigs re-derive the transcript exactly.
fn populate_occurrences(dbg: &mut DbGraph, k: usize, seqs: &[String]) -> Result<(), IndexError> {
    for (i, seq) in seqs.iter().enumerate() {
        let bytes = seq.as_bytes();
        let mut derived = String::with_capacity(bytes.len());

        let mut kit = KmerScanner::new(bytes, k);
        while let Some((x, posu)) = kit.next() {
            let pos = posu as i32;
            let xr = x.rep();
            let val = *dbg
                .find(&xr)
                .ok_or_else(|| IndexError::invariant("transcript k-mer absent from graph"))?;
            let forward = x == xr;
            let sense = forward == val.is_fw();

            let contig = &mut dbg.contigs[val.id as usize];
            contig.transcripts.push(ContigToTranscript {
                trid: i as i32,
                pos,
                sense,
            });

            if sense {
                if pos == 0 {
                    derived.push_str(&contig.seq);
                } else {
                    derived.push_str(&contig.seq[k - 1..]);
                }
            } else {
                let r = revcomp(&contig.seq);
                if pos == 0 {
                    derived.push_str(&r);
                } else {
                    derived.push_str(&r[k - 1..]);
                }
            }

            kit.jump_to((pos + val.length) as usize);
        }

        if bytes.len() >= k && derived != *seq {
            return Err(IndexError::invariant(format!(
                "contig tiling does not reproduce transcript {i}"
            )));
        }
    }

    // Each recorded occurrence must read back out of the transcript.
    #[cfg(debug_assertions)]
    for c in &dbg.contigs {
        for occ in &c.transcripts {
            let r = if occ.sense {
                c.seq.clone()
            } else {
                revcomp(&c.seq)
            };
            let t = &seqs[occ.trid as usize];
            let lo = occ.pos as usize;
            debug_assert_eq!(r, t[lo..lo + r.len()], "contig occurrence mismatch");
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::super::build::build_de_bruijn_graph;
    use super::super::dbg::deterministic_state;
    use super::*;

    fn build_all(seqs: &[&str], k: usize) -> (DbGraph, Vec<Vec<i32>>) {
        let seqs: Vec<String> = seqs.iter().map(|s| s.to_string()).collect();
        let mut dbg = DbGraph::new();
        build_de_bruijn_graph(&mut dbg, k, &seqs).unwrap();

        let mut ecmap: Vec<Vec<i32>> = (0..seqs.len() as i32).map(|i| vec![i]).collect();
        let mut ecmapinv = HashMap::with_hasher(deterministic_state());
        for (i, v) in ecmap.iter().enumerate() {
            ecmapinv.insert(v.clone(), i as i32);
        }
        build_equivalence_classes(&mut dbg, k, &seqs, &mut ecmap, &mut ecmapinv).unwrap();
        (dbg, ecmap)
    }

    #[test]
    fn test_single_transcript_singleton_class() {
        let (dbg, ecmap) = build_all(&["ACCGTTAGCA"], 5);
        assert_eq!(ecmap, vec![vec![0]]);
        assert_eq!(dbg.num_contigs(), 1);
        assert_eq!(dbg.contigs[0].ec, 0);
        for (_, e) in dbg.entries() {
            assert_eq!(e.ec, 0);
        }
    }

    #[test]
    fn test_identical_transcripts_share_class() {
        let (dbg, ecmap) = build_all(&["ACCGTTAGCA", "ACCGTTAGCA"], 5);
        // singletons first, then the merged class
        assert_eq!(ecmap, vec![vec![0], vec![1], vec![0, 1]]);
        assert_eq!(dbg.num_contigs(), 1);
        assert_eq!(dbg.contigs[0].ec, 2);
    }

    #[test]
    fn test_shared_prefix_membership() {
        let (dbg, ecmap) = build_all(&["AAAAACCCCC", "AAAAAGGGGG"], 5);
        let ec_of = |s: &str| {
            let km = super::super::kmer::Kmer::from_str(s, 5).unwrap();
            let e = dbg.find(&km.rep()).unwrap();
            ecmap[e.ec as usize].clone()
        };
        // the shared prefix and the shared terminal k-mer belong to both
        assert_eq!(ec_of("AAAAA"), vec![0, 1]);
        assert_eq!(ec_of("CCCCC"), vec![0, 1]);
        // the divergent tails are private
        assert_eq!(ec_of("AAACC"), vec![0]);
        assert_eq!(ec_of("AAGGG"), vec![1]);
    }

    #[test]
    fn test_reverse_complement_transcript_occurrences() {
        let (dbg, ecmap) = build_all(&["ACCGTTAGCA", "TGCTAACGGT"], 5);
        assert_eq!(dbg.num_contigs(), 1);
        let c = &dbg.contigs[0];
        assert_eq!(ecmap[c.ec as usize], vec![0, 1]);
        assert_eq!(c.transcripts.len(), 2);
        let s0 = c.transcripts.iter().find(|o| o.trid == 0).unwrap();
        let s1 = c.transcripts.iter().find(|o| o.trid == 1).unwrap();
        assert_eq!(s0.pos, 0);
        assert_eq!(s1.pos, 0);
        assert_ne!(s0.sense, s1.sense);
    }

    #[test]
    fn test_split_contig_full_coverage_after() {
        // T1 equals the back half of T0: the single contig of T0 must split
        // at T1's entry point, and afterwards every contig is covered fully
        // by each of its transcripts.
        let (dbg, ecmap) = build_all(&["ACCGTTAGCA", "TAGCA"], 5);
        assert_eq!(dbg.num_contigs(), 2);
        for c in &dbg.contigs {
            for occ in &c.transcripts {
                assert!(occ.pos >= 0);
            }
            assert!(c.ec >= 0);
        }
        let km = super::super::kmer::Kmer::from_str("TAGCA", 5).unwrap();
        let e = dbg.find(&km.rep()).unwrap();
        assert_eq!(ecmap[e.ec as usize], vec![0, 1]);
        let km = super::super::kmer::Kmer::from_str("ACCGT", 5).unwrap();
        let e = dbg.find(&km.rep()).unwrap();
        assert_eq!(ecmap[e.ec as usize], vec![0]);
    }

    #[test]
    fn test_kmers_of_a_contig_share_its_class() {
        let (dbg, ecmap) = build_all(&["AAAAACCCCC", "AAAAAGGGGG", "ACCGTTAGCA"], 5);
        for (_, e) in dbg.entries() {
            let c = &dbg.contigs[e.id as usize];
            assert_eq!(e.ec, c.ec);
            assert!(!ecmap[c.ec as usize].is_empty());
        }
    }
}
