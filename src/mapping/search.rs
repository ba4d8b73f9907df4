//! Skip-enabled k-mer scanning of reads.
//!
//! [`KmerIndex::match_read`] walks a read's k-mers and, on every hit, tries
//! to leap over the rest of the hit's contig instead of probing every
//! position: all k-mers of a contig share an equivalence class, so any one of
//! them witnesses the same class. The leap is verified by probing its landing
//! point; when the landing point disagrees, a midpoint probe and then an
//! incremental back-off keep the scan correct across contig boundaries.

use crate::index::dbg::KmerEntry;
use crate::index::kmer::KmerScanner;
use crate::index::KmerIndex;

/// What the probe at a jump's landing point revealed.
enum ProbeOutcome {
    /// Read exhausted before the landing point; keep the current hit and stop.
    PastEnd,
    /// Landing k-mer is absent or lies on the same contig; the jump stands.
    Confirmed,
    /// Landing k-mer lies on a different contig.
    Conflict(KmerEntry),
}

impl KmerIndex {
    /// Scan read `s`, appending `(entry, read_offset)` for each matched
    /// k-mer to `v`.
    ///
    /// An unmatched read simply contributes nothing; no error is raised.
    pub fn match_read(&self, s: &[u8], v: &mut Vec<(KmerEntry, i32)>) {
        let k = self.k;
        if s.len() < k {
            return;
        }
        let l = s.len() as i32;
        let tail = l - k as i32; // last valid k-mer offset
        let skip = self.skip.max(1);

        let mut kit = KmerScanner::new(s, k);
        while let Some((x, posu)) = kit.next() {
            let pos = posu as i32;
            let xr = x.rep();
            let Some(&val) = self.dbg.find(&xr) else {
                continue;
            };
            v.push((val, pos));

            let forward = x == xr;
            let dist = val.dist_to_end(forward);
            if dist < 2 {
                continue;
            }

            // Jump to the far junction end of this contig (clamped to the
            // read) and verify the landing point.
            let next_pos = (pos + dist).min(tail);
            let mut probe = kit.clone();
            probe.jump_to(next_pos as usize);

            let outcome = match probe.next() {
                None => ProbeOutcome::PastEnd,
                Some((x2, _)) => match self.dbg.find(&x2.rep()) {
                    None => ProbeOutcome::Confirmed,
                    Some(&val2) if val2.id == val.id => ProbeOutcome::Confirmed,
                    Some(&val2) => ProbeOutcome::Conflict(val2),
                },
            };

            match outcome {
                ProbeOutcome::PastEnd => break,
                ProbeOutcome::Confirmed => {
                    if pos + dist >= tail {
                        // the contig extends past the read
                        v.push((val, tail));
                        break;
                    }
                    v.push((val, next_pos));
                    kit = probe;
                }
                ProbeOutcome::Conflict(val2) => {
                    // Landed on a different contig. For a long jump, a
                    // midpoint probe can still rescue the leap: if the middle
                    // k-mer sits on either contig the read is consistent with
                    // the graph and scanning resumes past the landing point.
                    let mut found_middle = false;
                    if dist > 4 {
                        let middle_pos = (pos + next_pos) / 2;
                        let mut mid = kit.clone();
                        mid.jump_to(middle_pos as usize);
                        if let Some((x3, _)) = mid.next() {
                            if let Some(&val3) = self.dbg.find(&x3.rep()) {
                                if val3.id == val.id {
                                    v.push((val3, middle_pos));
                                    found_middle = true;
                                } else if val3.id == val2.id {
                                    v.push((val3, pos + dist));
                                    found_middle = true;
                                }
                            }
                        }
                        if found_middle {
                            if next_pos >= tail {
                                break;
                            }
                            kit = probe;
                        }
                    }

                    if !found_middle {
                        // Back off: probe every `skip`-th k-mer up to the
                        // jump target, then resume leaping.
                        let mut j = 0;
                        while let Some((xb, pbu)) = kit.next() {
                            let pb = pbu as i32;
                            if j == 0 {
                                if let Some(&vb) = self.dbg.find(&xb.rep()) {
                                    v.push((vb, pb));
                                }
                            }
                            j = (j + 1) % skip;
                            if pb >= next_pos {
                                break;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Fragment length of a read pair, or `-1` for an unmappable pair.
    ///
    /// The first matching k-mer of each mate must land on the same contig on
    /// opposite inferred strands; the fragment length is then the distance
    /// between the mates' inferred 5' positions on that contig.
    pub fn map_pair(&self, s1: &[u8], s2: &[u8]) -> i32 {
        let Some((p1, d1, c1)) = self.first_hit(s1) else {
            return -1;
        };
        let Some((p2, d2, c2)) = self.first_hit(s2) else {
            return -1;
        };
        if c1 != c2 || d1 == d2 {
            return -1;
        }
        (p1 - p2).abs()
    }

    /// Inferred 5' position, strand, and contig of the first matched k-mer.
    fn first_hit(&self, s: &[u8]) -> Option<(i32, bool, i32)> {
        let mut kit = KmerScanner::new(s, self.k);
        while let Some((x, posu)) = kit.next() {
            let pos = posu as i32;
            let xr = x.rep();
            if let Some(val) = self.dbg.find(&xr) {
                let forward = x == xr;
                return Some(if forward == val.is_fw() {
                    (val.pos() - pos, true, val.id)
                } else {
                    (val.pos() + self.k as i32 + pos, false, val.id)
                });
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
