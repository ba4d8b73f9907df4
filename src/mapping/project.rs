//! Projection of matched k-mers to transcript coordinates, and
//! equivalence-class intersection.

use crate::index::dbg::KmerEntry;
use crate::index::kmer::Kmer;
use crate::index::KmerIndex;

impl KmerIndex {
    /// Project a matched k-mer onto transcript `tr`.
    ///
    /// `km` is the `p`-th k-mer of a read and `val` its graph entry. Returns
    /// the 1-based position of the read's first base on `tr` together with
    /// the strand the read maps to; `(-1, true)` when `val`'s contig does not
    /// occur on `tr`.
    pub fn find_position(&self, tr: i32, km: Kmer, val: &KmerEntry, p: i32) -> (i32, bool) {
        let fw = km == km.rep();
        let csense = fw == val.is_fw();

        if val.id < 0 {
            return (-1, true);
        }
        let contig = &self.dbg.contigs[val.id as usize];
        let Some(occ) = contig.transcripts.iter().find(|occ| occ.trid == tr) else {
            return (-1, true);
        };
        let (trpos, trsense) = (occ.pos, occ.sense);
        let k = self.k as i32;

        if trsense {
            if csense {
                (trpos + val.pos() - p + 1, csense)
            } else {
                (trpos + val.pos() + k + p, csense)
            }
        } else if csense {
            (trpos + (val.length - val.pos() - 1) + k + p, !csense)
        } else {
            (trpos + (val.length - val.pos()) - p, !csense)
        }
    }

    /// [`KmerIndex::find_position`] with the graph lookup included.
    ///
    /// Returns `(-1, true)` when `km` is not in the graph.
    pub fn find_position_for_kmer(&self, tr: i32, km: Kmer, p: i32) -> (i32, bool) {
        match self.dbg.find(&km.rep()) {
            Some(val) => self.find_position(tr, km, val, p),
            None => (-1, true),
        }
    }

    /// Sorted intersection of equivalence class `ec` with the sorted,
    /// duplicate-free transcript list `v`.
    ///
    /// Empty when `ec` is not a known class.
    pub fn intersect(&self, ec: i32, v: &[i32]) -> Vec<i32> {
        let mut res = Vec::new();
        let Some(u) = self.ecmap.get(ec as usize) else {
            return res;
        };
        res.reserve(v.len().min(u.len()));

        let (mut a, mut b) = (0, 0);
        while a < u.len() && b < v.len() {
            match u[a].cmp(&v[b]) {
                std::cmp::Ordering::Less => a += 1,
                std::cmp::Ordering::Greater => b += 1,
                std::cmp::Ordering::Equal => {
                    res.push(u[a]);
                    a += 1;
                    b += 1;
                }
            }
        }
        res
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::kmer::KmerScanner;
    use crate::index::DEFAULT_SKIP;
    use crate::io::transcripts::Transcript;

    fn index_of(seqs: &[&str], k: usize) -> KmerIndex {
        let txs: Vec<Transcript> = seqs
            .iter()
            .enumerate()
            .map(|(i, s)| Transcript::new(format!("t{i}"), *s))
            .collect();
        KmerIndex::build(k, DEFAULT_SKIP, &txs).unwrap()
    }

    /// Every k-mer of every transcript projects back to its own 1-based
    /// position, on the sense strand.
    #[test]
    fn test_find_position_roundtrip() {
        let seqs = ["ACCGTTAGCA", "TGCTAACGGT", "AAAAACCCCC", "AAAAAGGGGG"];
        let idx = index_of(&seqs, 5);
        for (tr, seq) in seqs.iter().enumerate() {
            let mut kit = KmerScanner::new(seq.as_bytes(), 5);
            while let Some((km, p)) = kit.next() {
                let (pos, sense) = idx.find_position_for_kmer(tr as i32, km, 0);
                assert_eq!(
                    (pos, sense),
                    (p as i32 + 1, true),
                    "transcript {tr}, k-mer at {p}"
                );
            }
        }
    }

    /// A read k-mer taken in reverse complement projects to the far end of
    /// its window, on the antisense strand.
    #[test]
    fn test_find_position_rc_kmer() {
        let seq = "ACCGTTAGCA";
        let idx = index_of(&[seq], 5);
        let mut kit = KmerScanner::new(seq.as_bytes(), 5);
        while let Some((km, p)) = kit.next() {
            let (pos, sense) = idx.find_position_for_kmer(0, km.twin(), 0);
            assert_eq!((pos, sense), (p as i32 + 5, false), "k-mer at {p}");
        }
    }

    #[test]
    fn test_find_position_read_offset() {
        // km is the 2nd k-mer (offset 2) of a read starting at position 3
        let seq = "ACCGTTAGCA";
        let idx = index_of(&[seq], 5);
        let km = crate::index::kmer::Kmer::from_str("TAGCA", 5).unwrap();
        let (pos, sense) = idx.find_position_for_kmer(0, km, 2);
        assert_eq!((pos, sense), (4, true));
    }

    #[test]
    fn test_find_position_absent_transcript() {
        let idx = index_of(&["ACCGTTAGCA", "AAAAACCCCC"], 5);
        let km = crate::index::kmer::Kmer::from_str("ACCGT", 5).unwrap();
        // transcript 1 does not contain this k-mer's contig
        assert_eq!(idx.find_position_for_kmer(1, km, 0), (-1, true));
        // k-mer absent from the graph entirely
        let km = crate::index::kmer::Kmer::from_str("GTGTG", 5).unwrap();
        assert_eq!(idx.find_position_for_kmer(0, km, 0), (-1, true));
    }

    #[test]
    fn test_intersect() {
        let idx = index_of(&["AAAAACCCCC", "AAAAAGGGGG"], 5);
        // the AAAAA contig's class is {0, 1}
        let km = crate::index::kmer::Kmer::from_str("AAAAA", 5).unwrap();
        let ec = idx.graph().find(&km.rep()).unwrap().ec;
        assert_eq!(idx.intersect(ec, &[0, 1]), vec![0, 1]);
        assert_eq!(idx.intersect(ec, &[1]), vec![1]);
        assert_eq!(idx.intersect(ec, &[2, 7]), Vec::<i32>::new());
        // unknown class id intersects to nothing
        assert_eq!(idx.intersect(1_000, &[0, 1]), Vec::<i32>::new());
    }
}
