//! Versioned binary serialization of the index.
//!
//! Little-endian, no padding, fields in order:
//!
//! ```text
//! [version: u64]                        must equal INDEX_VERSION
//! [k: i32] [num_trans: i32]
//! [target_lens: i32 × num_trans]
//! [kmap_size: u64]
//! kmap_size × { kmer: u64, _pos: u32, length: i32, id: i32, ec: i32 }
//! [ecmap_size: u64]
//! ecmap_size × { id: i32, size: u64, members: i32 × size }
//! num_trans × { name_len: u64, name_bytes }
//! [contig_count: u64]
//! contig_count × { id: i32, length: i32, seq_len: u64, seq_bytes,
//!                  tx_count: u64, tx_count × { trid: i32, pos: i32, sense: u8 } }
//! contig_count × { ec: i32 }
//! ```
//!
//! The k-mer map is written in insertion order, so two builds from the same
//! input produce byte-identical files. A header-only variant (for tools that
//! need only names and lengths) writes `kmap_size = 0` and `contig_count = 0`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::info;

use super::dbg::{Contig, ContigToTranscript, DbGraph, KmerEntry};
use super::kmer::Kmer;
use super::{check_k, KmerIndex, DEFAULT_SKIP, INDEX_VERSION};
use crate::error::IndexError;

impl KmerIndex {
    /// Write the index to `path`.
    ///
    /// With `write_kmer_table == false` only the header sections (version,
    /// k, target lengths, equivalence classes, names) carry content; such a
    /// file is not queryable.
    pub fn write(&self, path: impl AsRef<Path>, write_kmer_table: bool) -> Result<(), IndexError> {
        let file = File::create(path.as_ref())?;
        let mut w = BufWriter::new(file);
        self.write_to(&mut w, write_kmer_table)?;
        w.flush()?;
        info!("index written to {}", path.as_ref().display());
        Ok(())
    }

    /// Serialize the index to a writer.
    pub fn write_to<W: Write>(&self, w: &mut W, write_kmer_table: bool) -> Result<(), IndexError> {
        w.write_all(&INDEX_VERSION.to_le_bytes())?;
        w.write_all(&(self.k as i32).to_le_bytes())?;
        w.write_all(&self.num_trans.to_le_bytes())?;
        for &len in &self.target_lens {
            w.write_all(&len.to_le_bytes())?;
        }

        if write_kmer_table {
            w.write_all(&(self.dbg.nb_kmers() as u64).to_le_bytes())?;
            for (km, e) in self.dbg.entries() {
                w.write_all(&km.bits().to_le_bytes())?;
                w.write_all(&e.pos_word().to_le_bytes())?;
                w.write_all(&e.length.to_le_bytes())?;
                w.write_all(&e.id.to_le_bytes())?;
                w.write_all(&e.ec.to_le_bytes())?;
            }
        } else {
            w.write_all(&0u64.to_le_bytes())?;
        }

        w.write_all(&(self.ecmap.len() as u64).to_le_bytes())?;
        for (ec, members) in self.ecmap.iter().enumerate() {
            w.write_all(&(ec as i32).to_le_bytes())?;
            w.write_all(&(members.len() as u64).to_le_bytes())?;
            for &trid in members {
                w.write_all(&trid.to_le_bytes())?;
            }
        }

        for name in &self.target_names {
            w.write_all(&(name.len() as u64).to_le_bytes())?;
            w.write_all(name.as_bytes())?;
        }

        if write_kmer_table {
            w.write_all(&(self.dbg.num_contigs() as u64).to_le_bytes())?;
            for c in &self.dbg.contigs {
                w.write_all(&c.id.to_le_bytes())?;
                w.write_all(&c.length.to_le_bytes())?;
                w.write_all(&(c.seq.len() as u64).to_le_bytes())?;
                w.write_all(c.seq.as_bytes())?;
                w.write_all(&(c.transcripts.len() as u64).to_le_bytes())?;
                for occ in &c.transcripts {
                    w.write_all(&occ.trid.to_le_bytes())?;
                    w.write_all(&occ.pos.to_le_bytes())?;
                    w.write_all(&[occ.sense as u8])?;
                }
            }
            for c in &self.dbg.contigs {
                w.write_all(&c.ec.to_le_bytes())?;
            }
        } else {
            w.write_all(&0u64.to_le_bytes())?;
        }

        Ok(())
    }

    /// Load an index from `path`.
    ///
    /// With `load_kmer_table == false` the k-mer records are read past but
    /// not kept; the result serves target metadata only.
    pub fn load(path: impl AsRef<Path>, load_kmer_table: bool) -> Result<Self, IndexError> {
        let file = File::open(path.as_ref())?;
        let mut r = BufReader::new(file);
        let idx = Self::load_from(&mut r, load_kmer_table)?;
        info!(
            "loaded index from {}: k={}, {} targets, {} k-mers, {} contigs",
            path.as_ref().display(),
            idx.k,
            idx.num_trans,
            idx.nb_kmers(),
            idx.num_contigs(),
        );
        Ok(idx)
    }

    /// Deserialize an index from a reader.
    pub fn load_from<R: Read>(r: &mut R, load_kmer_table: bool) -> Result<Self, IndexError> {
        let version = read_u64(r)?;
        if version != INDEX_VERSION {
            return Err(IndexError::VersionMismatch {
                found: version,
                expected: INDEX_VERSION,
            });
        }

        let k = read_i32(r)? as usize;
        check_k(k)?;
        let num_trans = read_i32(r)?;

        let mut target_lens = Vec::with_capacity(num_trans as usize);
        for _ in 0..num_trans {
            target_lens.push(read_i32(r)?);
        }

        let kmap_size = read_u64(r)?;
        let mut dbg = DbGraph::new();
        for _ in 0..kmap_size {
            let bits = read_u64(r)?;
            let pos_word = read_u32(r)?;
            let length = read_i32(r)?;
            let id = read_i32(r)?;
            let ec = read_i32(r)?;
            if load_kmer_table {
                dbg.insert_raw(
                    Kmer::from_bits(bits, k),
                    KmerEntry::from_raw(pos_word, length, id, ec),
                );
            }
        }

        let ecmap_size = read_u64(r)?;
        let mut ecmap: Vec<Vec<i32>> = vec![Vec::new(); ecmap_size as usize];
        let mut ecmapinv = std::collections::HashMap::with_hasher(super::deterministic_state());
        for _ in 0..ecmap_size {
            let id = read_i32(r)?;
            if id < 0 || id as u64 >= ecmap_size {
                return Err(IndexError::invariant(format!(
                    "equivalence class id {id} out of range"
                )));
            }
            let size = read_u64(r)?;
            let mut members = Vec::with_capacity(size as usize);
            for _ in 0..size {
                members.push(read_i32(r)?);
            }
            ecmapinv.insert(members.clone(), id);
            ecmap[id as usize] = members;
        }

        let mut target_names = Vec::with_capacity(num_trans as usize);
        for _ in 0..num_trans {
            let len = read_u64(r)? as usize;
            let mut buf = vec![0u8; len];
            r.read_exact(&mut buf)?;
            let name = String::from_utf8(buf).map_err(|e| {
                IndexError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("target name is not UTF-8: {e}"),
                ))
            })?;
            target_names.push(name);
        }

        let contig_count = read_u64(r)?;
        let mut contigs = Vec::with_capacity(contig_count as usize);
        for _ in 0..contig_count {
            let id = read_i32(r)?;
            let length = read_i32(r)?;
            let seq_len = read_u64(r)? as usize;
            let mut buf = vec![0u8; seq_len];
            r.read_exact(&mut buf)?;
            let seq = String::from_utf8(buf).map_err(|e| {
                IndexError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("contig sequence is not UTF-8: {e}"),
                ))
            })?;

            let tx_count = read_u64(r)?;
            let mut transcripts = Vec::with_capacity(tx_count as usize);
            for _ in 0..tx_count {
                let trid = read_i32(r)?;
                let pos = read_i32(r)?;
                let mut sense = [0u8; 1];
                r.read_exact(&mut sense)?;
                transcripts.push(ContigToTranscript {
                    trid,
                    pos,
                    sense: sense[0] != 0,
                });
            }

            contigs.push(Contig {
                id,
                length,
                seq,
                ec: -1,
                transcripts,
            });
        }
        for i in 0..contig_count as usize {
            contigs[i].ec = read_i32(r)?;
        }
        dbg.contigs = contigs;

        Ok(Self {
            k,
            num_trans,
            skip: DEFAULT_SKIP,
            dbg,
            ecmap,
            ecmapinv,
            target_names,
            target_lens,
            target_seqs: std::sync::OnceLock::new(),
        })
    }
}

fn read_u64<R: Read>(r: &mut R) -> std::io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_u32<R: Read>(r: &mut R) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_i32<R: Read>(r: &mut R) -> std::io::Result<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::transcripts::Transcript;

    fn sample_index() -> KmerIndex {
        let txs = vec![
            Transcript::new("t0", "ACCGTTAGCA"),
            Transcript::new("t1", "AAAAACCCCC"),
            Transcript::new("t2", "AAAAAGGGGG"),
        ];
        KmerIndex::build(5, DEFAULT_SKIP, &txs).unwrap()
    }

    #[test]
    fn test_roundtrip_structural_equality() {
        let idx = sample_index();
        let mut buf = Vec::new();
        idx.write_to(&mut buf, true).unwrap();

        let loaded = KmerIndex::load_from(&mut &buf[..], true).unwrap();
        assert_eq!(loaded, idx);
        // the inverse map is rebuilt faithfully
        assert_eq!(loaded.ecmapinv.len(), idx.ecmapinv.len());
        for (v, &ec) in &idx.ecmapinv {
            assert_eq!(loaded.ecmapinv.get(v), Some(&ec));
        }
    }

    #[test]
    fn test_serialization_deterministic() {
        let a = sample_index();
        let b = sample_index();
        let mut ba = Vec::new();
        let mut bb = Vec::new();
        a.write_to(&mut ba, true).unwrap();
        b.write_to(&mut bb, true).unwrap();
        assert_eq!(ba, bb);

        // a loaded index serializes to the same bytes
        let loaded = KmerIndex::load_from(&mut &ba[..], true).unwrap();
        let mut bc = Vec::new();
        loaded.write_to(&mut bc, true).unwrap();
        assert_eq!(ba, bc);
    }

    #[test]
    fn test_header_only_variant() {
        let idx = sample_index();
        let mut buf = Vec::new();
        idx.write_to(&mut buf, false).unwrap();

        let loaded = KmerIndex::load_from(&mut &buf[..], true).unwrap();
        assert_eq!(loaded.k(), 5);
        assert_eq!(loaded.num_trans(), 3);
        assert_eq!(loaded.nb_kmers(), 0);
        assert_eq!(loaded.num_contigs(), 0);
        assert_eq!(loaded.target_names(), idx.target_names());
        assert_eq!(loaded.target_lens(), idx.target_lens());
        assert_eq!(loaded.ecmap(), idx.ecmap());
    }

    #[test]
    fn test_skip_kmer_table_on_load() {
        let idx = sample_index();
        let mut buf = Vec::new();
        idx.write_to(&mut buf, true).unwrap();

        let loaded = KmerIndex::load_from(&mut &buf[..], false).unwrap();
        assert_eq!(loaded.nb_kmers(), 0);
        // contig table is still read
        assert_eq!(loaded.num_contigs(), idx.num_contigs());
        assert_eq!(loaded.target_names(), idx.target_names());
    }

    #[test]
    fn test_version_mismatch() {
        let idx = sample_index();
        let mut buf = Vec::new();
        idx.write_to(&mut buf, true).unwrap();
        buf[0] = 99; // corrupt the version field

        match KmerIndex::load_from(&mut &buf[..], true) {
            Err(IndexError::VersionMismatch { found, expected }) => {
                assert_eq!(found, 99);
                assert_eq!(expected, INDEX_VERSION);
            }
            other => panic!("expected version mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_file() {
        let idx = sample_index();
        let mut buf = Vec::new();
        idx.write_to(&mut buf, true).unwrap();
        buf.truncate(buf.len() / 2);

        assert!(matches!(
            KmerIndex::load_from(&mut &buf[..], true),
            Err(IndexError::Io(_))
        ));
    }
}
