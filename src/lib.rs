pub mod cli;
pub mod error;
pub mod index;
pub mod io;
pub mod mapping;

pub use crate::error::IndexError;
pub use crate::index::dbg::{Contig, ContigToTranscript, DbGraph, KmerEntry};
pub use crate::index::kmer::{Kmer, KmerScanner};
pub use crate::index::{KmerIndex, DEFAULT_SKIP, INDEX_VERSION};
pub use crate::io::transcripts::Transcript;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
