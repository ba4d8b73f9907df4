use anyhow::Result;
use clap::Args;

use crate::index::{KmerIndex, DEFAULT_SKIP};
use crate::io::transcripts::read_transcripts;

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Transcript FASTA file(s), plain or compressed
    #[arg(short = 'f', long = "fasta", required = true, num_args = 1..)]
    pub fasta: Vec<String>,
    /// Output path for the index file
    #[arg(short = 'o', long)]
    pub output: String,
    /// K-mer length (odd, between 3 and 31)
    #[arg(short = 'k', long, default_value = "31")]
    pub klen: usize,
    /// Replace repeated target names with name_1, name_2, ...
    #[arg(long)]
    pub make_unique: bool,
    /// Probe stride for the match back-off scan
    #[arg(long, default_value_t = DEFAULT_SKIP)]
    pub skip: i32,
    /// Write the header sections only (no k-mer or contig tables)
    #[arg(long)]
    pub no_kmer_table: bool,
}

pub fn run(args: BuildArgs) -> Result<()> {
    let transcripts = read_transcripts(&args.fasta, args.make_unique)?;
    let index = KmerIndex::build(args.klen, args.skip, &transcripts)?;
    index.write(&args.output, !args.no_kmer_table)?;
    Ok(())
}
