use anyhow::Result;
use clap::Args;
use tracing::info;

use crate::index::KmerIndex;

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Path to the index file
    #[arg(short = 'i', long)]
    pub index: String,
}

pub fn run(args: InspectArgs) -> Result<()> {
    let index = KmerIndex::load(&args.index, true)?;

    info!("k-mer length: {}", index.k());
    info!("number of targets: {}", index.num_trans());
    info!("number of k-mers: {}", index.nb_kmers());
    info!("number of contigs: {}", index.num_contigs());
    info!("number of equivalence classes: {}", index.ecmap().len());

    let multi = index
        .ecmap()
        .iter()
        .filter(|members| members.len() > 1)
        .count();
    info!("classes spanning more than one target: {}", multi);
    Ok(())
}
