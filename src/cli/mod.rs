pub mod build;
pub mod inspect;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "tdbg-rs")]
#[command(about = "Transcriptome k-mer index over a colored compacted de Bruijn graph")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Build(build::BuildArgs),
    Inspect(inspect::InspectArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Build(args) => build::run(args),
        Commands::Inspect(args) => inspect::run(args),
    }
}
