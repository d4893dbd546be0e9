use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Copy a file through the pipeline without transforming it.
    #[command(alias = "cp")]
    Copy {
        /// The input file to read.
        input: PathBuf,

        /// The path for the output file.
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        tuning: Tuning,
    },

    /// Compress a file into length-prefixed zstd records.
    #[command(alias = "c")]
    Compress {
        /// The input file to compress.
        input: PathBuf,

        /// The path for the compressed output file.
        #[arg(short, long)]
        output: PathBuf,

        /// Zstandard compression level (0-22). Higher levels offer better
        /// compression at the cost of speed.
        #[arg(long, default_value_t = 3)]
        level: i32,

        #[command(flatten)]
        tuning: Tuning,
    },

    /// Decompress a file produced by the compress command.
    #[command(alias = "d")]
    Decompress {
        /// The compressed input file.
        input: PathBuf,

        /// The path for the restored output file.
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        tuning: Tuning,
    },
}

/// Tuning flags shared by every subcommand.
#[derive(clap::Args, Clone, Debug)]
pub struct Tuning {
    /// Number of parallel transform workers. [0 = auto-detect based on CPU cores]
    #[arg(long, default_value_t = 0)]
    pub threads: usize,

    /// Chunk size in KiB read from the source per block.
    #[arg(long, default_value_t = 1024)]
    pub chunk_size_kib: usize,

    /// Memory usage percentage above which the reader is additionally
    /// throttled.
    #[arg(long, default_value_t = 90, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub memory_threshold: u8,
}

/// Parses command-line arguments using `clap` and returns the command to execute.
///
/// It handles parsing and returns a `Commands` enum variant, or an error if
/// parsing fails.
pub fn run() -> Result<Commands, Box<dyn std::error::Error>> {
    let args = Args::parse();
    Ok(args.command)
}
